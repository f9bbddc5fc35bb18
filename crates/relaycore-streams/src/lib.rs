// Copyright 2024 tison <wander4096@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-partition record intake for the embedded stream-processing runtime:
//! an ordered buffer that lazily decodes raw bytes, validates timestamp
//! monotonicity, and drops malformed entries without surfacing them to the
//! task that owns the partition.

pub mod deserializer;
pub mod queue;
pub mod record;

pub use deserializer::DecodeOutcome;
pub use deserializer::DeserializationError;
pub use deserializer::DeserializationExceptionHandler;
pub use deserializer::DeserializationResponse;
pub use deserializer::LogAndContinueExceptionHandler;
pub use deserializer::RecordDeserializer;
pub use deserializer::TimestampExtractor;
pub use deserializer::TimestampExtractorError;
pub use queue::PolledRecord;
pub use queue::RecordQueue;
pub use queue::UNKNOWN_TIMESTAMP;
pub use record::CorruptedRecord;
pub use record::RawRecord;
pub use record::RecordHeader;
pub use record::StampedRecord;

#[cfg(test)]
mod tests {
    use super::*;

    /// Decodes a record as its own timestamp, skipping any record whose
    /// value is absent. Lets tests drive decode/skip and timestamp
    /// extraction with one knob (`raw.timestamp`, `raw.value`).
    struct EchoTimestampDeserializer;

    impl RecordDeserializer<i64> for EchoTimestampDeserializer {
        fn deserialize(&self, raw: &RawRecord) -> error_stack::Result<DecodeOutcome<i64>, DeserializationError> {
            if raw.value.is_none() {
                return Ok(DecodeOutcome::Skip);
            }
            Ok(DecodeOutcome::Decoded(raw.timestamp))
        }
    }

    struct IdentityExtractor;

    impl TimestampExtractor<i64> for IdentityExtractor {
        fn extract(&self, record: &i64, _partition_time: i64) -> error_stack::Result<i64, TimestampExtractorError> {
            Ok(*record)
        }
    }

    fn raw(offset: i64, timestamp: i64, decodable: bool) -> RawRecord {
        RawRecord {
            topic: "orders".to_string(),
            partition: 0,
            offset,
            timestamp,
            key: Some(b"k".to_vec()),
            value: decodable.then(|| b"v".to_vec()),
            headers: vec![],
        }
    }

    fn queue() -> RecordQueue<i64, EchoTimestampDeserializer, IdentityExtractor> {
        RecordQueue::new("restore-consumer", "orders", 0, EchoTimestampDeserializer, IdentityExtractor)
    }

    #[test]
    fn size_and_empty_track_fifo_plus_head() {
        let mut q = queue();
        assert!(q.is_empty());
        q.add_raw_records(vec![raw(0, 10, true), raw(1, 20, true)]).unwrap();
        // one materialized head + one buffered behind it
        assert_eq!(q.size(), 2);
        assert!(!q.is_empty());
    }

    #[test]
    fn mixed_corruption_keeps_decodable_records_in_order() {
        let mut q = queue();
        q.add_raw_records(vec![raw(0, 10, true), raw(1, 0, false), raw(2, 5, true)])
            .unwrap();

        assert_eq!(q.head_record_timestamp(), 10);
        let polled = q.poll().unwrap();
        match polled {
            PolledRecord::Stamped(s) => assert_eq!(s.timestamp, 10),
            PolledRecord::Corrupted(_) => panic!("expected a stamped record"),
        }
        assert_eq!(q.partition_time(), 10);

        assert_eq!(q.head_record_timestamp(), 5);
        let polled = q.poll().unwrap();
        match polled {
            PolledRecord::Stamped(s) => assert_eq!(s.timestamp, 5),
            PolledRecord::Corrupted(_) => panic!("expected a stamped record"),
        }
        // partition time never decreases even though this record is older
        assert_eq!(q.partition_time(), 10);
        assert!(q.is_empty());
    }

    #[test]
    fn all_undecodable_batch_surfaces_a_corrupted_head() {
        let mut q = queue();
        q.add_raw_records(vec![raw(0, 0, false), raw(1, 0, false)]).unwrap();

        assert_eq!(q.head_record_timestamp(), UNKNOWN_TIMESTAMP);
        assert_eq!(q.size(), 1);
        match q.poll().unwrap() {
            PolledRecord::Corrupted(c) => assert_eq!(c.offset, 1),
            PolledRecord::Stamped(_) => panic!("expected a corrupted record"),
        }
    }

    #[test]
    fn negative_timestamp_is_dropped_and_counted() {
        let mut q = queue();
        q.add_raw_records(vec![raw(0, -7, true)]).unwrap();

        assert!(q.is_empty());
        assert_eq!(q.head_record_timestamp(), UNKNOWN_TIMESTAMP);
        assert_eq!(q.dropped_records(), 1);
    }

    #[test]
    fn clear_resets_partition_time_and_buffers() {
        let mut q = queue();
        q.add_raw_records(vec![raw(0, 10, true), raw(1, 20, true)]).unwrap();
        q.poll().unwrap();
        q.clear();

        assert!(q.is_empty());
        assert_eq!(q.partition_time(), UNKNOWN_TIMESTAMP);
        assert_eq!(q.total_bytes_buffered(), 0);
    }

    #[test]
    fn set_partition_time_restores_high_water_mark() {
        let mut q = queue();
        q.set_partition_time(42);
        assert_eq!(q.partition_time(), 42);
    }
}
