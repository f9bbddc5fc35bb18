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

//! [`RecordQueue`] buffers raw records for one partition and exposes at
//! most one decoded, timestamp-validated head to the stream task that owns
//! it. Single-threaded, cooperative use only: there is no locking here.

use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use error_stack::ResultExt;

use crate::deserializer::DecodeOutcome;
use crate::deserializer::RecordDeserializer;
use crate::deserializer::TimestampExtractor;
use crate::deserializer::TimestampExtractorError;
use crate::record::CorruptedRecord;
use crate::record::RawRecord;
use crate::record::StampedRecord;

/// Sentinel for "no timestamp known yet", matching the partition-time
/// starting value and the value `headRecordTimestamp` reports with no head.
pub const UNKNOWN_TIMESTAMP: i64 = -1;

/// What `poll` hands back: a `CorruptedRecord` carries only enough identity
/// to advance past it, a `Stamped` carries the decoded record and its
/// extracted timestamp.
#[derive(Debug)]
pub enum PolledRecord<R> {
    Stamped(StampedRecord<R>),
    Corrupted(CorruptedRecord),
}

enum Head<R> {
    Stamped(StampedRecord<R>, i64),
    Corrupted(CorruptedRecord),
}

pub struct RecordQueue<R, D, T> {
    source: String,
    topic: String,
    partition: i32,
    deserializer: D,
    timestamp_extractor: T,
    fifo: VecDeque<RawRecord>,
    head: Option<Head<R>>,
    partition_time: i64,
    total_bytes_buffered: usize,
    head_record_size_in_bytes: usize,
    dropped_records: AtomicU64,
}

impl<R, D, T> RecordQueue<R, D, T>
where
    D: RecordDeserializer<R>,
    T: TimestampExtractor<R>,
{
    pub fn new(
        source: impl Into<String>,
        topic: impl Into<String>,
        partition: i32,
        deserializer: D,
        timestamp_extractor: T,
    ) -> Self {
        RecordQueue {
            source: source.into(),
            topic: topic.into(),
            partition,
            deserializer,
            timestamp_extractor,
            fifo: VecDeque::new(),
            head: None,
            partition_time: UNKNOWN_TIMESTAMP,
            total_bytes_buffered: 0,
            head_record_size_in_bytes: 0,
            dropped_records: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn partition(&self) -> i32 {
        self.partition
    }

    pub fn partition_time(&self) -> i64 {
        self.partition_time
    }

    /// Overrides the partition time, used when restoring from a checkpoint.
    pub fn set_partition_time(&mut self, partition_time: i64) {
        self.partition_time = partition_time;
    }

    pub fn total_bytes_buffered(&self) -> usize {
        self.total_bytes_buffered
    }

    pub fn dropped_records(&self) -> u64 {
        self.dropped_records.load(Ordering::Relaxed)
    }

    pub fn size(&self) -> usize {
        self.fifo.len() + usize::from(self.head.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn head_record_timestamp(&self) -> i64 {
        match &self.head {
            Some(Head::Stamped(stamped, _)) => stamped.timestamp,
            Some(Head::Corrupted(_)) | None => UNKNOWN_TIMESTAMP,
        }
    }

    pub fn head_record_offset(&self) -> Option<i64> {
        match &self.head {
            Some(Head::Stamped(_, offset)) => Some(*offset),
            Some(Head::Corrupted(corrupted)) => Some(corrupted.offset),
            None => None,
        }
    }

    /// Appends every record in `records` to the tail, then materializes the
    /// head if it is currently empty. Returns the new queue size.
    pub fn add_raw_records(
        &mut self,
        records: impl IntoIterator<Item = RawRecord>,
    ) -> error_stack::Result<usize, TimestampExtractorError> {
        for record in records {
            self.total_bytes_buffered += record.serialized_size();
            self.fifo.push_back(record);
        }
        self.update_head()?;
        Ok(self.size())
    }

    /// Requires a materialized head; the caller must check [`Self::is_empty`]
    /// or [`Self::head_record_timestamp`] first.
    pub fn poll(&mut self) -> error_stack::Result<PolledRecord<R>, TimestampExtractorError> {
        let head = self
            .head
            .take()
            .expect("poll called with no head; caller must check is_empty first");

        self.total_bytes_buffered = self
            .total_bytes_buffered
            .saturating_sub(self.head_record_size_in_bytes);
        self.head_record_size_in_bytes = 0;

        let polled = match head {
            Head::Stamped(stamped, _) => {
                self.partition_time = self.partition_time.max(stamped.timestamp);
                PolledRecord::Stamped(stamped)
            }
            Head::Corrupted(corrupted) => PolledRecord::Corrupted(corrupted),
        };

        self.update_head()?;
        Ok(polled)
    }

    pub fn clear(&mut self) {
        self.fifo.clear();
        self.head = None;
        self.total_bytes_buffered = 0;
        self.head_record_size_in_bytes = 0;
        self.partition_time = UNKNOWN_TIMESTAMP;
    }

    /// The only place decoding and timestamp extraction happen. Drains raw
    /// records off the front of the FIFO until a head is materialized or
    /// the FIFO runs dry.
    fn update_head(&mut self) -> error_stack::Result<(), TimestampExtractorError> {
        let mut last_corrupted: Option<RawRecord> = None;

        while self.head.is_none() {
            let Some(raw) = self.fifo.pop_front() else {
                break;
            };
            let raw_size = raw.serialized_size();

            let decoded = match self
                .deserializer
                .deserialize(&raw)
                .change_context(TimestampExtractorError::Framework)
                .attach_printable_lazy(|| {
                    format!(
                        "failed to deserialize record at topic={} partition={} offset={}",
                        raw.topic, raw.partition, raw.offset
                    )
                })? {
                DecodeOutcome::Decoded(decoded) => decoded,
                DecodeOutcome::Skip => {
                    last_corrupted = Some(raw);
                    continue;
                }
            };

            let timestamp = match self.timestamp_extractor.extract(&decoded, self.partition_time) {
                Ok(timestamp) => timestamp,
                Err(report) => {
                    let is_framework = matches!(report.current_context(), TimestampExtractorError::Framework);
                    let report = if is_framework {
                        report
                    } else {
                        report.change_context(TimestampExtractorError::Framework).attach_printable(format!(
                            "timestamp extraction failed for topic={} partition={} offset={}",
                            raw.topic, raw.partition, raw.offset
                        ))
                    };
                    return Err(report);
                }
            };

            if timestamp < 0 {
                self.dropped_records.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "dropping record with negative timestamp {timestamp} at topic={} partition={} offset={}",
                    raw.topic,
                    raw.partition,
                    raw.offset,
                );
                continue;
            }

            self.head = Some(Head::Stamped(
                StampedRecord {
                    record: decoded,
                    timestamp,
                },
                raw.offset,
            ));
            self.head_record_size_in_bytes = raw_size;
        }

        if self.head.is_none() {
            if let Some(raw) = last_corrupted {
                self.head_record_size_in_bytes = raw.serialized_size();
                self.head = Some(Head::Corrupted(CorruptedRecord {
                    topic: raw.topic,
                    partition: raw.partition,
                    offset: raw.offset,
                }));
            }
        }

        Ok(())
    }
}
