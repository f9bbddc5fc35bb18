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

//! Record types flowing into and out of a [`crate::queue::RecordQueue`].
//! Wire decoding of the key/value bytes is the deserializer's job; this
//! module only describes the shapes.

/// A single header entry on a raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

/// The external `ConsumerRecord<bytes, bytes>` shape: what a network layer
/// hands to [`crate::queue::RecordQueue::add_raw_records`].
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub timestamp: i64,
    pub key: Option<Vec<u8>>,
    pub value: Option<Vec<u8>>,
    pub headers: Vec<RecordHeader>,
}

impl RawRecord {
    /// `serializedKeySize + serializedValueSize + 8 (timestamp) + 8
    /// (offset) + utf8Len(topic) + 4 (partition) + headers`.
    pub fn serialized_size(&self) -> usize {
        let key_size = self.key.as_ref().map_or(0, Vec::len);
        let value_size = self.value.as_ref().map_or(0, Vec::len);
        let headers_size: usize = self
            .headers
            .iter()
            .map(|header| header.key.len() + header.value.as_ref().map_or(0, Vec::len))
            .sum();
        key_size + value_size + 8 + 8 + self.topic.len() + 4 + headers_size
    }
}

/// A decoded record paired with an extracted, non-negative timestamp.
#[derive(Debug, Clone)]
pub struct StampedRecord<R> {
    pub record: R,
    pub timestamp: i64,
}

/// A placeholder installed when a run of raw records could not be decoded.
/// Carries only enough of the original record's identity for the consumer
/// to advance committed offsets past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}
