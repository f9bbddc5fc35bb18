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

//! Pluggable collaborators a [`crate::queue::RecordQueue`] calls into: one
//! that turns raw bytes into a decoded record, and one that extracts an
//! event-time timestamp from it. Both are external policy, not codec logic
//! this crate owns.

use crate::record::RawRecord;

/// What a [`RecordDeserializer`] decided about one raw record.
pub enum DecodeOutcome<R> {
    Decoded(R),
    /// The configured [`DeserializationExceptionHandler`] chose to continue
    /// past this record rather than fail the task.
    Skip,
}

/// Turns a [`RawRecord`] into the decoded type `R` the rest of the pipeline
/// works with. Implementations are expected to consult a
/// [`DeserializationExceptionHandler`] internally and translate a `Fail`
/// verdict into an `Err`.
pub trait RecordDeserializer<R>: Send + Sync {
    fn deserialize(&self, raw: &RawRecord) -> error_stack::Result<DecodeOutcome<R>, DeserializationError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to deserialize record at topic={topic} partition={partition} offset={offset}")]
pub struct DeserializationError {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// What to do when decoding a raw record throws: swallow it and move on, or
/// fail the owning task.
pub enum DeserializationResponse {
    Continue,
    Fail,
}

/// The policy a [`RecordDeserializer`] consults when decoding fails.
pub trait DeserializationExceptionHandler: Send + Sync {
    fn handle(&self, raw: &RawRecord, cause: &dyn std::fmt::Display) -> DeserializationResponse;
}

/// Always continues past a bad record. A reasonable default for pipelines
/// that treat undecodable input as expected noise.
pub struct LogAndContinueExceptionHandler;

impl DeserializationExceptionHandler for LogAndContinueExceptionHandler {
    fn handle(&self, raw: &RawRecord, cause: &dyn std::fmt::Display) -> DeserializationResponse {
        log::warn!(
            "skipping undecodable record at topic={} partition={} offset={}: {cause}",
            raw.topic,
            raw.partition,
            raw.offset,
        );
        DeserializationResponse::Continue
    }
}

/// The framework-vs-user distinction the extractor failure policy needs:
/// a framework exception is re-raised as-is, anything else is wrapped and
/// re-raised as framework-fatal. Both are task-terminating.
#[derive(Debug, Clone, Copy, thiserror::Error)]
pub enum TimestampExtractorError {
    #[error("framework failed to extract a timestamp")]
    Framework,
    #[error("timestamp extractor raised an error")]
    User,
}

/// Extracts an event-time timestamp from a decoded record, given the
/// partition's current high-water timestamp.
pub trait TimestampExtractor<R>: Send + Sync {
    fn extract(&self, record: &R, partition_time: i64) -> error_stack::Result<i64, TimestampExtractorError>;
}
