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

//! Where the event loop's timing observations go is left to the embedding
//! binary: a metrics registry, a trace span, or nowhere at all.

use std::time::Duration;

use crate::event::ControllerState;

pub trait Metrics: Send + Sync {
    /// How long an event sat in the queue before the thread picked it up.
    fn record_queue_time(&self, state: ControllerState, duration: Duration);
    /// How long the processor took to run the event.
    fn record_processing_time(&self, state: ControllerState, duration: Duration);
}

/// Discards every observation. The default when the embedder hasn't wired
/// up a registry.
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn record_queue_time(&self, _state: ControllerState, _duration: Duration) {}
    fn record_processing_time(&self, _state: ControllerState, _duration: Duration) {}
}
