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

//! The event abstraction the controller event loop runs one at a time, in
//! submission order, on a single dedicated thread.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use latches::sync::Latch;

/// What the controller thread is doing right now, for operators to read off
/// without instrumenting every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Processing(&'static str),
}

/// A unit of work the controller thread understands. Implementors carry
/// whatever data their [`ControllerEventProcessor`] needs to act.
pub trait ControllerEvent: Send {
    /// The state the event loop reports while this event is running.
    fn state(&self) -> ControllerState;
}

/// The single collaborator that carries out a [`ControllerEvent`]: either
/// runs it to completion, or, if it never got the chance to run, unwinds
/// whatever the submitter was waiting on.
pub trait ControllerEventProcessor<E>: Send + Sync {
    fn process(&self, event: &E);
    fn preempt(&self, event: &E);
}

/// An event plus everything the event loop needs to dequeue, run, and
/// report on it exactly once: the instant it was enqueued, a `spent` flag
/// guarding against double-processing, and a latch submitters can block on
/// to know processing has actually started.
pub struct QueuedEvent<E> {
    event: E,
    enqueued_at: Instant,
    spent: AtomicBool,
    processing_started: Latch,
}

impl<E: ControllerEvent> QueuedEvent<E> {
    pub fn new(event: E) -> Self {
        QueuedEvent {
            event,
            enqueued_at: Instant::now(),
            spent: AtomicBool::new(false),
            processing_started: Latch::new(1),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.event.state()
    }

    pub fn queued_for(&self) -> Duration {
        self.enqueued_at.elapsed()
    }

    /// Runs the event through `processor`, unless it was already preempted.
    /// A no-op on every call after the first, however it arrives.
    pub fn process(&self, processor: &dyn ControllerEventProcessor<E>) {
        if self.spent.swap(true, Ordering::SeqCst) {
            return;
        }
        self.processing_started.count_down();
        processor.process(&self.event);
    }

    /// Marks the event spent without running it. Still counts down the
    /// processing latch, so a submitter blocked in [`Self::await_processing`]
    /// is released instead of waiting on an event that will never run.
    pub fn preempt(&self, processor: &dyn ControllerEventProcessor<E>) {
        if self.spent.swap(true, Ordering::SeqCst) {
            return;
        }
        self.processing_started.count_down();
        processor.preempt(&self.event);
    }

    /// Blocks until this event has either started processing or been
    /// preempted.
    pub fn await_processing(&self) {
        self.processing_started.wait();
    }
}
