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

//! [`ControllerEventManager`] serializes every controller state change onto
//! a single dedicated thread. Producers call [`ControllerEventManager::put`]
//! or [`ControllerEventManager::clear_and_put`] from whatever thread raised
//! the event; the consumer thread runs them strictly one at a time, in
//! submission order.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use latches::sync::Latch;

use crate::event::ControllerEvent;
use crate::event::ControllerEventProcessor;
use crate::event::ControllerState;
use crate::event::QueuedEvent;
use crate::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct ControllerEventManagerConfig {
    pub thread_name: String,
    /// How long the consumer thread waits on an empty queue before it
    /// decides the queue-time history has gone stale and resets it. Once
    /// reset, the next dequeue blocks indefinitely instead of polling.
    pub event_queue_time_timeout: Duration,
}

impl Default for ControllerEventManagerConfig {
    fn default() -> Self {
        ControllerEventManagerConfig {
            thread_name: "controller-event-thread".to_string(),
            event_queue_time_timeout: Duration::from_secs(300),
        }
    }
}

enum Item<E> {
    Event(Arc<QueuedEvent<E>>),
    Shutdown,
}

struct BlockingQueue<E> {
    items: Mutex<VecDeque<Item<E>>>,
    not_empty: Condvar,
}

impl<E> BlockingQueue<E> {
    fn new() -> Self {
        BlockingQueue {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    fn push(&self, item: Item<E>) {
        let mut items = self.items.lock().unwrap();
        items.push_back(item);
        self.not_empty.notify_one();
    }

    fn drain(&self) -> Vec<Item<E>> {
        self.items.lock().unwrap().drain(..).collect()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Blocks until an item is available or `timeout` elapses.
    fn poll(&self, timeout: Duration) -> Option<Item<E>> {
        let items = self.items.lock().unwrap();
        let (mut items, _) = self
            .not_empty
            .wait_timeout_while(items, timeout, |q| q.is_empty())
            .unwrap();
        items.pop_front()
    }

    /// Blocks indefinitely until an item is available.
    fn take(&self) -> Item<E> {
        let items = self.items.lock().unwrap();
        let mut items = self.not_empty.wait_while(items, |q| q.is_empty()).unwrap();
        items.pop_front().expect("woken only when the queue is non-empty")
    }
}

pub struct ControllerEventManager<E: ControllerEvent + 'static> {
    controller_id: i32,
    queue: Arc<BlockingQueue<E>>,
    processor: Arc<dyn ControllerEventProcessor<E>>,
    put_lock: Mutex<()>,
    state: Arc<Mutex<ControllerState>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    shutdown_latch: Arc<Latch>,
}

impl<E: ControllerEvent + 'static> ControllerEventManager<E> {
    pub fn new(
        controller_id: i32,
        processor: Arc<dyn ControllerEventProcessor<E>>,
        metrics: Arc<dyn Metrics>,
        config: ControllerEventManagerConfig,
    ) -> Self {
        let queue = Arc::new(BlockingQueue::new());
        let state = Arc::new(Mutex::new(ControllerState::Idle));
        let shutdown_latch = Arc::new(Latch::new(1));

        let thread_queue = queue.clone();
        let thread_processor = processor.clone();
        let thread_state = state.clone();
        let thread_latch = shutdown_latch.clone();
        let timeout = config.event_queue_time_timeout;
        let handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                run_event_loop(thread_queue, thread_processor, metrics, thread_state, timeout);
                thread_latch.count_down();
            })
            .expect("failed to spawn the controller event thread");

        ControllerEventManager {
            controller_id,
            queue,
            processor,
            put_lock: Mutex::new(()),
            state,
            thread: Mutex::new(Some(handle)),
            shutdown_latch,
        }
    }

    pub fn controller_id(&self) -> i32 {
        self.controller_id
    }

    pub fn state(&self) -> ControllerState {
        *self.state.lock().unwrap()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Enqueues `event` behind everything already waiting.
    pub fn put(&self, event: E) -> Arc<QueuedEvent<E>> {
        let _guard = self.put_lock.lock().unwrap();
        let queued = Arc::new(QueuedEvent::new(event));
        self.queue.push(Item::Event(queued.clone()));
        queued
    }

    /// Preempts every event currently queued, then enqueues `event` in
    /// their place. Used when a newer event makes everything ahead of it
    /// obsolete (for example, a fresher `updateMetadata` superseding stale
    /// ones that haven't run yet).
    pub fn clear_and_put(&self, event: E) -> Arc<QueuedEvent<E>> {
        let _guard = self.put_lock.lock().unwrap();
        for item in self.queue.drain() {
            if let Item::Event(queued) = item {
                queued.preempt(self.processor.as_ref());
            }
        }
        let queued = Arc::new(QueuedEvent::new(event));
        self.queue.push(Item::Event(queued.clone()));
        queued
    }

    /// Preempts everything still queued, same as [`Self::clear_and_put`],
    /// then signals the consumer thread to stop and blocks until it has
    /// exited.
    pub fn close(&self) {
        {
            let _guard = self.put_lock.lock().unwrap();
            for item in self.queue.drain() {
                if let Item::Event(queued) = item {
                    queued.preempt(self.processor.as_ref());
                }
            }
            self.queue.push(Item::Shutdown);
        }
        self.shutdown_latch.wait();
        if let Some(handle) = self.thread.lock().unwrap().take() {
            if let Err(panic) = handle.join() {
                log::error!("controller event thread panicked: {panic:?}");
            }
        }
    }
}

fn run_event_loop<E: ControllerEvent>(
    queue: Arc<BlockingQueue<E>>,
    processor: Arc<dyn ControllerEventProcessor<E>>,
    metrics: Arc<dyn Metrics>,
    state: Arc<Mutex<ControllerState>>,
    timeout: Duration,
) {
    let samples_since_reset = AtomicUsize::new(0);
    loop {
        let item = if samples_since_reset.load(Ordering::Relaxed) != 0 {
            match queue.poll(timeout) {
                Some(item) => item,
                None => {
                    // nothing arrived inside the timeout: the queue-time
                    // history is stale, so go back to blocking indefinitely.
                    samples_since_reset.store(0, Ordering::Relaxed);
                    queue.take()
                }
            }
        } else {
            queue.take()
        };

        let queued = match item {
            Item::Shutdown => return,
            Item::Event(queued) => queued,
        };

        let event_state = queued.state();
        metrics.record_queue_time(event_state, queued.queued_for());
        samples_since_reset.fetch_add(1, Ordering::Relaxed);

        *state.lock().unwrap() = event_state;
        let started = Instant::now();
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| queued.process(processor.as_ref()))) {
            log::error!("controller event processor panicked: {panic:?}");
        }
        metrics.record_processing_time(event_state, started.elapsed());
        *state.lock().unwrap() = ControllerState::Idle;
    }
}
