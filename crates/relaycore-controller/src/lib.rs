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

//! A single-consumer event loop that serializes every controller-side
//! state change onto one thread, so the code that mutates cluster state
//! never has to reason about concurrent callers.

pub mod event;
pub mod manager;
pub mod metrics;

pub use event::ControllerEvent;
pub use event::ControllerEventProcessor;
pub use event::ControllerState;
pub use event::QueuedEvent;
pub use manager::ControllerEventManager;
pub use manager::ControllerEventManagerConfig;
pub use metrics::Metrics;
pub use metrics::NoopMetrics;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[derive(Debug, Clone)]
    enum TestEvent {
        Record(i32),
    }

    impl ControllerEvent for TestEvent {
        fn state(&self) -> ControllerState {
            ControllerState::Processing("test-event")
        }
    }

    struct RecordingProcessor {
        processed: Mutex<Vec<i32>>,
        preempted: Mutex<Vec<i32>>,
    }

    impl RecordingProcessor {
        fn new() -> Self {
            RecordingProcessor {
                processed: Mutex::new(Vec::new()),
                preempted: Mutex::new(Vec::new()),
            }
        }
    }

    impl ControllerEventProcessor<TestEvent> for RecordingProcessor {
        fn process(&self, event: &TestEvent) {
            let TestEvent::Record(id) = event;
            self.processed.lock().unwrap().push(*id);
        }

        fn preempt(&self, event: &TestEvent) {
            let TestEvent::Record(id) = event;
            self.preempted.lock().unwrap().push(*id);
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("condition never became true");
    }

    #[test]
    fn events_process_in_submission_order() {
        let processor = Arc::new(RecordingProcessor::new());
        let manager = ControllerEventManager::new(
            1,
            processor.clone(),
            Arc::new(NoopMetrics),
            ControllerEventManagerConfig::default(),
        );

        for id in 0..5 {
            manager.put(TestEvent::Record(id));
        }

        wait_until(|| processor.processed.lock().unwrap().len() == 5);
        assert_eq!(*processor.processed.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        manager.close();
    }

    #[test]
    fn clear_and_put_preempts_everything_queued_ahead_of_it() {
        let processor = Arc::new(RecordingProcessor::new());
        let manager = ControllerEventManager::new(
            1,
            processor.clone(),
            Arc::new(NoopMetrics),
            ControllerEventManagerConfig::default(),
        );

        // Block the consumer thread on a first event so the next two queue
        // up behind it instead of racing the preemption.
        let first = manager.put(TestEvent::Record(0));
        first.await_processing();

        manager.put(TestEvent::Record(1));
        manager.put(TestEvent::Record(2));
        manager.clear_and_put(TestEvent::Record(99));

        wait_until(|| processor.processed.lock().unwrap().contains(&99));
        assert_eq!(*processor.preempted.lock().unwrap(), vec![1, 2]);
        assert!(processor.processed.lock().unwrap().contains(&0));
        assert!(processor.processed.lock().unwrap().contains(&99));
        manager.close();
    }

    #[test]
    fn close_drains_the_queue_and_stops_the_thread() {
        let processor = Arc::new(RecordingProcessor::new());
        let manager = ControllerEventManager::new(
            1,
            processor.clone(),
            Arc::new(NoopMetrics),
            ControllerEventManagerConfig::default(),
        );

        manager.put(TestEvent::Record(1));
        manager.close();
        assert!(manager.is_empty());
        // whichever side won the race with the consumer thread, the event
        // was accounted for exactly once.
        let processed = processor.processed.lock().unwrap().contains(&1);
        let preempted = processor.preempted.lock().unwrap().contains(&1);
        assert!(processed ^ preempted);
    }

    #[test]
    fn idle_manager_reports_idle_state() {
        let processor = Arc::new(RecordingProcessor::new());
        let manager = ControllerEventManager::new(
            1,
            processor,
            Arc::new(NoopMetrics),
            ControllerEventManagerConfig::default(),
        );
        wait_until(|| manager.state() == ControllerState::Idle);
        manager.close();
    }
}
