// src/watch/queue.rs

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

/// How the queue was completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    /// Buffered items are still handed out before end-of-stream.
    Drain,
    /// Buffered items are discarded and a waiting consumer is released
    /// immediately.
    Abort,
}

/// Single-producer/single-consumer FIFO bridging the watch event producer
/// and the engine's consumer loop.
///
/// Consumption is one-shot and forward-only: once [`EventQueue::pop`]
/// returns `None` the queue stays exhausted.
#[derive(Debug, Default)]
pub struct EventQueue<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    completion: Option<Completion>,
}

impl<T> Default for QueueState<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            completion: None,
        }
    }
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Append a value and wake a suspended consumer.
    ///
    /// # Panics
    ///
    /// Pushing after [`EventQueue::done`] is a programming error and panics.
    pub fn push(&self, value: T) {
        let mut state = self.state.lock().expect("event queue lock poisoned");
        if state.completion.is_some() {
            panic!("push on completed event queue");
        }
        state.items.push_back(value);
        self.notify.notify_one();
    }

    /// Mark the queue complete. With `abort` anything still buffered is
    /// discarded and a suspended consumer is released immediately; without
    /// it the consumer drains the buffer first. The first call wins.
    pub fn done(&self, abort: bool) {
        let mut state = self.state.lock().expect("event queue lock poisoned");
        if state.completion.is_some() {
            return;
        }
        state.completion = Some(if abort {
            state.items.clear();
            Completion::Abort
        } else {
            Completion::Drain
        });
        self.notify.notify_one();
    }

    /// Take the next value, suspending while the queue is open and empty.
    /// `None` signals end-of-stream.
    pub async fn pop(&self) -> Option<T> {
        loop {
            // Register for a wakeup before checking state, so a push or
            // done between the check and the await is not missed.
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().expect("event queue lock poisoned");
                if state.completion == Some(Completion::Abort) {
                    return None;
                }
                if let Some(value) = state.items.pop_front() {
                    return Some(value);
                }
                if state.completion.is_some() {
                    return None;
                }
            }
            notified.await;
        }
    }
}
