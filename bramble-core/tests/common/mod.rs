#![allow(dead_code)]
//! Test harness utilities for bramble-core integration tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bramble_core::itc::{ActionReceiver, Channel, Consumer, QueueExecutor};
use bramble_core::service::Service;

/// Drain `executor` until `done` holds, or panic after `timeout`.
pub fn drain_until<F: Fn() -> bool>(executor: &QueueExecutor, timeout: Duration, done: F) {
    let start = Instant::now();
    while !done() {
        executor.run_queued_functions();
        if start.elapsed() > timeout {
            panic!("condition not reached within {:?}", timeout);
        }
        std::thread::yield_now();
    }
}

/// Consumer whose hook records every value it is notified with.
pub fn recording_consumer<S: Clone + Send + 'static>(
    channel: &Channel<S>,
    executor: Arc<QueueExecutor>,
) -> (Consumer<S>, Arc<Mutex<Vec<S>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let hook_seen = Arc::clone(&seen);
    let consumer = Consumer::with_observer(channel, executor, move |s: &S| {
        hook_seen.lock().unwrap().push(s.clone())
    });
    (consumer, seen)
}

bramble_core::actions! {
    pub Note(u8);
}

/// Receiver that appends `(tag, note)` to a shared journal.
pub struct Journal {
    pub tag: &'static str,
    pub entries: std::rc::Rc<std::cell::RefCell<Vec<(&'static str, u8)>>>,
}

impl ActionReceiver<Note> for Journal {
    fn action(&mut self, _: Note, (note,): (u8,)) {
        self.entries.borrow_mut().push((self.tag, note));
    }
}

pub trait Greeter: Service {
    fn greet(&self) -> String;
}

pub struct English;

impl Greeter for English {
    fn greet(&self) -> String {
        "hello".to_string()
    }
}

pub struct Welsh;

impl Greeter for Welsh {
    fn greet(&self) -> String {
        "helo".to_string()
    }
}
