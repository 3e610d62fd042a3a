//! The tagged-variant command protocol shared by every worker queue (spec §3, §9).
//!
//! The original source encodes these as bitflags on a single `Message`
//! class with one untyped payload slot; we use a generic sum type instead so
//! each queue's `ProcessData` payload is checked at the consumer rather than
//! downcast at runtime.

use std::fmt;

/// Stable identity of a worker registered with the Sender (spec §4.6, §5).
/// Thread identity is naturally unique and stable for a worker's lifetime,
/// so we key on the worker's thread name rather than introduce a separate
/// registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The current thread's name, or its `ThreadId` debug form if unnamed.
    pub fn current_thread() -> Self {
        let thread = std::thread::current();
        match thread.name() {
            Some(name) => Self(name.to_string()),
            None => Self(format!("{:?}", thread.id())),
        }
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A command sent to one worker's queue. `T` is the payload carried by
/// `ProcessData`, specific to that worker (e.g. `()` for the Discoverer and
/// Checker, a batch of result tuples for the Sender).
#[derive(Debug, Clone)]
pub enum Message<T> {
    ProcessData(T),
    StopExecution,
    ForceStopExecution,
    RegisterClient(ClientId),
    DeregisterClient(ClientId),
}

impl<T> Message<T> {
    pub fn process_data(data: T) -> Self {
        Message::ProcessData(data)
    }
}
