//! A small structured, typed event-logging registry.
//!
//! Every process in a simulation may want to record timed streams of
//! typed events (a message sent, a node migrated, a mutex acquired) without
//! forcing every consumer to agree on a single event type. A [`Registry`]
//! binds string names to independently-typed [`Logger`] streams, each
//! buffering `(Duration, T)` pairs and flushing them to a caller-supplied
//! action.
//!
//! This complements, rather than replaces, ordinary text logging via the
//! `log` crate: the registry is for callers that want programmatic access
//! to timed event streams (e.g. to build a CSV trace of mutex contention),
//! while `log::debug!`/`log::warn!` remain the default for diagnostic
//! output throughout the rest of the workspace.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// A map from stream names to independently-typed [`Logger`]s, scoped to a
/// single process (identified by `rank`).
pub struct Registry {
    time: Instant,
    rank: i32,
    map: HashMap<String, Box<dyn Any>>,
}

impl Registry {
    /// Creates a new registry for the given rank, with `time` as the
    /// common instant against which every logged event's timestamp is
    /// measured.
    pub fn new(time: Instant, rank: i32) -> Self {
        Registry { time, rank, map: HashMap::new() }
    }

    /// The rank this registry was created for.
    pub fn rank(&self) -> i32 {
        self.rank
    }

    /// Binds a stream name to an action invoked on log event batches.
    ///
    /// Returns any logger previously bound to `name`; existing clones of
    /// the old logger keep writing to the old destination; new calls to
    /// [`Registry::get`] observe the new one.
    pub fn insert<T: 'static>(
        &mut self,
        name: impl Into<String>,
        action: Box<dyn Fn(&Duration, &[(Duration, T)])>,
    ) -> Option<Box<dyn Any>> {
        let logger = Logger::<T>::new(self.time, action);
        self.map.insert(name.into(), Box::new(logger))
    }

    /// Removes a bound logger, signalling end-of-stream to any holder of
    /// a clone once its buffer is dropped.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn Any>> {
        self.map.remove(name)
    }

    /// Retrieves a clone of a bound logger, if `name` is registered.
    pub fn get<T: 'static>(&self, name: &str) -> Option<Logger<T>> {
        self.map
            .get(name)
            .and_then(|entry| entry.downcast_ref::<Logger<T>>())
            .cloned()
    }

    /// Flushes every registered logger that implements flush-on-demand.
    ///
    /// Loggers are type-erased, so this only flushes loggers the caller
    /// still holds a typed handle to; use [`Logger::flush`] directly in
    /// that case. This method exists for parity with callers that keep
    /// the `Registry` itself as their only handle.
    pub fn flush_known<T: 'static>(&self, name: &str) {
        if let Some(logger) = self.get::<T>(name) {
            logger.flush();
        }
    }
}

/// A cheaply-cloneable, buffering logger for one typed event stream.
pub struct Logger<T> {
    time: Instant,
    action: Rc<Box<dyn Fn(&Duration, &[(Duration, T)])>>,
    buffer: Rc<RefCell<Vec<(Duration, T)>>>,
}

impl<T> Clone for Logger<T> {
    fn clone(&self) -> Self {
        Logger { time: self.time, action: Rc::clone(&self.action), buffer: Rc::clone(&self.buffer) }
    }
}

impl<T> Logger<T> {
    /// Allocates a new logger bound to `action`, timestamped relative to
    /// `time`.
    pub fn new(time: Instant, action: Box<dyn Fn(&Duration, &[(Duration, T)])>) -> Self {
        Logger { time, action: Rc::new(action), buffer: Rc::new(RefCell::new(Vec::with_capacity(1024))) }
    }

    /// Buffers an event, timestamped at the moment of the call.
    ///
    /// Flushes automatically once the buffer reaches its initial capacity.
    pub fn log(&self, event: T) {
        let mut buffer = self.buffer.borrow_mut();
        buffer.push((self.time.elapsed(), event));
        if buffer.len() == buffer.capacity() {
            (self.action)(&self.time.elapsed(), &buffer[..]);
            buffer.clear();
        }
    }

    /// Forces the buffered events to the destination action.
    pub fn flush(&self) {
        let mut buffer = self.buffer.borrow_mut();
        (self.action)(&self.time.elapsed(), &buffer[..]);
        buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell as StdRefCell;

    #[test]
    fn logger_flushes_on_demand() {
        let seen = Rc::new(StdRefCell::new(Vec::new()));
        let seen2 = Rc::clone(&seen);
        let logger = Logger::<&'static str>::new(
            Instant::now(),
            Box::new(move |_now, events| {
                for (_, e) in events {
                    seen2.borrow_mut().push(*e);
                }
            }),
        );
        logger.log("a");
        logger.log("b");
        assert!(seen.borrow().is_empty());
        logger.flush();
        assert_eq!(*seen.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn registry_get_returns_clone_sharing_buffer() {
        let mut registry = Registry::new(Instant::now(), 3);
        assert_eq!(registry.rank(), 3);
        registry.insert::<u32>("events", Box::new(|_, _| {}));
        let logger_a = registry.get::<u32>("events").expect("registered");
        let logger_b = registry.get::<u32>("events").expect("registered");
        logger_a.log(1);
        // Both handles observe the same shared buffer.
        assert_eq!(logger_b.buffer.borrow().len(), 1);
    }
}
