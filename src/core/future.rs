//! # AsyncResult
//!
//! A single-assignment completion handle. The operation that creates it later
//! fulfills it with a value or cancels it; everyone else holds a clone and
//! either blocks in [`AsyncResult::join`] or registers callbacks.
//!
//! ```text
//!            fulfill(v)
//!   Pending ────────────▶ Fulfilled(v)
//!      │
//!      └── cancel() ────▶ Cancelled
//! ```
//!
//! Terminal states are final: a second `fulfill`/`cancel` is rejected with
//! [`FutureError::AlreadyCompleted`] and leaves the stored outcome alone.
//!
//! Callbacks are always delivered through the [`WorkerPool`], one job per
//! callback, so a slow callback never blocks the thread that completed the
//! result and never runs while the internal lock is held.

use log::{debug, error};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use super::pool::{WorkerPool, panic_message};

/// Terminal value observed by callbacks and `join`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Fulfilled(T),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }

    /// The fulfilled value, if any.
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Fulfilled(value) => Some(value),
            Outcome::Cancelled => None,
        }
    }
}

/// Snapshot of an `AsyncResult`'s state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State<T> {
    Pending,
    Fulfilled(T),
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureError {
    /// The result was already fulfilled or cancelled.
    AlreadyCompleted,
}

impl fmt::Display for FutureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FutureError::AlreadyCompleted => write!(f, "async result already completed"),
        }
    }
}

impl std::error::Error for FutureError {}

type Callback<T> = Box<dyn FnOnce(Outcome<T>) + Send>;

struct CallbackRecord<T> {
    callback: Callback<T>,
    trigger_on_cancel: bool,
}

struct Inner<T> {
    state: State<T>,
    callbacks: Vec<CallbackRecord<T>>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    finished: Condvar,
    pool: WorkerPool,
}

/// Shared handle to a single-assignment result. Clones observe the same state.
pub struct AsyncResult<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for AsyncResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> AsyncResult<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a pending result whose callbacks run on `pool`.
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: State::Pending,
                    callbacks: Vec::new(),
                }),
                finished: Condvar::new(),
                pool,
            }),
        }
    }

    /// Completes the result with `value` and schedules every callback.
    pub fn fulfill(&self, value: T) -> Result<(), FutureError> {
        self.finish(State::Fulfilled(value))
    }

    /// Cancels the result, scheduling only callbacks that trigger on cancel.
    pub fn cancel(&self) -> Result<(), FutureError> {
        self.finish(State::Cancelled)
    }

    /// Registers a callback that also runs when the result is cancelled.
    pub fn add_callback<F>(&self, callback: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        self.add_callback_with(callback, true);
    }

    /// Registers a callback. With `trigger_on_cancel == false` it is dropped
    /// unrun if the result gets cancelled.
    ///
    /// On an already completed result the callback is scheduled right away,
    /// never run on the registering thread.
    pub fn add_callback_with<F>(&self, callback: F, trigger_on_cancel: bool)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let record = CallbackRecord {
            callback: Box::new(callback),
            trigger_on_cancel,
        };
        let outcome = {
            let mut inner = self.lock();
            match outcome_of(&inner.state) {
                Some(outcome) => outcome,
                None => {
                    inner.callbacks.push(record);
                    return;
                }
            }
        };
        self.deliver(vec![record], &outcome);
    }

    /// Blocks until the result is fulfilled or cancelled.
    pub fn join(&self) -> Outcome<T> {
        let inner = self.lock();
        let inner = self
            .shared
            .finished
            .wait_while(inner, |inner| matches!(inner.state, State::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        match outcome_of(&inner.state) {
            Some(outcome) => outcome,
            // wait_while only returns once the state left Pending
            None => Outcome::Cancelled,
        }
    }

    pub fn state(&self) -> State<T> {
        self.lock().state.clone()
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.lock().state, State::Pending)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.lock().state, State::Cancelled)
    }

    fn finish(&self, terminal: State<T>) -> Result<(), FutureError> {
        let (callbacks, outcome) = {
            let mut inner = self.lock();
            if !matches!(inner.state, State::Pending) {
                return Err(FutureError::AlreadyCompleted);
            }
            inner.state = terminal;
            self.shared.finished.notify_all();
            let outcome = outcome_of(&inner.state).unwrap_or(Outcome::Cancelled);
            (std::mem::take(&mut inner.callbacks), outcome)
        };
        debug!(
            "Async result {} with {} callback(s)",
            if outcome.is_cancelled() { "cancelled" } else { "fulfilled" },
            callbacks.len()
        );
        self.deliver(callbacks, &outcome);
        Ok(())
    }

    fn deliver(&self, callbacks: Vec<CallbackRecord<T>>, outcome: &Outcome<T>) {
        for record in callbacks {
            if outcome.is_cancelled() && !record.trigger_on_cancel {
                continue;
            }
            let outcome = outcome.clone();
            let callback = record.callback;
            self.shared.pool.submit(move || {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(outcome))) {
                    error!(
                        "Exception occurred running async result callback: {}",
                        panic_message(payload.as_ref())
                    );
                }
            });
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for AsyncResult<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self
            .shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("AsyncResult")
            .field("state", &inner.state)
            .field("callbacks", &inner.callbacks.len())
            .finish()
    }
}

fn outcome_of<T: Clone>(state: &State<T>) -> Option<Outcome<T>> {
    match state {
        State::Pending => None,
        State::Fulfilled(value) => Some(Outcome::Fulfilled(value.clone())),
        State::Cancelled => Some(Outcome::Cancelled),
    }
}
