use std::fmt;
use std::mem;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::error::{LoadError, LoadResult};

type Transform<T, U> = Box<dyn FnOnce(T) -> U>;

enum State<T, U> {
    /// Nothing has been requested yet.
    Unset,
    Pending {
        rx: Receiver<LoadResult<T>>,
        transform: Transform<T, U>,
    },
    /// The raw value is here but has not been materialized.
    Arrived { raw: T, transform: Transform<T, U> },
    Ready(U),
    Failed(LoadError),
}

/// A value produced on a worker thread, pollable from the consumer thread
/// without blocking.
///
/// The optional transform runs at most once, the first time the value is
/// read through [`Lazy::get`]. Everything here is meant to live on a single
/// consumer thread, so the transform is free to touch consumer-side resources.
pub struct Lazy<T, U = T> {
    state: State<T, U>,
}

impl<T, U> Default for Lazy<T, U> {
    fn default() -> Self {
        Self { state: State::Unset }
    }
}

impl<T: 'static> Lazy<T, T> {
    pub fn pending(rx: Receiver<LoadResult<T>>) -> Self {
        Self::with_transform(rx, |raw| raw)
    }
}

impl<T, U> Lazy<T, U> {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn from_value(value: U) -> Self {
        Self { state: State::Ready(value) }
    }

    pub fn with_transform(
        rx: Receiver<LoadResult<T>>,
        transform: impl FnOnce(T) -> U + 'static,
    ) -> Self {
        Self {
            state: State::Pending { rx, transform: Box::new(transform) },
        }
    }

    /// False only for a result that was never requested.
    pub fn has_value(&self) -> bool {
        !matches!(self.state, State::Unset)
    }

    /// Still waiting on a worker.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending { .. })
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.state {
            State::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// True once a successful value has arrived. Never blocks.
    pub fn ready(&mut self) -> bool {
        self.poll();
        matches!(self.state, State::Arrived { .. } | State::Ready(_))
    }

    /// Returns the materialized value, blocking on the worker if it has not
    /// answered yet.
    pub fn get(&mut self) -> LoadResult<&U> {
        if let State::Pending { rx, .. } = &self.state {
            let received = rx.recv().unwrap_or(Err(LoadError::Cancelled));
            self.settle(received);
        }
        self.materialize();

        match &self.state {
            State::Ready(value) => Ok(value),
            State::Failed(e) => Err(e.clone()),
            State::Unset => Err(LoadError::NotRequested),
            State::Pending { .. } | State::Arrived { .. } => unreachable!("settled above"),
        }
    }

    pub fn get_or(&mut self, fallback: U) -> U
    where
        U: Clone,
    {
        if !self.ready() {
            return fallback;
        }
        match self.get() {
            Ok(value) => value.clone(),
            Err(_) => fallback,
        }
    }

    /// Takes the materialized value out, leaving the result unset.
    /// Results that arrived but were never read are dropped untransformed.
    pub fn take(&mut self) -> Option<U> {
        match mem::take(&mut self.state) {
            State::Ready(value) => Some(value),
            _ => None,
        }
    }

    fn poll(&mut self) {
        let State::Pending { rx, .. } = &self.state else {
            return;
        };
        match rx.try_recv() {
            Ok(received) => self.settle(received),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => self.settle(Err(LoadError::Cancelled)),
        }
    }

    fn settle(&mut self, received: LoadResult<T>) {
        let State::Pending { transform, .. } = mem::take(&mut self.state) else {
            return;
        };
        self.state = match received {
            Ok(raw) => State::Arrived { raw, transform },
            Err(e) => State::Failed(e),
        };
    }

    fn materialize(&mut self) {
        if let State::Arrived { .. } = self.state {
            if let State::Arrived { raw, transform } = mem::take(&mut self.state) {
                self.state = State::Ready(transform(raw));
            }
        }
    }
}

impl<T, U> Default for State<T, U> {
    fn default() -> Self {
        State::Unset
    }
}

impl<T, U: fmt::Debug> fmt::Debug for Lazy<T, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            State::Unset => f.write_str("Lazy::Unset"),
            State::Pending { .. } => f.write_str("Lazy::Pending"),
            State::Arrived { .. } => f.write_str("Lazy::Arrived"),
            State::Ready(value) => f.debug_tuple("Lazy::Ready").field(value).finish(),
            State::Failed(e) => f.debug_tuple("Lazy::Failed").field(e).finish(),
        }
    }
}
