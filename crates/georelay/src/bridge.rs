//! Check step interposed after every engine call.
//!
//! The engine reports failure twice: in band through a sentinel return and
//! out of band through the error callback, which has already filled the
//! session's pending slot by the time the call returns. Each helper here
//! decodes one sentinel shape. On failure it drains the pending message into
//! the returned error. On success it discards any stale message so it cannot
//! be attributed to the next call.

use tracing::debug;

use crate::engine::{RawHandle, TriState, STATUS_OK};
use crate::error::{RelayError, Result, NO_RESULT};
use crate::session::Session;

impl Session {
    /// Pending failure, or the generic one when the engine stayed silent.
    pub(crate) fn take_failure(&self) -> RelayError {
        match self.0.pending.borrow_mut().take() {
            Some(message) => RelayError::engine(message),
            None => RelayError::engine(NO_RESULT),
        }
    }

    /// Drop a message raised by a call that still succeeded.
    pub(crate) fn settle(&self) {
        if let Some(stale) = self.0.pending.borrow_mut().take() {
            debug!(message = %stale, "discarding engine error from a successful call");
        }
    }

    /// `Some(v)` / `None` returns: handles, measures, strings, buffers.
    pub(crate) fn value<T>(&self, out: Option<T>) -> Result<T> {
        match out {
            Some(v) => {
                self.settle();
                Ok(v)
            }
            None => Err(self.take_failure()),
        }
    }

    #[inline]
    pub(crate) fn handle(&self, out: Option<RawHandle>) -> Result<RawHandle> {
        self.value(out)
    }

    /// Counts, ids and dimensions; `-1` is the failure sentinel.
    pub(crate) fn count(&self, out: i32) -> Result<usize> {
        self.value(usize::try_from(out).ok())
    }

    /// Setters; anything but `1` is failure.
    pub(crate) fn status(&self, out: i32) -> Result<()> {
        self.value((out == STATUS_OK).then_some(()))
    }

    /// Predicates; the unknown state surfaces the engine error.
    pub(crate) fn decide(&self, out: i8) -> Result<bool> {
        match TriState::from_raw(out) {
            TriState::True => self.value(Some(true)),
            TriState::False => self.value(Some(false)),
            TriState::Unknown => Err(self.take_failure()),
        }
    }
}

/// Index as the engine's `int`, or `IndexOutOfRange` if it cannot be one.
pub(crate) fn engine_index(index: usize, len: usize) -> Result<i32> {
    i32::try_from(index).map_err(|_| RelayError::IndexOutOfRange { index, len })
}
