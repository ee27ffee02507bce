// src/transport/tokio_exec.rs
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::messaging::error::{ReplyError, Result};

/// Drives async operations to completion from plain threads.
///
/// Holds a handle to the runtime that owns the connection's reader task, so
/// the blocking facade waits on the very same future as the async one. On a
/// `current_thread` runtime another thread must be inside `Runtime::block_on`
/// for timers and I/O to make progress; a multi-thread runtime has no such
/// restriction.
///
/// Calls made from inside a multi-thread runtime, on a worker or on a
/// `spawn_blocking` thread, go through `block_in_place`. Only a
/// `current_thread` runtime refuses them, since blocking its one thread
/// would stall the connection the call is waiting on.
#[derive(Debug, Clone, Default)]
pub struct BlockingExecutor {
    handle: Option<Handle>,
}

impl BlockingExecutor {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Captures the runtime the caller is currently running in, if any.
    pub fn current() -> Self {
        Self {
            handle: Handle::try_current().ok(),
        }
    }

    pub fn has_runtime(&self) -> bool {
        self.handle.is_some()
    }

    /// Blocks the calling thread until `future` completes.
    ///
    /// Returns `ReplyError::BlockingInAsyncContext` when called from a
    /// `current_thread` runtime, where tokio would otherwise panic.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output> {
        let handle = self.handle.as_ref().ok_or(ReplyError::NoRuntime)?;
        match Handle::try_current() {
            Err(_) => Ok(handle.block_on(future)),
            Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| handle.block_on(future)))
            }
            Ok(_) => Err(ReplyError::BlockingInAsyncContext),
        }
    }
}
