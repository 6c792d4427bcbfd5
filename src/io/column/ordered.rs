use parking_lot::{Condvar, Mutex};

use crate::core::BlockcolError;

struct CommitState<T> {
    next: usize,
    aborted: bool,
    resource: T,
}

/// Serializes access to a shared resource (usually the output stream) in
/// ticket order: `commit(k, ..)` runs only after tickets `0..k` committed.
/// Workers compute concurrently and only the commits are ordered.
pub(crate) struct OrderedCommit<T> {
    state: Mutex<CommitState<T>>,
    turn: Condvar,
}

impl<T> OrderedCommit<T> {
    pub fn new(resource: T) -> Self {
        Self {
            state: Mutex::new(CommitState {
                next: 0,
                aborted: false,
                resource,
            }),
            turn: Condvar::new(),
        }
    }

    /// Wait for `ticket`'s turn and run `f` on the resource. Returns
    /// `Ok(None)` when the region was aborted before the turn came. A failing
    /// `f` aborts the region.
    pub fn commit<R>(
        &self,
        ticket: usize,
        f: impl FnOnce(&mut T) -> Result<R, BlockcolError>,
    ) -> Result<Option<R>, BlockcolError> {
        let mut state = self.state.lock();
        while state.next != ticket && !state.aborted {
            self.turn.wait(&mut state);
        }
        if state.aborted {
            return Ok(None);
        }
        let result = f(&mut state.resource);
        if result.is_ok() {
            state.next += 1;
        } else {
            state.aborted = true;
        }
        self.turn.notify_all();
        result.map(Some)
    }

    /// Wake all waiters and make every pending commit return `Ok(None)`.
    pub fn abort(&self) {
        self.state.lock().aborted = true;
        self.turn.notify_all();
    }

    /// Aborts the region if the current thread unwinds while the guard lives.
    pub fn abort_on_unwind(&self) -> AbortOnUnwind<'_, T> {
        AbortOnUnwind(self)
    }

    pub fn into_inner(self) -> T {
        self.state.into_inner().resource
    }
}

pub(crate) struct AbortOnUnwind<'a, T>(&'a OrderedCommit<T>);

impl<T> Drop for AbortOnUnwind<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort();
        }
    }
}
