//! Triple-buffered output hand-off between the acquisition worker and the
//! consumer.
//!
//! Three fixed slots rotate through the roles *fill* (being written by the
//! worker), *done* (most recent completed frame, unclaimed), and *lock*
//! (held by the consumer). The role indices and the freshness counter live
//! under one mutex; the 20 000-byte slots themselves are not locked. The
//! rotation protocol is what makes that sound: the worker only ever writes
//! the fill slot, the consumer only ever reads the lock slot, and the two
//! are never the same slot.
//!
//! Freshness counts completed frames not yet latched. It starts at -2 so the
//! first two frames (stale by the vendor's own documentation) are discarded,
//! and resets to 0 whenever the consumer latches.

use std::cell::UnsafeCell;
use std::sync::{Mutex, PoisonError};

use crate::{DepthImage, FRAME_PIXELS};

#[derive(Debug, Clone, Copy)]
struct Roles {
    fill: usize,
    done: Option<usize>,
    lock: Option<usize>,
    fresh: i32,
}

/// Point-in-time view of the role assignments and freshness counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSnapshot {
    pub fill: usize,
    pub done: Option<usize>,
    pub lock: Option<usize>,
    pub fresh: i32,
}

pub struct OutputRing {
    slots: [UnsafeCell<DepthImage>; 3],
    roles: Mutex<Roles>,
}

// SAFETY: the slots are plain pixel arrays with no interior pointers. Cross-
// thread access is disciplined by the role protocol above: mutation happens
// only through `with_fill` on the producer thread, reads only through `latch`
// on the consumer side, and the role bookkeeping (under the mutex) keeps the
// fill and lock indices distinct at all times.
unsafe impl Sync for OutputRing {}

impl Default for OutputRing {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputRing {
    pub fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new([0u16; FRAME_PIXELS]),
                UnsafeCell::new([0u16; FRAME_PIXELS]),
                UnsafeCell::new([0u16; FRAME_PIXELS]),
            ],
            roles: Mutex::new(Roles {
                fill: 0,
                done: None,
                lock: None,
                fresh: -2,
            }),
        }
    }

    fn lock_roles(&self) -> std::sync::MutexGuard<'_, Roles> {
        self.roles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with mutable access to the current fill slot.
    ///
    /// Must only be called from the producer thread. The closure runs outside
    /// the mutex: the fill index can only be reassigned by [`publish`], which
    /// the same producer thread calls, so it is stable for the duration.
    ///
    /// [`publish`]: OutputRing::publish
    pub fn with_fill<R>(&self, f: impl FnOnce(&mut DepthImage) -> R) -> R {
        let fill = self.lock_roles().fill;
        // SAFETY: only the producer writes any slot, and the consumer only
        // reads the lock slot; `fill != lock` is maintained by `publish` and
        // `latch`, so this exclusive borrow aliases nothing.
        let slot = unsafe { &mut *self.slots[fill].get() };
        f(slot)
    }

    /// Mark the fill slot complete and rotate. The freed slot chosen as the
    /// new fill is the lowest-indexed one that is neither done nor locked.
    pub fn publish(&self) {
        let mut st = self.lock_roles();
        st.done = Some(st.fill);
        st.fresh += 1;
        for i in 0..3 {
            if st.done != Some(i) && st.lock != Some(i) {
                st.fill = i;
                break;
            }
        }
        debug_assert_ne!(Some(st.fill), st.done);
        debug_assert_ne!(Some(st.fill), st.lock);
    }

    /// Completed frames not yet latched; <= 0 means nothing new.
    pub fn fresh(&self) -> i32 {
        self.lock_roles().fresh
    }

    /// Current role assignments, read under the mutex.
    pub fn roles(&self) -> RoleSnapshot {
        let st = self.lock_roles();
        RoleSnapshot {
            fill: st.fill,
            done: st.done,
            lock: st.lock,
            fresh: st.fresh,
        }
    }

    /// Latch the most recent completed frame for the consumer and return a
    /// borrow of it, or `None` when nothing fresh is available.
    ///
    /// # Safety
    ///
    /// At most one latched borrow may be live at a time, and it must be
    /// retired before the next `latch` call. The driver enforces this by
    /// handing the borrow out through `&mut self`.
    pub unsafe fn latch(&self) -> Option<&DepthImage> {
        let mut st = self.lock_roles();
        if st.fresh <= 0 {
            return None;
        }
        let done = st.done.take()?;
        st.lock = Some(done);
        st.fresh = 0;
        // SAFETY: `done` is now the lock slot; publish never selects it as
        // fill while it stays locked, so the producer will not write it for
        // the lifetime of this borrow (bounded by the caller's contract).
        Some(unsafe { &*self.slots[done].get() })
    }
}
