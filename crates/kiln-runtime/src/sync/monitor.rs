//! Per-object monitors
//!
//! Each object header carries two lazily created handles: a [`MonitorLock`]
//! (re-entrant mutual exclusion) and a [`WaitSet`] (condition variable for
//! `wait`/`notify`). Handles are created by double-checked initialization:
//!
//! ```text
//! load slot (Acquire) ── non-null ──▶ use it
//!        │ null
//!        ▼
//! take global lock ─▶ reload slot ── non-null ──▶ use it
//!        │ still null
//!        ▼
//! allocate handle ─▶ store slot (Release) ─▶ release global lock
//! ```
//!
//! Handles are never torn down once published.
//!
//! Waiters are tracked as FIFO records inside the lock state. `notify`
//! marks the oldest unmarked record; a waiter leaves `wait` only after it
//! sees its own record marked or its thread interrupted, so a notification
//! always lands on exactly one waiter.

use crate::heap::{Heap, ObjRef};
use crate::thread::ThreadObject;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::alloc::Layout;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::thread::ThreadId;

/// Errors that can occur when using a monitor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonitorError {
    /// Unlock on an object whose monitor was never created
    #[error("Monitor was never locked")]
    NeverLocked,

    /// Unlock or wait by a thread that does not own the monitor
    #[error("Current thread does not own the monitor")]
    NotOwner,

    /// The lock or wait-set primitive could not be allocated
    #[error("Failed to create monitor primitive")]
    CreationFailed,

    /// The waiting thread was interrupted
    #[error("Wait interrupted")]
    Interrupted,
}

struct Waiter {
    id: u64,
    notified: bool,
}

struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
    waiters: VecDeque<Waiter>,
    next_waiter: u64,
}

/// Re-entrant lock behind an object's monitor
pub struct MonitorLock {
    state: Mutex<LockState>,
    entry: Condvar,
}

impl MonitorLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState {
                owner: None,
                depth: 0,
                waiters: VecDeque::new(),
                next_waiter: 0,
            }),
            entry: Condvar::new(),
        }
    }

    fn acquire(&self) -> MutexGuard<'_, LockState> {
        let me = std::thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.depth += 1;
            return state;
        }
        while state.owner.is_some() {
            self.entry.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = 1;
        state
    }

    fn release(&self) -> Result<(), MonitorError> {
        let mut state = self.state.lock();
        if state.owner != Some(std::thread::current().id()) {
            return Err(MonitorError::NotOwner);
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.entry.notify_one();
        }
        Ok(())
    }
}

/// Condition variable behind an object's monitor
pub struct WaitSet {
    cond: Condvar,
}

impl WaitSet {
    fn new() -> Self {
        Self {
            cond: Condvar::new(),
        }
    }
}

fn create_handle<T>(value: T) -> Result<*mut T, MonitorError> {
    let layout = Layout::new::<T>();
    // SAFETY: monitor primitives are never zero-sized.
    let raw = unsafe { std::alloc::alloc(layout) } as *mut T;
    if raw.is_null() {
        return Err(MonitorError::CreationFailed);
    }
    // SAFETY: raw is a fresh, properly aligned allocation for T.
    unsafe { raw.write(value) };
    Ok(raw)
}

fn ensure<T>(
    heap: &Heap,
    slot: &AtomicPtr<T>,
    make: fn() -> T,
    what: &'static str,
) -> Result<&'static T, MonitorError> {
    let existing = slot.load(Ordering::Acquire);
    if !existing.is_null() {
        // SAFETY: published handles are never freed.
        return Ok(unsafe { &*existing });
    }

    let _global = heap.global_lock();
    let existing = slot.load(Ordering::Acquire);
    if !existing.is_null() {
        return Ok(unsafe { &*existing });
    }
    let created = create_handle(make())?;
    slot.store(created, Ordering::Release);
    tracing::trace!(handle = what, "created monitor primitive");
    Ok(unsafe { &*created })
}

fn ensure_lock(heap: &Heap, obj: ObjRef) -> Result<&'static MonitorLock, MonitorError> {
    ensure(heap, obj.header().lock_slot(), MonitorLock::new, "lock")
}

fn ensure_wait_set(heap: &Heap, obj: ObjRef) -> Result<&'static WaitSet, MonitorError> {
    ensure(heap, obj.header().wait_slot(), WaitSet::new, "wait set")
}

fn existing_lock(obj: ObjRef) -> Option<&'static MonitorLock> {
    let raw = obj.header().lock_slot().load(Ordering::Acquire);
    // SAFETY: published handles are never freed.
    (!raw.is_null()).then(|| unsafe { &*raw })
}

fn existing_wait_set(obj: ObjRef) -> Option<&'static WaitSet> {
    let raw = obj.header().wait_slot().load(Ordering::Acquire);
    (!raw.is_null()).then(|| unsafe { &*raw })
}

/// Enter `obj`'s monitor, blocking until it is available
///
/// Re-entrant: the owning thread may lock again, and must unlock as many
/// times.
pub fn lock(heap: &Heap, obj: ObjRef) -> Result<(), MonitorError> {
    let monitor = ensure_lock(heap, obj)?;
    drop(monitor.acquire());
    Ok(())
}

/// Leave `obj`'s monitor once
pub fn unlock(obj: ObjRef) -> Result<(), MonitorError> {
    existing_lock(obj).ok_or(MonitorError::NeverLocked)?.release()
}

/// Whether the calling thread owns `obj`'s monitor
pub fn holds_lock(obj: ObjRef) -> bool {
    existing_lock(obj)
        .map(|monitor| monitor.state.lock().owner == Some(std::thread::current().id()))
        .unwrap_or(false)
}

/// Block on `obj`'s wait set until notified
///
/// The caller must own the monitor. It is released completely for the
/// duration of the wait and re-acquired with the same recursion depth
/// before returning, including when the wait ends by interruption.
pub fn wait(heap: &Heap, obj: ObjRef, current: Option<&ThreadObject>) -> Result<(), MonitorError> {
    let monitor = existing_lock(obj).ok_or(MonitorError::NotOwner)?;
    let wait_set = ensure_wait_set(heap, obj)?;
    let me = std::thread::current().id();

    let mut state = monitor.state.lock();
    if state.owner != Some(me) {
        return Err(MonitorError::NotOwner);
    }

    // Publish what we block on before looking at the flag, so an interrupter
    // either sees the flag consumed here or finds us to wake.
    if let Some(thread) = current {
        thread.set_blocked_on(Some(obj));
        if thread.take_interrupt() {
            thread.set_blocked_on(None);
            return Err(MonitorError::Interrupted);
        }
    }

    let id = state.next_waiter;
    state.next_waiter += 1;
    state.waiters.push_back(Waiter { id, notified: false });
    let depth = state.depth;
    state.owner = None;
    state.depth = 0;
    monitor.entry.notify_one();

    let outcome = loop {
        wait_set.cond.wait(&mut state);

        let position = state.waiters.iter().position(|w| w.id == id);
        let notified = position.map(|i| state.waiters[i].notified).unwrap_or(false);
        if notified {
            if let Some(i) = position {
                state.waiters.remove(i);
            }
            break Ok(());
        }
        if current.map(|t| t.take_interrupt()).unwrap_or(false) {
            if let Some(i) = position {
                state.waiters.remove(i);
            }
            break Err(MonitorError::Interrupted);
        }
    };

    while state.owner.is_some() {
        monitor.entry.wait(&mut state);
    }
    state.owner = Some(me);
    state.depth = depth;
    drop(state);

    if let Some(thread) = current {
        thread.set_blocked_on(None);
    }
    outcome
}

/// Wake the longest-waiting thread on `obj`, if any
pub fn notify(heap: &Heap, obj: ObjRef) -> Result<(), MonitorError> {
    wake(heap, obj, false)
}

/// Wake every thread waiting on `obj`
pub fn notify_all(heap: &Heap, obj: ObjRef) -> Result<(), MonitorError> {
    wake(heap, obj, true)
}

fn wake(heap: &Heap, obj: ObjRef, all: bool) -> Result<(), MonitorError> {
    let wait_set = ensure_wait_set(heap, obj)?;
    // No lock handle means nobody ever owned the monitor, so nobody waits.
    let Some(monitor) = existing_lock(obj) else {
        return Ok(());
    };

    let mut state = monitor.state.lock();
    let mut woke = false;
    for waiter in state.waiters.iter_mut().filter(|w| !w.notified) {
        waiter.notified = true;
        woke = true;
        if !all {
            break;
        }
    }
    if woke {
        wait_set.cond.notify_all();
    }
    Ok(())
}

/// Rouse every waiter on `obj` so interrupted ones can notice their flag
pub(crate) fn wake_waiters(obj: ObjRef) {
    if let (Some(monitor), Some(wait_set)) = (existing_lock(obj), existing_wait_set(obj)) {
        let _state = monitor.state.lock();
        wait_set.cond.notify_all();
    }
}
