//! Thread lifecycle
//!
//! Every `java.lang.Thread` object is backed by one native OS thread:
//!
//! ```text
//!            start()                body returns            join()
//!   New ─────────────────▶ Running ─────────────▶ Terminated ─────▶ Joined
//!                          (trampoline runs `run`,   (monitor
//!                           faults are discarded)     notified)
//! ```
//!
//! The native side of a thread object (join handle and the handle used to
//! unpark it) lives in a [`NativeSlot`] published through the object's
//! `native` field. Like monitor handles, slots are created once and never
//! torn down, so an interrupter can always dereference one it has loaded.

use crate::exception::Throws;
use crate::heap::{HeapLayout, ObjRef, ObjectHeader};
use crate::runtime::Runtime;
use crate::sync::{self, MonitorError, MonitorGuard};
use crate::types::{is_instance, methods};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{fence, AtomicBool, AtomicPtr, AtomicU64, AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Errors that can occur when managing threads
#[derive(Debug, thiserror::Error)]
pub enum ThreadError {
    /// `start` on a thread that is not new
    #[error("Thread already started")]
    AlreadyStarted,

    /// `join` on a thread that was never started
    #[error("Thread not started")]
    NotStarted,

    /// The object is not a `java.lang.Thread`
    #[error("{0} is not a thread")]
    NotAThread(&'static str),

    /// The OS refused to create a thread
    #[error("Failed to spawn native thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The calling thread was interrupted while blocked
    #[error("Thread interrupted")]
    Interrupted,

    /// Monitor failure while joining
    #[error(transparent)]
    Monitor(MonitorError),
}

impl From<MonitorError> for ThreadError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Interrupted => ThreadError::Interrupted,
            other => ThreadError::Monitor(other),
        }
    }
}

/// Lifecycle state of a thread object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadState {
    /// Allocated, not started
    New = 0,
    /// Native thread running the body
    Running = 1,
    /// Body finished, not yet joined
    Terminated = 2,
    /// Joined
    Joined = 3,
}

impl ThreadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ThreadState::New,
            1 => ThreadState::Running,
            2 => ThreadState::Terminated,
            _ => ThreadState::Joined,
        }
    }
}

/// Native resources of a started (or bound) thread
pub struct NativeSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
    waker: OnceCell<std::thread::Thread>,
}

impl NativeSlot {
    fn new() -> Self {
        Self {
            handle: Mutex::new(None),
            waker: OnceCell::new(),
        }
    }

    fn unpark(&self) {
        if let Some(thread) = self.waker.get() {
            thread.unpark();
        }
    }
}

/// Layout of `java.lang.Thread`
#[repr(C)]
pub struct ThreadObject {
    header: ObjectHeader,
    native: AtomicPtr<NativeSlot>,
    blocked_on: AtomicPtr<ObjectHeader>,
    tid: AtomicU64,
    state: AtomicU8,
    interrupted: AtomicBool,
}

// SAFETY: repr(C), header first, all-zero is a New thread with no slot.
unsafe impl HeapLayout for ThreadObject {}

impl ThreadObject {
    /// Lifecycle state
    pub fn state(&self) -> ThreadState {
        ThreadState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ThreadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Thread id assigned by the constructor
    pub fn tid(&self) -> u64 {
        self.tid.load(Ordering::Relaxed)
    }

    /// Whether an interrupt is pending
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Consume a pending interrupt
    pub(crate) fn take_interrupt(&self) -> bool {
        self.interrupted.swap(false, Ordering::SeqCst)
    }

    /// Record the monitor this thread is about to wait on
    pub(crate) fn set_blocked_on(&self, obj: Option<ObjRef>) {
        let raw = obj.map(ObjRef::as_ptr).unwrap_or(std::ptr::null_mut());
        self.blocked_on.store(raw, Ordering::SeqCst);
    }

    fn native_slot(&self) -> Option<&'static NativeSlot> {
        let raw = self.native.load(Ordering::Acquire);
        // SAFETY: slots are leaked when published and never freed.
        (!raw.is_null()).then(|| unsafe { &*raw })
    }

    fn publish_slot(&self) -> &'static NativeSlot {
        if let Some(slot) = self.native_slot() {
            return slot;
        }
        let fresh = Box::into_raw(Box::new(NativeSlot::new()));
        match self.native.compare_exchange(
            std::ptr::null_mut(),
            fresh,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            // SAFETY: published slots are never freed.
            Ok(_) => unsafe { &*fresh },
            Err(existing) => {
                // SAFETY: fresh lost the race and was never shared.
                drop(unsafe { Box::from_raw(fresh) });
                unsafe { &*existing }
            }
        }
    }
}

/// `Thread.<init>()`: assign a thread id
pub fn thread_init(rt: &Runtime, this: ObjRef) -> Throws<()> {
    // SAFETY: registered only on Thread, whose layout is ThreadObject.
    let thread = unsafe { this.cast::<ThreadObject>() };
    thread.tid.store(rt.next_thread_id(), Ordering::Relaxed);
    Ok(())
}

/// `Thread.run()`: does nothing unless overridden
pub fn thread_run(_rt: &Runtime, _this: ObjRef) -> Throws<()> {
    Ok(())
}

thread_local! {
    static CURRENT: Cell<Option<(u64, ObjRef)>> = const { Cell::new(None) };
}

/// Associate the calling native thread with the thread object `obj`
pub(crate) fn bind_current(rt: &Runtime, obj: ObjRef) -> Result<(), ThreadError> {
    let thread = as_thread(rt, obj)?;
    let slot = thread.publish_slot();
    let _ = slot.waker.set(std::thread::current());
    // Pairs with the fence in `interrupt`: either it sees our waker or we
    // see its flag.
    fence(Ordering::SeqCst);
    CURRENT.with(|current| current.set(Some((rt.id(), obj))));
    Ok(())
}

/// Adopt the booting thread as the running main thread `obj`
pub(crate) fn bind_main(rt: &Runtime, obj: ObjRef) -> Result<(), ThreadError> {
    as_thread(rt, obj)?.set_state(ThreadState::Running);
    bind_current(rt, obj)
}

fn unbind_current() {
    CURRENT.with(|current| current.set(None));
}

/// Thread object bound to the calling native thread in runtime `runtime_id`
pub(crate) fn bound_thread(runtime_id: u64) -> Option<ObjRef> {
    CURRENT.with(|current| match current.get() {
        Some((id, obj)) if id == runtime_id => Some(obj),
        _ => None,
    })
}

/// View `obj` as a thread object
pub fn as_thread(rt: &Runtime, obj: ObjRef) -> Result<&ThreadObject, ThreadError> {
    let ty = obj.type_descriptor();
    if !is_instance(Some(ty), rt.builtins().thread) {
        return Err(ThreadError::NotAThread(ty.name()));
    }
    // SAFETY: every Thread subclass begins with the ThreadObject layout.
    Ok(unsafe { &*(obj.as_ptr() as *const ThreadObject) })
}

/// Start the native thread behind `obj`
pub fn start(rt: &Runtime, obj: ObjRef) -> Result<(), ThreadError> {
    let thread = as_thread(rt, obj)?;
    thread
        .state
        .compare_exchange(
            ThreadState::New as u8,
            ThreadState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map_err(|_| ThreadError::AlreadyStarted)?;

    let slot = thread.publish_slot();
    let runtime = rt.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("kiln-thread-{}", thread.tid()))
        .spawn(move || trampoline(runtime, obj));

    match spawned {
        Ok(handle) => {
            *slot.handle.lock() = Some(handle);
            tracing::debug!(tid = thread.tid(), ty = obj.type_descriptor().name(), "thread started");
            Ok(())
        }
        Err(e) => {
            thread.set_state(ThreadState::New);
            Err(ThreadError::Spawn(e))
        }
    }
}

fn trampoline(rt: Runtime, obj: ObjRef) {
    if let Err(e) = bind_current(&rt, obj) {
        tracing::error!(error = %e, "thread trampoline on a non-thread object");
        return;
    }

    let run = obj.type_descriptor().vtable().resolve(methods::RUN);
    let outcome = catch_unwind(AssertUnwindSafe(|| match run {
        Some(body) => body(&rt, obj),
        None => Ok(()),
    }));

    // SAFETY: bind_current verified the layout.
    let thread = unsafe { &*(obj.as_ptr() as *const ThreadObject) };
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(fault)) => {
            tracing::warn!(tid = thread.tid(), %fault, "discarding uncaught fault in thread");
        }
        Err(_) => {
            tracing::warn!(tid = thread.tid(), "thread body panicked");
        }
    }

    finish(&rt, obj, thread);
    unbind_current();
}

fn finish(rt: &Runtime, obj: ObjRef, thread: &ThreadObject) {
    match MonitorGuard::enter(rt.heap(), obj) {
        Ok(guard) => {
            thread.set_state(ThreadState::Terminated);
            if let Err(e) = sync::notify_all(rt.heap(), obj) {
                tracing::error!(error = %e, "failed to notify joiners");
            }
            drop(guard);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to enter thread monitor on exit");
            thread.set_state(ThreadState::Terminated);
        }
    }
    tracing::debug!(tid = thread.tid(), "thread terminated");
}

/// Wait for the thread behind `obj` to finish
///
/// Joining a thread that has already been joined returns immediately.
pub fn join(rt: &Runtime, obj: ObjRef) -> Result<(), ThreadError> {
    let target = as_thread(rt, obj)?;
    match target.state() {
        ThreadState::New => return Err(ThreadError::NotStarted),
        ThreadState::Joined => return Ok(()),
        ThreadState::Running | ThreadState::Terminated => {}
    }

    let current = rt.current_thread_object();
    let guard = MonitorGuard::enter(rt.heap(), obj)?;
    while target.state() == ThreadState::Running {
        sync::wait(rt.heap(), obj, current)?;
    }
    guard.exit()?;

    if let Some(slot) = target.native_slot() {
        let handle = slot.handle.lock().take();
        if let Some(handle) = handle {
            // The trampoline catches panics, so an error here carries nothing.
            let _ = handle.join();
        }
    }
    target.set_state(ThreadState::Joined);
    tracing::debug!(tid = target.tid(), "thread joined");
    Ok(())
}

/// Block the calling thread for at least `millis` milliseconds
///
/// Negative durations sleep for zero. A pending or arriving interrupt ends
/// the sleep early with [`ThreadError::Interrupted`].
pub fn sleep(rt: &Runtime, millis: i64) -> Result<(), ThreadError> {
    let current = rt.current_thread_object();
    let deadline = Instant::now() + Duration::from_millis(millis.max(0) as u64);
    loop {
        if current.map(ThreadObject::take_interrupt).unwrap_or(false) {
            return Err(ThreadError::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::park_timeout(deadline - now);
    }
}

/// Hint the scheduler to run another thread
pub fn yield_now() {
    std::thread::yield_now();
}

/// Interrupt the thread behind `obj`
///
/// Sets its flag, wakes it if it sleeps, and rouses the monitor it waits on.
pub fn interrupt(rt: &Runtime, obj: ObjRef) -> Result<(), ThreadError> {
    let target = as_thread(rt, obj)?;
    target.interrupted.store(true, Ordering::SeqCst);
    fence(Ordering::SeqCst);

    if let Some(slot) = target.native_slot() {
        slot.unpark();
    }
    let blocked = target.blocked_on.load(Ordering::SeqCst);
    // SAFETY: blocked_on only ever holds live object headers.
    if let Some(monitor) = unsafe { ObjRef::from_raw(blocked) } {
        sync::wake_waiters(monitor);
    }
    Ok(())
}
