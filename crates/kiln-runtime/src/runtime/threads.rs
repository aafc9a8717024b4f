//! `java.lang.Thread` natives on the fault channel

use super::Runtime;
use crate::exception::{Fault, FaultKind, Throws};
use crate::heap::ObjRef;
use crate::thread::{self, ThreadError};

impl Runtime {
    fn thread_fault(&self, err: ThreadError) -> Fault {
        match err {
            ThreadError::Interrupted => self.fault(FaultKind::Interrupted),
            other => self.vm_error("thread misuse", &other),
        }
    }

    /// `Thread.start()`
    pub fn thread_start(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        thread::start(self, obj).map_err(|e| self.thread_fault(e))
    }

    /// `Thread.join()`
    pub fn thread_join(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        thread::join(self, obj).map_err(|e| self.thread_fault(e))
    }

    /// `Thread.sleep(long)`
    pub fn thread_sleep(&self, millis: i64) -> Throws<()> {
        thread::sleep(self, millis).map_err(|e| self.thread_fault(e))
    }

    /// `Thread.yield()`
    pub fn thread_yield(&self) {
        thread::yield_now();
    }

    /// `Thread.interrupt()`
    pub fn thread_interrupt(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        thread::interrupt(self, obj).map_err(|e| self.thread_fault(e))
    }

    /// `Thread.interrupted()`: test and clear the calling thread's flag
    pub fn thread_interrupted(&self) -> bool {
        self.current_thread_object()
            .map(|t| t.take_interrupt())
            .unwrap_or(false)
    }

    /// `Thread.currentThread()`
    ///
    /// Native threads the runtime did not start see the main thread.
    pub fn current_thread(&self) -> ObjRef {
        thread::bound_thread(self.id()).unwrap_or_else(|| self.main_thread())
    }
}
