//! Monitor operations on the fault channel

use super::Runtime;
use crate::exception::{Fault, FaultKind, Throws};
use crate::heap::ObjRef;
use crate::sync::{self, MonitorError};

impl Runtime {
    fn monitor_fault(&self, err: MonitorError) -> Fault {
        match err {
            MonitorError::Interrupted => self.fault(FaultKind::Interrupted),
            other => self.vm_error("monitor misuse", &other),
        }
    }

    /// `monitorenter`
    pub fn monitor_enter(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        sync::lock(self.heap(), obj).map_err(|e| self.monitor_fault(e))
    }

    /// `monitorexit`
    pub fn monitor_exit(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        sync::unlock(obj).map_err(|e| self.monitor_fault(e))
    }

    /// `Object.wait()`
    pub fn monitor_wait(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        sync::wait(self.heap(), obj, self.current_thread_object()).map_err(|e| self.monitor_fault(e))
    }

    /// `Object.notify()`
    pub fn monitor_notify(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        sync::notify(self.heap(), obj).map_err(|e| self.monitor_fault(e))
    }

    /// `Object.notifyAll()`
    pub fn monitor_notify_all(&self, obj: Option<ObjRef>) -> Throws<()> {
        let obj = self.null_check(obj)?;
        sync::notify_all(self.heap(), obj).map_err(|e| self.monitor_fault(e))
    }

    /// Run `body` inside `obj`'s monitor
    ///
    /// The monitor is exited whether or not `body` faults; the body's fault
    /// wins over a failure to exit.
    pub fn synchronized<T, F>(&self, obj: Option<ObjRef>, body: F) -> Throws<T>
    where
        F: FnOnce() -> Throws<T>,
    {
        self.monitor_enter(obj)?;
        let result = body();
        let exited = self.monitor_exit(obj);
        let value = result?;
        exited?;
        Ok(value)
    }
}
