//! RAII guard for automatic monitor exit

use super::monitor::{self, MonitorError};
use crate::heap::{Heap, ObjRef};

/// Held monitor on one object (exits on drop)
///
/// Lets `synchronized` bodies and `join` leave the monitor on every path,
/// including early returns with a fault.
pub struct MonitorGuard {
    obj: ObjRef,
    exited: bool,
}

impl MonitorGuard {
    /// Enter `obj`'s monitor
    pub fn enter(heap: &Heap, obj: ObjRef) -> Result<Self, MonitorError> {
        monitor::lock(heap, obj)?;
        Ok(Self { obj, exited: false })
    }

    /// Guarded object
    pub fn object(&self) -> ObjRef {
        self.obj
    }

    /// Exit the monitor now, reporting errors instead of swallowing them
    pub fn exit(mut self) -> Result<(), MonitorError> {
        self.exited = true;
        monitor::unlock(self.obj)
    }
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        if !self.exited {
            if let Err(e) = monitor::unlock(self.obj) {
                tracing::error!(error = %e, "failed to exit monitor on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    #[test]
    fn test_guard_exits_on_drop() {
        let heap = Heap::new(1024).unwrap();
        let obj = heap
            .allocate(TypeRegistry::standard().unwrap().builtins().object, 0)
            .unwrap();
        {
            let guard = MonitorGuard::enter(&heap, obj).unwrap();
            assert_eq!(guard.object(), obj);
            assert!(monitor::holds_lock(obj));
        }
        assert!(!monitor::holds_lock(obj));

        let guard = MonitorGuard::enter(&heap, obj).unwrap();
        guard.exit().unwrap();
        assert!(!monitor::holds_lock(obj));
    }
}
