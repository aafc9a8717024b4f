//! Object header
//!
//! Every heap value starts with an [`ObjectHeader`]:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ ObjectHeader (3 words)                  │
//! │  - type: *const TypeDescriptor          │  stamped at allocation
//! │  - lock: *mut MonitorLock               │  null until first lock
//! │  - wait: *mut WaitSet                   │  null until first wait/notify
//! ├─────────────────────────────────────────┤
//! │ Instance fields (compiled layout)       │
//! └─────────────────────────────────────────┘
//! ```
//!
//! All-zero bytes are a valid (if untyped) header, which is what the
//! allocator relies on when it zero-fills a reservation.

use crate::sync::{MonitorLock, WaitSet};
use crate::types::TypeDescriptor;
use std::sync::atomic::{AtomicPtr, Ordering};

/// Size of the header in bytes
pub const HEADER_SIZE: usize = std::mem::size_of::<ObjectHeader>();

/// Leading fields of every heap object
#[repr(C)]
pub struct ObjectHeader {
    /// Type descriptor, immutable after allocation
    ty: *const TypeDescriptor,

    /// Lazily created monitor lock
    lock: AtomicPtr<MonitorLock>,

    /// Lazily created wait set
    wait: AtomicPtr<WaitSet>,
}

impl ObjectHeader {
    /// Stamp the type into a freshly zeroed header
    ///
    /// # Safety
    ///
    /// `header` must point to writable, zeroed memory that no other thread
    /// can observe yet.
    #[inline]
    pub(crate) unsafe fn stamp(header: *mut ObjectHeader, ty: &'static TypeDescriptor) {
        std::ptr::addr_of_mut!((*header).ty).write(ty as *const TypeDescriptor);
    }

    /// The object's type descriptor
    #[inline]
    pub fn type_descriptor(&self) -> &'static TypeDescriptor {
        // SAFETY: the allocator stamps a 'static descriptor before the
        // object is handed out, and the field is never written again.
        unsafe { &*self.ty }
    }

    #[inline]
    pub(crate) fn lock_slot(&self) -> &AtomicPtr<MonitorLock> {
        &self.lock
    }

    #[inline]
    pub(crate) fn wait_slot(&self) -> &AtomicPtr<WaitSet> {
        &self.wait
    }

    /// Whether a monitor lock has been created for this object
    pub fn has_lock(&self) -> bool {
        !self.lock.load(Ordering::Acquire).is_null()
    }

    /// Whether a wait set has been created for this object
    pub fn has_wait_set(&self) -> bool {
        !self.wait.load(Ordering::Acquire).is_null()
    }
}
