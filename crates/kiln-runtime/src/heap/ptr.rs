//! References to heap objects
//!
//! [`ObjRef`] is the runtime's object reference: a non-null pointer to an
//! [`ObjectHeader`]. Nullable references are `Option<ObjRef>`, which has the
//! same size as a raw pointer and is all-zero when absent, so reference
//! fields inside zero-filled objects start out as `None`.

use super::header::ObjectHeader;
use crate::types::TypeDescriptor;
use std::fmt;
use std::ptr::NonNull;

/// Marker for `#[repr(C)]` object layouts
///
/// # Safety
///
/// Implementors must be `#[repr(C)]`, start with an [`ObjectHeader`], and be
/// valid when every byte is zero.
pub unsafe trait HeapLayout: Sized {
    /// Instance size in bytes
    const SIZE: usize = std::mem::size_of::<Self>();
}

/// Reference to a heap object
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ObjRef(NonNull<ObjectHeader>);

// SAFETY: heap objects are never freed or moved while the runtime is alive,
// and all mutable state reachable through the header is atomic or guarded
// by a monitor.
unsafe impl Send for ObjRef {}
unsafe impl Sync for ObjRef {}

impl ObjRef {
    #[inline]
    pub(crate) fn from_non_null(ptr: NonNull<ObjectHeader>) -> Self {
        ObjRef(ptr)
    }

    /// Rebuild a reference from a raw pointer (null yields `None`)
    ///
    /// # Safety
    ///
    /// A non-null `ptr` must point to a live object allocated by a runtime heap.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut ObjectHeader) -> Option<Self> {
        NonNull::new(ptr).map(ObjRef)
    }

    /// Raw pointer to the header
    #[inline]
    pub fn as_ptr(self) -> *mut ObjectHeader {
        self.0.as_ptr()
    }

    /// Object address
    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// The object's header
    #[inline]
    pub fn header(&self) -> &ObjectHeader {
        // SAFETY: ObjRef always points to a live, stamped object.
        unsafe { self.0.as_ref() }
    }

    /// The object's runtime type
    #[inline]
    pub fn type_descriptor(self) -> &'static TypeDescriptor {
        self.header().type_descriptor()
    }

    /// View the object through a typed layout
    ///
    /// # Safety
    ///
    /// The object must have been allocated with at least `T::SIZE` bytes for
    /// a type whose layout is `T` (or begins with `T`).
    #[inline]
    pub unsafe fn cast<T: HeapLayout>(&self) -> &T {
        &*(self.0.as_ptr() as *const T)
    }

    /// Pointer to the field `offset` bytes from the object start
    ///
    /// # Safety
    ///
    /// `offset + size_of::<T>()` must lie within the object's allocation.
    #[inline]
    pub unsafe fn field_ptr<T>(self, offset: usize) -> *mut T {
        (self.0.as_ptr() as *mut u8).add(offset) as *mut T
    }

    /// Read a field at `offset`
    ///
    /// # Safety
    ///
    /// See [`field_ptr`](Self::field_ptr); concurrent writers must be excluded
    /// by a monitor.
    #[inline]
    pub unsafe fn read_field<T: Copy>(self, offset: usize) -> T {
        self.field_ptr::<T>(offset).read_unaligned()
    }

    /// Write a field at `offset`
    ///
    /// # Safety
    ///
    /// See [`read_field`](Self::read_field).
    #[inline]
    pub unsafe fn write_field<T: Copy>(self, offset: usize, value: T) {
        self.field_ptr::<T>(offset).write_unaligned(value)
    }
}

impl fmt::Debug for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjRef({:#x}: {})", self.addr(), self.type_descriptor().name())
    }
}
