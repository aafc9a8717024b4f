//! Backing region for the bump allocator
//!
//! An [`Arena`] owns one contiguous, zero-initialized block of memory. It
//! knows nothing about cursors or locking; [`Heap`](super::Heap) carves
//! objects out of it.
//!
//! A region is never returned to the allocator. [`ObjRef`](super::ObjRef)
//! and faults are plain copyable pointers that may outlive the runtime that
//! handed them out, so the memory stays mapped until the process exits.

use super::AllocError;
use std::alloc::{alloc_zeroed, Layout};
use std::ptr::NonNull;

/// Machine word size; every reservation is rounded up to a multiple of it
pub const WORD: usize = std::mem::size_of::<usize>();

/// Alignment of the region base
const REGION_ALIGN: usize = 16;

/// Round `size` up to the next word boundary, saturating at the top of the
/// address space
#[inline]
pub fn align_to_word(size: usize) -> usize {
    match size.checked_add(WORD - 1) {
        Some(padded) => padded & !(WORD - 1),
        None => usize::MAX & !(WORD - 1),
    }
}

/// A single contiguous memory region
pub struct Arena {
    base: NonNull<u8>,
    layout: Layout,
}

impl Arena {
    /// Reserve a zeroed region of `capacity` bytes (rounded down to whole words)
    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        let usable = capacity & !(WORD - 1);
        if usable == 0 {
            return Err(AllocError::RegionUnavailable { size: capacity });
        }

        let layout = Layout::from_size_align(usable, REGION_ALIGN)
            .map_err(|_| AllocError::RegionUnavailable { size: capacity })?;

        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = NonNull::new(ptr).ok_or(AllocError::RegionUnavailable { size: capacity })?;

        Ok(Self { base, layout })
    }

    /// Usable size in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Address of the first byte of the region
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Pointer to `offset` bytes into the region
    ///
    /// # Safety
    ///
    /// `offset` must not exceed the capacity.
    #[inline]
    pub(crate) unsafe fn at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.capacity());
        NonNull::new_unchecked(self.base.as_ptr().add(offset))
    }

    /// Whether `addr` falls inside the region
    pub fn contains(&self, addr: usize) -> bool {
        let start = self.base.as_ptr() as usize;
        addr >= start && addr < start + self.capacity()
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("capacity", &self.capacity())
            .finish()
    }
}

// SAFETY: the region is plain memory; all access to the bytes is coordinated
// by Heap (cursor under the global lock, disjoint reservations).
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}
