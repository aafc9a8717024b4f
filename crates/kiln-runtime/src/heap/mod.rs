//! Bump-pointer object heap
//!
//! The heap is a single [`Arena`] plus a cursor. The cursor lives inside the
//! runtime's global lock, so taking the lock is the same as claiming the
//! right to move it:
//!
//! ```text
//!  base                      cursor                       base + capacity
//!   │ obj │ obj │  obj  │ obj │░░░░░░░░░░░░░ free ░░░░░░░░░░░░│
//!   └─────────── handed out ──┘
//! ```
//!
//! Nothing is ever freed. A request that would run past the end still moves
//! the cursor (the bytes it skipped are simply lost), which keeps the
//! exhausted state sticky: once one allocation fails, every later one fails
//! too.

mod arena;
mod array;
mod header;
mod ptr;

pub use arena::{align_to_word, Arena, WORD};
pub use array::{array_size, ArrayElement, ArrayObject, ARRAY_DATA_OFFSET};
pub use header::{ObjectHeader, HEADER_SIZE};
pub use ptr::{HeapLayout, ObjRef};

use crate::types::{TypeDescriptor, TypeKind};
use parking_lot::{Mutex, MutexGuard};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};

/// Errors that can occur when allocating
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// A negative size was requested
    #[error("Negative allocation size {0}")]
    NegativeSize(isize),

    /// The arena has no room left for the request
    #[error("Out of memory: {requested} bytes requested at offset {offset}")]
    OutOfMemory {
        /// Rounded request size
        requested: usize,
        /// Cursor position the request was reserved at
        offset: usize,
    },

    /// The backing region could not be obtained
    #[error("Unable to reserve a heap region of {size} bytes")]
    RegionUnavailable {
        /// Requested region size
        size: usize,
    },
}

/// Snapshot of heap usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Usable bytes in the arena
    pub capacity: usize,
    /// Bytes handed out (never more than the capacity)
    pub used: usize,
    /// Whether an allocation has failed for lack of space
    pub exhausted: bool,
}

/// Arena plus cursor
pub struct Heap {
    arena: Arena,

    /// Cursor offset. The mutex doubles as the runtime's global lock.
    global: Mutex<usize>,

    /// Set on the first out-of-memory failure
    exhausted: AtomicBool,
}

impl Heap {
    /// Reserve a heap of `capacity` bytes
    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        Ok(Self {
            arena: Arena::new(capacity)?,
            global: Mutex::new(0),
            exhausted: AtomicBool::new(false),
        })
    }

    /// Allocate a zero-filled object of `size` bytes stamped with `ty`
    ///
    /// Sizes smaller than the layout `ty` implies are rounded up to it; every
    /// size is rounded up to a whole word.
    pub fn allocate(&self, ty: &'static TypeDescriptor, size: isize) -> Result<ObjRef, AllocError> {
        if size < 0 {
            return Err(AllocError::NegativeSize(size));
        }
        let requested = align_to_word((size as usize).max(minimum_size(ty)));

        let (start, end) = {
            let mut cursor = self.global.lock();
            let start = *cursor;
            let end = start.saturating_add(requested);
            *cursor = end;
            (start, end)
        };

        if end > self.arena.capacity() {
            if !self.exhausted.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    capacity = self.arena.capacity(),
                    requested,
                    "heap exhausted"
                );
            }
            return Err(AllocError::OutOfMemory {
                requested,
                offset: start,
            });
        }

        // SAFETY: [start, end) lies inside the arena and was reserved for
        // this call alone under the global lock.
        unsafe {
            let slot: NonNull<u8> = self.arena.at(start);
            std::ptr::write_bytes(slot.as_ptr(), 0, requested);
            let header = slot.cast::<ObjectHeader>();
            ObjectHeader::stamp(header.as_ptr(), ty);
            Ok(ObjRef::from_non_null(header))
        }
    }

    /// Take the global lock
    ///
    /// Held only for short critical sections: cursor bumps and monitor
    /// handle creation.
    #[inline]
    pub(crate) fn global_lock(&self) -> MutexGuard<'_, usize> {
        self.global.lock()
    }

    /// Current cursor offset (may exceed the capacity after exhaustion)
    pub fn cursor(&self) -> usize {
        *self.global.lock()
    }

    /// Usable bytes in the arena
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Whether `obj` was allocated from this heap
    pub fn contains(&self, obj: ObjRef) -> bool {
        self.arena.contains(obj.addr())
    }

    /// Usage snapshot
    pub fn stats(&self) -> HeapStats {
        let cursor = self.cursor();
        HeapStats {
            capacity: self.arena.capacity(),
            used: cursor.min(self.arena.capacity()),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

/// Smallest object of type `ty` that its native layout can be read from
fn minimum_size(ty: &TypeDescriptor) -> usize {
    match ty.kind() {
        TypeKind::Class => ty.instance_size().max(HEADER_SIZE),
        TypeKind::Array => ARRAY_DATA_OFFSET,
        TypeKind::Primitive => HEADER_SIZE,
    }
}

impl std::fmt::Debug for Heap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heap")
            .field("arena", &self.arena)
            .field("stats", &self.stats())
            .finish()
    }
}
