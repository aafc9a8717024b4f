//! Array object layout
//!
//! ```text
//! ┌──────────────────────┬────────────┬──────────────────────────┐
//! │ ObjectHeader         │ length:i32 │ elements (at DATA_OFFSET) │
//! └──────────────────────┴────────────┴──────────────────────────┘
//! ```

use super::header::ObjectHeader;
use super::ptr::{HeapLayout, ObjRef};

/// Leading part of every array object
#[repr(C)]
pub struct ArrayObject {
    header: ObjectHeader,
    length: i32,
}

// SAFETY: repr(C), starts with the header, zero length is valid.
unsafe impl HeapLayout for ArrayObject {}

/// Offset of element 0 from the object start (8-byte aligned)
pub const ARRAY_DATA_OFFSET: usize = (std::mem::size_of::<ArrayObject>() + 7) & !7;

impl ArrayObject {
    /// Number of elements
    #[inline]
    pub fn len(&self) -> i32 {
        self.length
    }

    /// Whether the array has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Record the length of a freshly allocated array
    ///
    /// # Safety
    ///
    /// `array` must be an array object not yet visible to other threads.
    pub(crate) unsafe fn init_length(array: ObjRef, length: i32) {
        let ptr = array.as_ptr() as *mut ArrayObject;
        std::ptr::addr_of_mut!((*ptr).length).write(length);
    }
}

/// Total allocation size of an array, `None` on overflow
pub fn array_size(element_size: usize, length: usize) -> Option<usize> {
    element_size
        .checked_mul(length)
        .and_then(|data| data.checked_add(ARRAY_DATA_OFFSET))
}

/// Element types that may be stored in arrays
///
/// # Safety
///
/// Implementors must be valid when zeroed.
pub unsafe trait ArrayElement: Copy {}

unsafe impl ArrayElement for bool {}
unsafe impl ArrayElement for i8 {}
unsafe impl ArrayElement for u16 {}
unsafe impl ArrayElement for i32 {}
unsafe impl ArrayElement for i64 {}
unsafe impl ArrayElement for f32 {}
unsafe impl ArrayElement for f64 {}
unsafe impl ArrayElement for Option<ObjRef> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_offset_is_aligned() {
        assert_eq!(ARRAY_DATA_OFFSET % 8, 0);
        assert!(ARRAY_DATA_OFFSET >= std::mem::size_of::<ArrayObject>());
    }

    #[test]
    fn test_array_size() {
        assert_eq!(array_size(2, 0), Some(ARRAY_DATA_OFFSET));
        assert_eq!(array_size(2, 10), Some(ARRAY_DATA_OFFSET + 20));
        assert_eq!(array_size(8, usize::MAX), None);
    }
}
