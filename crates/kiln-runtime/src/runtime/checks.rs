//! Fault-raising helpers for generated code
//!
//! These implement the implicit checks of the bytecode: null receivers,
//! array bounds, checked casts and integer division.

use super::Runtime;
use crate::exception::{FaultKind, Throws};
use crate::heap::{ArrayElement, ArrayObject, ObjRef, ARRAY_DATA_OFFSET};
use crate::types::{self, TypeDescriptor};

impl Runtime {
    /// Fail with null-pointer on `None`
    #[inline]
    pub fn null_check(&self, obj: Option<ObjRef>) -> Throws<ObjRef> {
        obj.ok_or_else(|| self.fault(FaultKind::NullPointer))
    }

    fn checked_array(&self, array: Option<ObjRef>) -> Throws<ObjRef> {
        let array = self.null_check(array)?;
        if !array.type_descriptor().is_array() {
            return Err(self.vm_error("array operation on non-array", &array.type_descriptor().name()));
        }
        Ok(array)
    }

    /// Length of an array
    pub fn array_length(&self, array: Option<ObjRef>) -> Throws<i32> {
        let array = self.checked_array(array)?;
        // SAFETY: checked_array verified the object is an array.
        Ok(unsafe { array.cast::<ArrayObject>() }.len())
    }

    fn element_ptr<T: ArrayElement>(&self, array: Option<ObjRef>, index: i32) -> Throws<*mut T> {
        let array = self.checked_array(array)?;
        let element_size = array.type_descriptor().element_size();
        if element_size != std::mem::size_of::<T>() {
            return Err(self.vm_error(
                "array element width mismatch",
                &format_args!("{} accessed as {}", array.type_descriptor().name(), std::any::type_name::<T>()),
            ));
        }
        // SAFETY: verified to be an array above.
        let length = unsafe { array.cast::<ArrayObject>() }.len();
        if index < 0 || index >= length {
            return Err(self.fault(FaultKind::ArrayIndexOutOfBounds));
        }
        // SAFETY: index is in bounds and elements are size_of::<T>() wide.
        Ok(unsafe { array.field_ptr::<T>(ARRAY_DATA_OFFSET + index as usize * element_size) })
    }

    /// Load `array[index]`
    pub fn array_load<T: ArrayElement>(&self, array: Option<ObjRef>, index: i32) -> Throws<T> {
        let ptr = self.element_ptr::<T>(array, index)?;
        // SAFETY: element_ptr bounds-checked the slot.
        Ok(unsafe { ptr.read_unaligned() })
    }

    /// Store `array[index] = value`
    pub fn array_store<T: ArrayElement>(&self, array: Option<ObjRef>, index: i32, value: T) -> Throws<()> {
        let ptr = self.element_ptr::<T>(array, index)?;
        // SAFETY: element_ptr bounds-checked the slot.
        unsafe { ptr.write_unaligned(value) };
        Ok(())
    }

    /// `instanceof`
    #[inline]
    pub fn instance_of(&self, obj: Option<ObjRef>, target: &TypeDescriptor) -> bool {
        types::instance_of(obj, target)
    }

    /// Checked cast: null passes, a mismatch raises class-cast
    pub fn check_cast(&self, obj: Option<ObjRef>, target: &TypeDescriptor) -> Throws<Option<ObjRef>> {
        match obj {
            Some(o) if !types::instance_of(Some(o), target) => self.throw(FaultKind::ClassCast),
            _ => Ok(obj),
        }
    }

    /// `a / b` for `int`
    #[inline]
    pub fn div_i32(&self, a: i32, b: i32) -> Throws<i32> {
        if b == 0 {
            return self.throw(FaultKind::Arithmetic);
        }
        Ok(a.wrapping_div(b))
    }

    /// `a % b` for `int`
    #[inline]
    pub fn rem_i32(&self, a: i32, b: i32) -> Throws<i32> {
        if b == 0 {
            return self.throw(FaultKind::Arithmetic);
        }
        Ok(a.wrapping_rem(b))
    }

    /// `a / b` for `long`
    #[inline]
    pub fn div_i64(&self, a: i64, b: i64) -> Throws<i64> {
        if b == 0 {
            return self.throw(FaultKind::Arithmetic);
        }
        Ok(a.wrapping_div(b))
    }

    /// `a % b` for `long`
    #[inline]
    pub fn rem_i64(&self, a: i64, b: i64) -> Throws<i64> {
        if b == 0 {
            return self.throw(FaultKind::Arithmetic);
        }
        Ok(a.wrapping_rem(b))
    }
}
