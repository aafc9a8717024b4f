//! `java.lang.String` objects
//!
//! A string is a header plus a reference to a `char[]` of UTF-16 code units.
//! The array may be longer than what a string uses only if compiled code
//! builds it that way; strings created here always own an exact-size array.

use crate::exception::{FaultKind, Throws};
use crate::heap::{ArrayObject, HeapLayout, ObjRef, ObjectHeader, ARRAY_DATA_OFFSET};
use crate::runtime::Runtime;
use std::mem::offset_of;

/// Layout of `java.lang.String`
#[repr(C)]
pub struct StringObject {
    header: ObjectHeader,
    value: Option<ObjRef>,
}

// SAFETY: repr(C), header first, all-zero is a string with no array.
unsafe impl HeapLayout for StringObject {}

impl StringObject {
    /// Backing `char[]`
    pub fn value(&self) -> Option<ObjRef> {
        self.value
    }
}

impl Runtime {
    /// New string holding `units`
    pub fn new_string(&self, units: &[u16]) -> Throws<ObjRef> {
        let length = i32::try_from(units.len()).map_err(|_| self.fault(FaultKind::OutOfMemory))?;
        let chars = self.new_array(self.builtins().char_array, length)?;
        // SAFETY: chars was allocated with room for exactly units.len() u16s.
        unsafe {
            let data = chars.field_ptr::<u16>(ARRAY_DATA_OFFSET);
            std::ptr::copy_nonoverlapping(units.as_ptr(), data, units.len());
        }

        let string = self.new_instance(self.builtins().string)?;
        // SAFETY: string has the StringObject layout.
        unsafe { string.write_field(offset_of!(StringObject, value), Some(chars)) };
        Ok(string)
    }

    /// New string from Rust text
    pub fn new_string_from_str(&self, text: &str) -> Throws<ObjRef> {
        let units: Vec<u16> = text.encode_utf16().collect();
        self.new_string(&units)
    }

    /// New string from bytes in the native encoding
    pub fn string_from_native(&self, bytes: &[u8]) -> Throws<ObjRef> {
        let units = self.codec().encode_to_vec(bytes);
        self.new_string(&units)
    }

    /// Code units of a string
    pub fn string_units(&self, string: Option<ObjRef>) -> Throws<Vec<u16>> {
        let string = self.null_check(string)?;
        if !self.instance_of(Some(string), self.builtins().string) {
            return Err(self.vm_error("not a string", &string.type_descriptor().name()));
        }
        // SAFETY: checked to be a String above.
        let Some(chars) = unsafe { string.cast::<StringObject>() }.value() else {
            return Ok(Vec::new());
        };
        // SAFETY: a String's value is always a char[].
        let length = unsafe { chars.cast::<ArrayObject>() }.len().max(0) as usize;
        let mut units = vec![0u16; length];
        unsafe {
            let data = chars.field_ptr::<u16>(ARRAY_DATA_OFFSET);
            std::ptr::copy_nonoverlapping(data, units.as_mut_ptr(), length);
        }
        Ok(units)
    }

    /// Bytes of a string in the native encoding
    pub fn string_to_native(&self, string: Option<ObjRef>) -> Throws<Vec<u8>> {
        let units = self.string_units(string)?;
        Ok(self.codec().decode_to_vec(&units))
    }

    /// Rust text of a string (lone surrogates become U+FFFD)
    pub fn string_to_rust(&self, string: Option<ObjRef>) -> Throws<String> {
        Ok(String::from_utf16_lossy(&self.string_units(string)?))
    }
}
