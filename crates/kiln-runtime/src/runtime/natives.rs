//! Built-in natives
//!
//! The handful of library methods compiled code links against directly:
//! `Object.getClass`, `Object.hashCode`, `Class.getName`,
//! `System.currentTimeMillis`, and the byte-level console streams.

use super::Runtime;
use crate::exception::Throws;
use crate::heap::ObjRef;
use crate::types::TypeDescriptor;

impl Runtime {
    /// `Object.getClass()`
    pub fn get_class(&self, obj: Option<ObjRef>) -> Throws<&'static TypeDescriptor> {
        Ok(self.null_check(obj)?.type_descriptor())
    }

    /// `Object.hashCode()`: identity hash derived from the address
    pub fn hash_code(&self, obj: Option<ObjRef>) -> Throws<i32> {
        let addr = self.null_check(obj)?.addr() as u64;
        Ok((addr ^ (addr >> 32)) as i32)
    }

    /// `Class.getName()`: the interned name string of `ty`
    pub fn class_name(&self, ty: &'static TypeDescriptor) -> Throws<ObjRef> {
        let key = std::ptr::from_ref(ty) as usize;
        let mut names = self.class_names().lock();
        if let Some(&name) = names.get(&key) {
            return Ok(name);
        }
        let name = self.new_string(ty.name_units())?;
        names.insert(key, name);
        Ok(name)
    }

    /// `System.currentTimeMillis()`: milliseconds since boot
    pub fn current_time_millis(&self) -> i64 {
        self.epoch().elapsed().as_millis() as i64
    }

    /// `NativeOutputStream.write(int)`: emit one code unit
    pub fn write_unit(&self, unit: i32) {
        if let Err(e) = self.console().write_unit(self.codec(), unit as u16) {
            tracing::debug!(error = %e, "console write failed");
        }
    }

    /// `NativeInputStream.read()`: one native byte, `-1` at end of input
    pub fn read_byte(&self) -> i32 {
        self.console().read_byte().unwrap_or_else(|e| {
            tracing::debug!(error = %e, "console read failed");
            -1
        })
    }

    /// Flush console output
    pub fn flush_console(&self) {
        if let Err(e) = self.console().flush(self.codec()) {
            tracing::debug!(error = %e, "console flush failed");
        }
    }
}
