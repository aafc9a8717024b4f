//! Run-time type queries
//!
//! Pure functions over immutable descriptors, so they never lock.

use super::TypeDescriptor;
use crate::heap::ObjRef;

/// Whether a value of type `value` may be used where `target` is expected
///
/// Rules, checked in order:
///
/// 1. no type (null) is never an instance
/// 2. a type is an instance of itself
/// 3. arrays are covariant in their element type
/// 4. otherwise walk the supertype chain, failing at the root
pub fn is_instance(value: Option<&TypeDescriptor>, target: &TypeDescriptor) -> bool {
    let mut current = value;
    while let Some(ty) = current {
        if std::ptr::eq(ty, target) {
            return true;
        }
        if ty.is_array() && target.is_array() {
            // Both arrays: compare elements instead
            return is_instance(ty.element_type(), target.element_type().unwrap_or(target));
        }
        current = ty.super_type();
    }
    false
}

/// `instanceof` on a possibly-null reference
#[inline]
pub fn instance_of(obj: Option<ObjRef>, target: &TypeDescriptor) -> bool {
    is_instance(obj.map(ObjRef::type_descriptor), target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRegistry;

    #[test]
    fn test_null_is_never_instance() {
        let registry = TypeRegistry::standard().unwrap();
        assert!(!is_instance(None, registry.builtins().object));
    }

    #[test]
    fn test_builtin_hierarchy() {
        let registry = TypeRegistry::standard().unwrap();
        let b = registry.builtins();

        assert!(is_instance(Some(b.null_pointer), b.runtime_exception));
        assert!(is_instance(Some(b.null_pointer), b.throwable));
        assert!(is_instance(Some(b.array_index_out_of_bounds), b.index_out_of_bounds));
        assert!(is_instance(Some(b.out_of_memory), b.virtual_machine_error));
        assert!(is_instance(Some(b.out_of_memory), b.error));
        assert!(!is_instance(Some(b.out_of_memory), b.exception));
        assert!(!is_instance(Some(b.throwable), b.null_pointer));
        assert!(!is_instance(Some(b.interrupted), b.runtime_exception));
    }

    #[test]
    fn test_array_covariance() {
        let registry = TypeRegistry::standard().unwrap();
        let b = registry.builtins();

        assert!(is_instance(Some(b.string_array), b.object_array));
        assert!(!is_instance(Some(b.object_array), b.string_array));
        assert!(is_instance(Some(b.int_array), b.object));
        assert!(!is_instance(Some(b.int_array), b.object_array));
        assert!(!is_instance(Some(b.int_array), b.long_array));
        assert!(!is_instance(Some(b.object), b.object_array));
    }
}
