//! Runtime type information
//!
//! - [`TypeDescriptor`]: immutable per-type metadata and dispatch table
//! - [`TypeRegistry`]: name index over descriptors, built once at boot
//! - [`is_instance`]: the `instanceof` relation

mod descriptor;
mod instanceof;
mod registry;

pub use descriptor::{methods, TypeDescriptor, TypeKind, VTable, VirtualMethod};
pub use instanceof::{instance_of, is_instance};
pub use registry::{
    Builtins, ClassSpec, RegistryError, TypeRegistry, TypeRegistryBuilder, OBJECT_CLASS,
    OUT_OF_MEMORY_ERROR,
};
