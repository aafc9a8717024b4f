//! Type registry
//!
//! Maps display names to leaked [`TypeDescriptor`]s. A registry is assembled
//! once through [`TypeRegistryBuilder`] and then frozen inside the runtime;
//! every builder starts out holding the built-in hierarchy the runtime
//! itself depends on:
//!
//! ```text
//! java.lang.Object
//! ├── java.lang.Throwable
//! │   ├── java.lang.Exception
//! │   │   ├── java.lang.RuntimeException
//! │   │   │   ├── NullPointerException
//! │   │   │   ├── IndexOutOfBoundsException
//! │   │   │   │   └── ArrayIndexOutOfBoundsException
//! │   │   │   ├── ClassCastException
//! │   │   │   └── ArithmeticException
//! │   │   └── InterruptedException
//! │   └── java.lang.Error
//! │       └── VirtualMachineError
//! │           └── OutOfMemoryError
//! ├── java.lang.String
//! ├── java.lang.Thread
//! └── <element>[]   (one per array type)
//! ```

use super::descriptor::{methods, TypeDescriptor, TypeKind, VTable, VirtualMethod};
use crate::exception::{throwable_init, ThrowableObject};
use crate::heap::{HeapLayout, HEADER_SIZE};
use crate::text::StringObject;
use crate::thread::{thread_init, thread_run, ThreadObject};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Root of the class hierarchy
pub const OBJECT_CLASS: &str = "java.lang.Object";

/// Error raised when the arena is exhausted
pub const OUT_OF_MEMORY_ERROR: &str = "java.lang.OutOfMemoryError";

/// Errors that can occur when registering types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A type with this name already exists
    #[error("Type {0} is already registered")]
    Duplicate(String),

    /// The named supertype has not been registered
    #[error("Unknown supertype {supertype} for {name}")]
    UnknownSupertype {
        /// Type being registered
        name: String,
        /// Missing supertype
        supertype: String,
    },

    /// The named array element type has not been registered
    #[error("Unknown array element type {0}")]
    UnknownElementType(String),

    /// A class tried to extend an array or primitive type
    #[error("{0} is not a class")]
    NotAClass(String),

    /// A type the runtime requires is missing
    #[error("Built-in type {0} is missing")]
    MissingBuiltin(&'static str),
}

/// Declaration of a class to register
#[derive(Debug, Clone)]
pub struct ClassSpec {
    name: String,
    super_name: String,
    instance_size: usize,
    methods: Vec<(&'static str, VirtualMethod)>,
}

impl ClassSpec {
    /// Class extending `java.lang.Object` with `instance_size` bytes
    pub fn new(name: impl Into<String>, instance_size: usize) -> Self {
        Self {
            name: name.into(),
            super_name: OBJECT_CLASS.to_string(),
            instance_size,
            methods: Vec::new(),
        }
    }

    /// Set the supertype
    pub fn extends(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = super_name.into();
        self
    }

    /// Define or override a virtual method
    pub fn method(mut self, name: &'static str, method: VirtualMethod) -> Self {
        self.methods.push((name, method));
        self
    }
}

/// Descriptors the runtime looks up directly
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub struct Builtins {
    pub object: &'static TypeDescriptor,
    pub throwable: &'static TypeDescriptor,
    pub exception: &'static TypeDescriptor,
    pub runtime_exception: &'static TypeDescriptor,
    pub error: &'static TypeDescriptor,
    pub null_pointer: &'static TypeDescriptor,
    pub index_out_of_bounds: &'static TypeDescriptor,
    pub array_index_out_of_bounds: &'static TypeDescriptor,
    pub class_cast: &'static TypeDescriptor,
    pub arithmetic: &'static TypeDescriptor,
    pub interrupted: &'static TypeDescriptor,
    pub virtual_machine_error: &'static TypeDescriptor,
    pub out_of_memory: &'static TypeDescriptor,
    pub string: &'static TypeDescriptor,
    pub thread: &'static TypeDescriptor,
    pub boolean: &'static TypeDescriptor,
    pub byte: &'static TypeDescriptor,
    pub char: &'static TypeDescriptor,
    pub int: &'static TypeDescriptor,
    pub long: &'static TypeDescriptor,
    pub float: &'static TypeDescriptor,
    pub double: &'static TypeDescriptor,
    pub boolean_array: &'static TypeDescriptor,
    pub byte_array: &'static TypeDescriptor,
    pub char_array: &'static TypeDescriptor,
    pub int_array: &'static TypeDescriptor,
    pub long_array: &'static TypeDescriptor,
    pub float_array: &'static TypeDescriptor,
    pub double_array: &'static TypeDescriptor,
    pub object_array: &'static TypeDescriptor,
    pub string_array: &'static TypeDescriptor,
}

/// Frozen set of runtime types
#[derive(Debug)]
pub struct TypeRegistry {
    by_name: FxHashMap<Box<str>, &'static TypeDescriptor>,
    builtins: Builtins,
}

impl TypeRegistry {
    /// Builder preloaded with the built-in types
    pub fn builder() -> Result<TypeRegistryBuilder, RegistryError> {
        TypeRegistryBuilder::with_builtins()
    }

    /// Registry holding only the built-in types
    pub fn standard() -> Result<Self, RegistryError> {
        Self::builder()?.build()
    }

    /// Look up a type by display name
    pub fn get(&self, name: &str) -> Option<&'static TypeDescriptor> {
        self.by_name.get(name).copied()
    }

    /// Array type with the given element, if registered
    pub fn array_of(&self, element: &TypeDescriptor) -> Option<&'static TypeDescriptor> {
        self.get(&format!("{}[]", element.name()))
    }

    /// Built-in descriptors
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether the registry is empty (never true for a built registry)
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterate over all registered types
    pub fn iter(&self) -> impl Iterator<Item = &'static TypeDescriptor> + '_ {
        self.by_name.values().copied()
    }
}

/// Built-in hierarchy, leaked once and shared by every builder
static BUILTIN_TYPES: Lazy<Result<FxHashMap<Box<str>, &'static TypeDescriptor>, RegistryError>> =
    Lazy::new(|| TypeRegistryBuilder::builtin_hierarchy().map(|builder| builder.by_name));

/// Builder for a [`TypeRegistry`]
pub struct TypeRegistryBuilder {
    by_name: FxHashMap<Box<str>, &'static TypeDescriptor>,
}

impl TypeRegistryBuilder {
    fn with_builtins() -> Result<Self, RegistryError> {
        match &*BUILTIN_TYPES {
            Ok(by_name) => Ok(Self {
                by_name: by_name.clone(),
            }),
            Err(e) => Err(e.clone()),
        }
    }

    fn builtin_hierarchy() -> Result<Self, RegistryError> {
        let mut builder = Self {
            by_name: FxHashMap::default(),
        };

        let object = TypeDescriptor::class(OBJECT_CLASS, None, HEADER_SIZE, VTable::new()).leak();
        builder.insert(object)?;

        let throwable_size = ThrowableObject::SIZE;
        builder.define_class(
            ClassSpec::new("java.lang.Throwable", throwable_size).method(methods::INIT, throwable_init),
        )?;
        for (name, parent) in [
            ("java.lang.Exception", "java.lang.Throwable"),
            ("java.lang.Error", "java.lang.Throwable"),
            ("java.lang.RuntimeException", "java.lang.Exception"),
            ("java.lang.InterruptedException", "java.lang.Exception"),
            ("java.lang.NullPointerException", "java.lang.RuntimeException"),
            ("java.lang.IndexOutOfBoundsException", "java.lang.RuntimeException"),
            (
                "java.lang.ArrayIndexOutOfBoundsException",
                "java.lang.IndexOutOfBoundsException",
            ),
            ("java.lang.ClassCastException", "java.lang.RuntimeException"),
            ("java.lang.ArithmeticException", "java.lang.RuntimeException"),
            ("java.lang.VirtualMachineError", "java.lang.Error"),
            (OUT_OF_MEMORY_ERROR, "java.lang.VirtualMachineError"),
        ] {
            builder.define_class(ClassSpec::new(name, throwable_size).extends(parent))?;
        }

        builder.define_class(ClassSpec::new("java.lang.String", StringObject::SIZE))?;
        builder.define_class(
            ClassSpec::new("java.lang.Thread", ThreadObject::SIZE)
                .method(methods::INIT, thread_init)
                .method(methods::RUN, thread_run),
        )?;

        for (name, size) in [
            ("boolean", 1),
            ("byte", 1),
            ("char", 2),
            ("int", 4),
            ("long", 8),
            ("float", 4),
            ("double", 8),
        ] {
            builder.define_primitive(name, size)?;
        }
        for element in [
            "boolean",
            "byte",
            "char",
            "int",
            "long",
            "float",
            "double",
            OBJECT_CLASS,
            "java.lang.String",
        ] {
            builder.define_array(element)?;
        }

        Ok(builder)
    }

    fn collect_builtins(&self) -> Result<Builtins, RegistryError> {
        let get = |name: &'static str| self.get(name).ok_or(RegistryError::MissingBuiltin(name));
        Ok(Builtins {
            object: get(OBJECT_CLASS)?,
            throwable: get("java.lang.Throwable")?,
            exception: get("java.lang.Exception")?,
            runtime_exception: get("java.lang.RuntimeException")?,
            error: get("java.lang.Error")?,
            null_pointer: get("java.lang.NullPointerException")?,
            index_out_of_bounds: get("java.lang.IndexOutOfBoundsException")?,
            array_index_out_of_bounds: get("java.lang.ArrayIndexOutOfBoundsException")?,
            class_cast: get("java.lang.ClassCastException")?,
            arithmetic: get("java.lang.ArithmeticException")?,
            interrupted: get("java.lang.InterruptedException")?,
            virtual_machine_error: get("java.lang.VirtualMachineError")?,
            out_of_memory: get(OUT_OF_MEMORY_ERROR)?,
            string: get("java.lang.String")?,
            thread: get("java.lang.Thread")?,
            boolean: get("boolean")?,
            byte: get("byte")?,
            char: get("char")?,
            int: get("int")?,
            long: get("long")?,
            float: get("float")?,
            double: get("double")?,
            boolean_array: get("boolean[]")?,
            byte_array: get("byte[]")?,
            char_array: get("char[]")?,
            int_array: get("int[]")?,
            long_array: get("long[]")?,
            float_array: get("float[]")?,
            double_array: get("double[]")?,
            object_array: get("java.lang.Object[]")?,
            string_array: get("java.lang.String[]")?,
        })
    }

    fn insert(&mut self, ty: &'static TypeDescriptor) -> Result<&'static TypeDescriptor, RegistryError> {
        if self.by_name.contains_key(ty.name()) {
            return Err(RegistryError::Duplicate(ty.name().to_string()));
        }
        self.by_name.insert(ty.name().into(), ty);
        Ok(ty)
    }

    /// Look up an already registered type
    pub fn get(&self, name: &str) -> Option<&'static TypeDescriptor> {
        self.by_name.get(name).copied()
    }

    /// Register a class
    ///
    /// The dispatch table is resolved here: inherited slots are copied from
    /// the supertype and overridden by name. The instance size never shrinks
    /// below the supertype's.
    pub fn define_class(&mut self, spec: ClassSpec) -> Result<&'static TypeDescriptor, RegistryError> {
        if self.by_name.contains_key(spec.name.as_str()) {
            return Err(RegistryError::Duplicate(spec.name));
        }
        let super_type = self
            .get(&spec.super_name)
            .ok_or_else(|| RegistryError::UnknownSupertype {
                name: spec.name.clone(),
                supertype: spec.super_name.clone(),
            })?;
        if super_type.kind() != TypeKind::Class {
            return Err(RegistryError::NotAClass(spec.super_name));
        }

        let mut vtable = super_type.vtable().clone();
        for (name, method) in spec.methods {
            vtable.define(name, method);
        }
        let size = spec.instance_size.max(super_type.instance_size());

        let ty = TypeDescriptor::class(&spec.name, Some(super_type), size, vtable).leak();
        self.insert(ty)
    }

    /// Register a primitive value type of `size` bytes
    pub fn define_primitive(&mut self, name: &str, size: usize) -> Result<&'static TypeDescriptor, RegistryError> {
        self.insert(TypeDescriptor::primitive(name, size).leak())
    }

    /// Register (or fetch) the array type whose elements are `element_name`
    pub fn define_array(&mut self, element_name: &str) -> Result<&'static TypeDescriptor, RegistryError> {
        let element = self
            .get(element_name)
            .ok_or_else(|| RegistryError::UnknownElementType(element_name.to_string()))?;
        if let Some(existing) = self.get(&format!("{}[]", element.name())) {
            return Ok(existing);
        }
        let object = self
            .get(OBJECT_CLASS)
            .ok_or(RegistryError::MissingBuiltin(OBJECT_CLASS))?;
        self.insert(TypeDescriptor::array(element, object).leak())
    }

    /// Freeze the registry
    pub fn build(self) -> Result<TypeRegistry, RegistryError> {
        let builtins = self.collect_builtins()?;
        Ok(TypeRegistry {
            by_name: self.by_name,
            builtins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::Throws;
    use crate::heap::ObjRef;
    use crate::runtime::Runtime;
    use crate::types::is_instance;

    fn run_a(_: &Runtime, _: ObjRef) -> Throws<()> {
        Ok(())
    }

    fn run_b(_: &Runtime, _: ObjRef) -> Throws<()> {
        Ok(())
    }

    #[test]
    fn test_builtins_are_shared_across_registries() {
        let first = TypeRegistry::standard().unwrap();
        let mut builder = TypeRegistry::builder().unwrap();
        builder.define_class(ClassSpec::new("app.Only", 0)).unwrap();
        let second = builder.build().unwrap();

        assert!(std::ptr::eq(first.builtins().thread, second.builtins().thread));
        assert!(std::ptr::eq(first.builtins().string_array, second.builtins().string_array));
        assert!(first.get("app.Only").is_none());
        assert_eq!(second.len(), first.len() + 1);
    }

    #[test]
    fn test_standard_registry() {
        let registry = TypeRegistry::standard().unwrap();
        let b = registry.builtins();

        assert_eq!(b.object.name(), "java.lang.Object");
        assert!(b.object.super_type().is_none());
        assert_eq!(b.out_of_memory.name(), "java.lang.OutOfMemoryError");
        assert!(std::ptr::eq(registry.get("java.lang.Thread").unwrap(), b.thread));
        assert!(std::ptr::eq(registry.array_of(b.char).unwrap(), b.char_array));
        assert_eq!(b.char_array.element_size(), 2);
        assert_eq!(b.string_array.element_size(), crate::heap::WORD);
    }

    #[test]
    fn test_define_class_inherits_vtable() {
        let mut builder = TypeRegistry::builder().unwrap();
        let worker = builder
            .define_class(
                ClassSpec::new("app.Worker", 0)
                    .extends("java.lang.Thread")
                    .method(methods::RUN, run_a),
            )
            .unwrap();
        let registry = builder.build().unwrap();
        let thread = registry.builtins().thread;

        assert_eq!(worker.instance_size(), thread.instance_size());
        assert_eq!(worker.vtable().slot(methods::RUN), thread.vtable().slot(methods::RUN));
        assert!(std::ptr::fn_addr_eq(
            worker.vtable().resolve(methods::RUN).unwrap(),
            run_a as VirtualMethod
        ));
        assert!(worker.vtable().resolve(methods::INIT).is_some());
        assert!(is_instance(Some(worker), thread));
    }

    #[test]
    fn test_define_class_errors() {
        let mut builder = TypeRegistry::builder().unwrap();
        builder.define_class(ClassSpec::new("app.A", 0).method("f", run_b)).unwrap();

        assert_eq!(
            builder.define_class(ClassSpec::new("app.A", 0)).unwrap_err(),
            RegistryError::Duplicate("app.A".into())
        );
        assert!(matches!(
            builder.define_class(ClassSpec::new("app.B", 0).extends("app.Missing")),
            Err(RegistryError::UnknownSupertype { .. })
        ));
        assert_eq!(
            builder
                .define_class(ClassSpec::new("app.C", 0).extends("int[]"))
                .unwrap_err(),
            RegistryError::NotAClass("int[]".into())
        );
    }

    #[test]
    fn test_define_array_is_idempotent() {
        let mut builder = TypeRegistry::builder().unwrap();
        builder.define_class(ClassSpec::new("app.Node", 32)).unwrap();
        let first = builder.define_array("app.Node").unwrap();
        let second = builder.define_array("app.Node").unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.name(), "app.Node[]");

        let nested = builder.define_array("app.Node[]").unwrap();
        assert_eq!(nested.name(), "app.Node[][]");

        assert_eq!(
            builder.define_array("app.Nope").unwrap_err(),
            RegistryError::UnknownElementType("app.Nope".into())
        );
    }
}
