//! Type descriptors and dispatch tables

use crate::exception::Throws;
use crate::heap::{ObjRef, WORD};
use crate::runtime::Runtime;
use std::fmt;

/// Compiled virtual method taking only the receiver
pub type VirtualMethod = fn(&Runtime, ObjRef) -> Throws<()>;

/// Well-known method names
pub mod methods {
    /// Instance constructor
    pub const INIT: &str = "<init>";
    /// Thread body
    pub const RUN: &str = "run";
}

/// Virtual dispatch table
///
/// Built at registration time: a subclass starts from a copy of its
/// supertype's table, and each method it defines either overrides an
/// inherited slot in place or appends a new one. Slot numbers are therefore
/// stable down the hierarchy.
#[derive(Clone, Default)]
pub struct VTable {
    entries: Vec<(&'static str, VirtualMethod)>,
}

impl VTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or override `name`, returning its slot
    pub fn define(&mut self, name: &'static str, method: VirtualMethod) -> usize {
        match self.slot(name) {
            Some(slot) => {
                self.entries[slot].1 = method;
                slot
            }
            None => {
                self.entries.push((name, method));
                self.entries.len() - 1
            }
        }
    }

    /// Slot number of `name`
    pub fn slot(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| *n == name)
    }

    /// Method at `slot`
    pub fn get(&self, slot: usize) -> Option<VirtualMethod> {
        self.entries.get(slot).map(|(_, m)| *m)
    }

    /// Method named `name`
    pub fn resolve(&self, name: &str) -> Option<VirtualMethod> {
        self.slot(name).and_then(|slot| self.get(slot))
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for VTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Kind of runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Class (including interfaces compiled as classes)
    Class,
    /// Array with an element type
    Array,
    /// Primitive value type (only ever an array element)
    Primitive,
}

/// Immutable, process-wide description of one type
///
/// Descriptors are leaked at registration and compared by address. The
/// built-in ones are shared by every runtime in the process.
pub struct TypeDescriptor {
    name: Box<str>,
    name_units: Box<[u16]>,
    kind: TypeKind,
    super_type: Option<&'static TypeDescriptor>,
    element_type: Option<&'static TypeDescriptor>,
    instance_size: usize,
    element_size: usize,
    vtable: VTable,
}

impl TypeDescriptor {
    pub(crate) fn class(
        name: &str,
        super_type: Option<&'static TypeDescriptor>,
        instance_size: usize,
        vtable: VTable,
    ) -> Self {
        Self::with_parts(name, TypeKind::Class, super_type, None, instance_size, 0, vtable)
    }

    pub(crate) fn primitive(name: &str, size: usize) -> Self {
        Self::with_parts(name, TypeKind::Primitive, None, None, size, 0, VTable::new())
    }

    pub(crate) fn array(
        element: &'static TypeDescriptor,
        super_type: &'static TypeDescriptor,
    ) -> Self {
        let name = format!("{}[]", element.name());
        Self::with_parts(
            &name,
            TypeKind::Array,
            Some(super_type),
            Some(element),
            super_type.instance_size,
            element.slot_size(),
            super_type.vtable.clone(),
        )
    }

    fn with_parts(
        name: &str,
        kind: TypeKind,
        super_type: Option<&'static TypeDescriptor>,
        element_type: Option<&'static TypeDescriptor>,
        instance_size: usize,
        element_size: usize,
        vtable: VTable,
    ) -> Self {
        Self {
            name: name.into(),
            name_units: name.encode_utf16().collect(),
            kind,
            super_type,
            element_type,
            instance_size,
            element_size,
            vtable,
        }
    }

    pub(crate) fn leak(self) -> &'static TypeDescriptor {
        Box::leak(Box::new(self))
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name as internal code units
    pub fn name_units(&self) -> &[u16] {
        &self.name_units
    }

    /// Type kind
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// Whether this is an array type
    pub fn is_array(&self) -> bool {
        self.kind == TypeKind::Array
    }

    /// Direct supertype (`None` for the root and primitives)
    pub fn super_type(&self) -> Option<&'static TypeDescriptor> {
        self.super_type
    }

    /// Element type (arrays only)
    pub fn element_type(&self) -> Option<&'static TypeDescriptor> {
        self.element_type
    }

    /// Bytes per instance (classes) or per value (primitives)
    pub fn instance_size(&self) -> usize {
        self.instance_size
    }

    /// Bytes per element (arrays only, 0 otherwise)
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Bytes this type occupies when stored in a field or array slot
    pub fn slot_size(&self) -> usize {
        match self.kind {
            TypeKind::Primitive => self.instance_size,
            TypeKind::Class | TypeKind::Array => WORD,
        }
    }

    /// Dispatch table
    pub fn vtable(&self) -> &VTable {
        &self.vtable
    }

    /// Iterate from this type up to the root
    pub fn ancestors(&'static self) -> impl Iterator<Item = &'static TypeDescriptor> {
        std::iter::successors(Some(self), |ty| ty.super_type)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("super", &self.super_type.map(|t| t.name()))
            .field("element", &self.element_type.map(|t| t.name()))
            .field("instance_size", &self.instance_size)
            .field("element_size", &self.element_size)
            .field("vtable", &self.vtable)
            .finish()
    }
}
