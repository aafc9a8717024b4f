//! Exceptions and the fault channel
//!
//! Compiled code does not unwind. Every operation that can throw returns
//! [`Throws<T>`], and callers forward faults with `?`:
//!
//! ```text
//! fn caller(rt: &Runtime, obj: ObjRef) -> Throws<i32> {
//!     let len = rt.array_length(Some(obj))?;   // fault propagates
//!     Ok(len * 2)
//! }
//! ```
//!
//! The faults the runtime raises on its own are pre-built singletons held in
//! a [`FaultTable`], allocated in the static area before the arena is
//! touched. Raising one is a table lookup, so an out-of-memory fault can be
//! raised when nothing more can be allocated.

use crate::codec::Codec;
use crate::heap::{align_to_word, AllocError, Heap, HeapLayout, ObjRef, ObjectHeader};
use crate::runtime::Runtime;
use crate::types::{Builtins, TypeDescriptor};
use std::fmt;
use std::io::{self, Write};
use std::mem::offset_of;

/// Prefix of the uncaught-exception diagnostic
pub const UNCAUGHT_PREFIX: &str = "Uncaught exception: ";

/// Layout of `java.lang.Throwable` and its subclasses
#[repr(C)]
pub struct ThrowableObject {
    header: ObjectHeader,
    message: Option<ObjRef>,
    cause: Option<ObjRef>,
}

// SAFETY: repr(C), header first, all-zero is (None, None).
unsafe impl HeapLayout for ThrowableObject {}

impl ThrowableObject {
    /// Detail message (a `String`), if any
    pub fn message(&self) -> Option<ObjRef> {
        self.message
    }

    /// Cause; a freshly constructed throwable is its own cause
    pub fn cause(&self) -> Option<ObjRef> {
        self.cause
    }
}

/// `Throwable.<init>()`
pub fn throwable_init(_rt: &Runtime, this: ObjRef) -> Throws<()> {
    // SAFETY: registered only on Throwable, whose layout is ThrowableObject.
    unsafe { this.write_field(offset_of!(ThrowableObject, cause), Some(this)) };
    Ok(())
}

/// A thrown exception object
///
/// Cheap to copy: it is only a reference.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fault(ObjRef);

impl Fault {
    /// Wrap an exception object
    pub fn new(exception: ObjRef) -> Self {
        Fault(exception)
    }

    /// The exception object
    pub fn object(self) -> ObjRef {
        self.0
    }

    /// Runtime type of the exception
    pub fn type_descriptor(self) -> &'static TypeDescriptor {
        self.0.type_descriptor()
    }

    /// Display name of the exception type
    pub fn type_name(&self) -> &'static str {
        self.type_descriptor().name()
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fault({})", self.type_name())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl std::error::Error for Fault {}

/// Result of an operation that may throw
pub type Throws<T> = Result<T, Fault>;

/// Faults the runtime raises itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Dereference of null
    NullPointer,
    /// Array index outside `0..length`
    ArrayIndexOutOfBounds,
    /// Failed checked cast
    ClassCast,
    /// Integer division by zero
    Arithmetic,
    /// Interrupted wait, sleep or join
    Interrupted,
    /// Arena exhausted
    OutOfMemory,
    /// Misuse of a runtime facility
    VirtualMachine,
}

impl FaultKind {
    /// Every kind, in table order
    pub const ALL: [FaultKind; 7] = [
        FaultKind::NullPointer,
        FaultKind::ArrayIndexOutOfBounds,
        FaultKind::ClassCast,
        FaultKind::Arithmetic,
        FaultKind::Interrupted,
        FaultKind::OutOfMemory,
        FaultKind::VirtualMachine,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Exception type backing this kind
    pub fn descriptor(self, builtins: &Builtins) -> &'static TypeDescriptor {
        match self {
            FaultKind::NullPointer => builtins.null_pointer,
            FaultKind::ArrayIndexOutOfBounds => builtins.array_index_out_of_bounds,
            FaultKind::ClassCast => builtins.class_cast,
            FaultKind::Arithmetic => builtins.arithmetic,
            FaultKind::Interrupted => builtins.interrupted,
            FaultKind::OutOfMemory => builtins.out_of_memory,
            FaultKind::VirtualMachine => builtins.virtual_machine_error,
        }
    }
}

/// One pre-built exception object per [`FaultKind`]
#[derive(Debug, Clone)]
pub struct FaultTable {
    singletons: Box<[ObjRef]>,
}

impl FaultTable {
    /// Bytes the singletons need in the static area
    pub fn static_size(builtins: &Builtins) -> usize {
        FaultKind::ALL
            .iter()
            .map(|kind| align_to_word(kind.descriptor(builtins).instance_size()))
            .sum()
    }

    /// Allocate the singletons (constructors are not run here)
    pub fn allocate(statics: &Heap, builtins: &Builtins) -> Result<Self, AllocError> {
        let singletons = FaultKind::ALL
            .iter()
            .map(|kind| {
                let ty = kind.descriptor(builtins);
                statics.allocate(ty, ty.instance_size() as isize)
            })
            .collect::<Result<Box<[_]>, _>>()?;
        Ok(Self { singletons })
    }

    /// The singleton for `kind`
    #[inline]
    pub fn get(&self, kind: FaultKind) -> Fault {
        Fault(self.singletons[kind.index()])
    }

    /// Which kind a fault is, if it is one of the singletons
    pub fn kind_of(&self, fault: Fault) -> Option<FaultKind> {
        FaultKind::ALL
            .into_iter()
            .find(|kind| self.singletons[kind.index()] == fault.object())
    }

    /// All singleton objects
    pub fn objects(&self) -> impl Iterator<Item = ObjRef> + '_ {
        self.singletons.iter().copied()
    }
}

/// Write the uncaught-exception diagnostic for `fault`
///
/// The type name is transcoded to the native encoding.
pub fn write_uncaught<W: Write>(fault: Fault, codec: &Codec, out: &mut W) -> io::Result<()> {
    let name = codec.decode_to_vec(fault.type_descriptor().name_units());
    out.write_all(UNCAUGHT_PREFIX.as_bytes())?;
    out.write_all(&name)?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NativeEncoding;
    use crate::types::{is_instance, TypeRegistry};

    #[test]
    fn test_fault_table_singletons() {
        let registry = TypeRegistry::standard().unwrap();
        let builtins = registry.builtins();
        let statics = Heap::new(FaultTable::static_size(builtins)).unwrap();
        let table = FaultTable::allocate(&statics, builtins).unwrap();

        for kind in FaultKind::ALL {
            let fault = table.get(kind);
            assert!(std::ptr::eq(fault.type_descriptor(), kind.descriptor(builtins)));
            assert!(is_instance(Some(fault.type_descriptor()), builtins.throwable));
            assert_eq!(table.kind_of(fault), Some(kind));
            assert_eq!(table.get(kind), fault);
        }
        // The static area is sized exactly.
        assert_eq!(statics.stats().used, statics.capacity());
    }

    #[test]
    fn test_write_uncaught() {
        let registry = TypeRegistry::standard().unwrap();
        let builtins = registry.builtins();
        let statics = Heap::new(FaultTable::static_size(builtins)).unwrap();
        let table = FaultTable::allocate(&statics, builtins).unwrap();

        let mut out = Vec::new();
        let codec = Codec::new(NativeEncoding::Utf8);
        write_uncaught(table.get(FaultKind::OutOfMemory), &codec, &mut out).unwrap();
        assert_eq!(out, b"Uncaught exception: java.lang.OutOfMemoryError\n");
    }

    #[test]
    fn test_fault_display() {
        let registry = TypeRegistry::standard().unwrap();
        let builtins = registry.builtins();
        let statics = Heap::new(FaultTable::static_size(builtins)).unwrap();
        let table = FaultTable::allocate(&statics, builtins).unwrap();
        let fault = table.get(FaultKind::NullPointer);

        assert_eq!(fault.to_string(), "java.lang.NullPointerException");
        assert_eq!(format!("{:?}", fault), "Fault(java.lang.NullPointerException)");
    }
}
