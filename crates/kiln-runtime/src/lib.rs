//! Kiln native runtime
//!
//! The substrate ahead-of-time compiled programs link against:
//! - Bump-pointer object heap with a sticky out-of-memory state
//! - Object headers with lazily created monitors (lock, wait, notify)
//! - Type descriptors, dispatch tables and `instanceof`
//! - Exceptions as values: pre-built fault singletons on a `Result` channel
//! - One native thread per `java.lang.Thread` object
//! - Text transcoding between UTF-16 and the locale's native encoding

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod codec;
pub mod config;
pub mod console;
pub mod exception;
pub mod heap;
pub mod runtime;
pub mod sync;
pub mod text;
pub mod thread;
pub mod types;

pub use codec::{Codec, CodecError, NativeEncoding};
pub use config::{RuntimeConfig, DEFAULT_HEAP_SIZE, HEAP_SIZE_ENV};
pub use console::{Console, MemorySink};
pub use exception::{Fault, FaultKind, FaultTable, Throws};
pub use heap::{AllocError, Heap, HeapStats, ObjRef};
pub use runtime::{execute, launch, BootError, MainMethod, Runtime, RuntimeBuilder};
pub use sync::MonitorError;
pub use thread::{ThreadError, ThreadState};
pub use types::{ClassSpec, RegistryError, TypeDescriptor, TypeRegistry};
