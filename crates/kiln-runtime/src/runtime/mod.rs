//! Runtime state
//!
//! A [`Runtime`] owns everything compiled code needs at run time. It is a
//! cheap-to-clone handle; every native thread started from compiled code
//! keeps a clone, so the heap outlives every thread that can touch it.
//!
//! ```text
//! ┌──────────────────────── Runtime ─────────────────────────┐
//! │ TypeRegistry   descriptors + built-ins                   │
//! │ statics        exception singletons, main thread object  │
//! │ heap           bump arena; its mutex is the global lock  │
//! │ FaultTable     one pre-built object per fault kind       │
//! │ Codec/Console  native text boundary                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Boot order matters: the static area is filled before the arena is
//! reserved, so the out-of-memory singleton exists even when the arena
//! cannot be created.

mod checks;
mod entry;
mod monitors;
mod natives;
mod threads;

pub use entry::{execute, launch, MainMethod};

use crate::codec::Codec;
use crate::config::RuntimeConfig;
use crate::console::Console;
use crate::exception::{Fault, FaultKind, FaultTable, Throws};
use crate::heap::{align_to_word, array_size, AllocError, ArrayObject, Heap, ObjRef};
use crate::thread::{self, ThreadError, ThreadObject};
use crate::types::{methods, Builtins, RegistryError, TypeDescriptor, TypeKind, TypeRegistry};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Errors that can occur while booting a runtime
#[derive(Debug, thiserror::Error)]
pub enum BootError {
    /// The type registry could not be built
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The static area for singletons could not be set up
    #[error("Failed to set up static area: {0}")]
    StaticArea(#[source] AllocError),

    /// The arena could not be reserved
    #[error("Failed to reserve a {size}-byte heap")]
    Heap {
        /// Requested arena size
        size: usize,
        /// Underlying failure
        #[source]
        source: AllocError,
    },

    /// A built-in constructor threw
    #[error("Exception during initialization: {0}")]
    Init(String),

    /// The booting thread could not be bound to the main thread object
    #[error("Failed to bind main thread: {0}")]
    MainThread(#[source] ThreadError),
}

/// Builder for a [`Runtime`]
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    types: Option<TypeRegistry>,
    codec: Option<Codec>,
    console: Option<Console>,
}

impl RuntimeBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            types: None,
            codec: None,
            console: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a registry holding the program's own types
    pub fn types(mut self, types: TypeRegistry) -> Self {
        self.types = Some(types);
        self
    }

    /// Fix the native encoding instead of detecting it
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Route console I/O somewhere other than stdio
    pub fn console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    /// Boot the runtime and bind the calling thread to its main thread
    pub fn boot(self) -> Result<Runtime, BootError> {
        let types = match self.types {
            Some(types) => types,
            None => TypeRegistry::standard()?,
        };
        let builtins = *types.builtins();

        let statics_size =
            FaultTable::static_size(&builtins) + align_to_word(builtins.thread.instance_size());
        let statics = Heap::new(statics_size).map_err(BootError::StaticArea)?;
        let faults = FaultTable::allocate(&statics, &builtins).map_err(BootError::StaticArea)?;
        let main_thread = statics
            .allocate(builtins.thread, builtins.thread.instance_size() as isize)
            .map_err(BootError::StaticArea)?;

        let heap = Heap::new(self.config.heap_size).map_err(|source| BootError::Heap {
            size: self.config.heap_size,
            source,
        })?;

        let runtime = Runtime {
            inner: Arc::new(RuntimeInner {
                id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
                config: self.config,
                types,
                statics,
                heap,
                faults,
                main_thread,
                codec: self.codec.unwrap_or_else(Codec::detect),
                console: self.console.unwrap_or_else(Console::stdio),
                epoch: Instant::now(),
                next_thread_id: AtomicU64::new(1),
                class_names: Mutex::new(FxHashMap::default()),
            }),
        };

        let singletons: Vec<ObjRef> = runtime.inner.faults.objects().collect();
        for obj in singletons.into_iter().chain(std::iter::once(main_thread)) {
            runtime
                .invoke_virtual(obj, methods::INIT)
                .map_err(|fault| BootError::Init(fault.to_string()))?;
        }
        thread::bind_main(&runtime, main_thread).map_err(BootError::MainThread)?;

        tracing::debug!(
            runtime = runtime.id(),
            heap_size = runtime.heap().capacity(),
            types = runtime.types().len(),
            encoding = ?runtime.codec().native(),
            "runtime booted"
        );
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct RuntimeInner {
    id: u64,
    config: RuntimeConfig,
    types: TypeRegistry,
    statics: Heap,
    heap: Heap,
    faults: FaultTable,
    main_thread: ObjRef,
    codec: Codec,
    console: Console,
    epoch: Instant,
    next_thread_id: AtomicU64,
    /// Interned `Class.getName` strings, keyed by descriptor address
    class_names: Mutex<FxHashMap<usize, ObjRef>>,
}

/// Handle to a booted runtime
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl Runtime {
    /// Builder with default configuration
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Boot with `config`, the standard types, and stdio
    pub fn boot(config: RuntimeConfig) -> Result<Self, BootError> {
        RuntimeBuilder::new().config(config).boot()
    }

    /// Process-unique id of this runtime
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Configuration the runtime booted with
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Type registry
    pub fn types(&self) -> &TypeRegistry {
        &self.inner.types
    }

    /// Built-in descriptors
    pub fn builtins(&self) -> &Builtins {
        self.inner.types.builtins()
    }

    /// The arena (whose lock is the global lock)
    pub fn heap(&self) -> &Heap {
        &self.inner.heap
    }

    /// The static area
    pub fn statics(&self) -> &Heap {
        &self.inner.statics
    }

    /// Pre-built fault objects
    pub fn faults(&self) -> &FaultTable {
        &self.inner.faults
    }

    /// Native text codec
    pub fn codec(&self) -> &Codec {
        &self.inner.codec
    }

    /// Native console
    pub fn console(&self) -> &Console {
        &self.inner.console
    }

    /// Thread object of the booting thread
    pub fn main_thread(&self) -> ObjRef {
        self.inner.main_thread
    }

    pub(crate) fn class_names(&self) -> &Mutex<FxHashMap<usize, ObjRef>> {
        &self.inner.class_names
    }

    pub(crate) fn epoch(&self) -> Instant {
        self.inner.epoch
    }

    pub(crate) fn next_thread_id(&self) -> u64 {
        self.inner.next_thread_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The singleton fault of `kind`
    #[inline]
    pub fn fault(&self, kind: FaultKind) -> Fault {
        self.inner.faults.get(kind)
    }

    /// Raise the singleton fault of `kind`
    #[inline]
    pub fn throw<T>(&self, kind: FaultKind) -> Throws<T> {
        Err(self.fault(kind))
    }

    /// Log a runtime misuse and turn it into the virtual-machine-error fault
    pub fn vm_error(&self, context: &str, err: &dyn fmt::Display) -> Fault {
        tracing::error!(error = %err, "{}", context);
        self.fault(FaultKind::VirtualMachine)
    }

    /// Allocate `size` bytes typed `ty`; any allocation failure is out-of-memory
    pub fn allocate(&self, ty: &'static TypeDescriptor, size: isize) -> Throws<ObjRef> {
        self.inner
            .heap
            .allocate(ty, size)
            .map_err(|_| self.fault(FaultKind::OutOfMemory))
    }

    /// Allocate an instance of class `ty` without running a constructor
    pub fn new_instance(&self, ty: &'static TypeDescriptor) -> Throws<ObjRef> {
        if ty.kind() != TypeKind::Class {
            return Err(self.vm_error("cannot instantiate", &ty.name()));
        }
        self.allocate(ty, ty.instance_size() as isize)
    }

    /// Allocate an instance of `ty` and run its `<init>`
    pub fn construct(&self, ty: &'static TypeDescriptor) -> Throws<ObjRef> {
        let obj = self.new_instance(ty)?;
        if ty.vtable().slot(methods::INIT).is_some() {
            self.invoke_virtual(obj, methods::INIT)?;
        }
        Ok(obj)
    }

    /// Dispatch the virtual method `name` on `obj`
    pub fn invoke_virtual(&self, obj: ObjRef, name: &str) -> Throws<()> {
        match obj.type_descriptor().vtable().resolve(name) {
            Some(method) => method(self, obj),
            None => Err(self.vm_error(
                "no such virtual method",
                &format_args!("{}.{}", obj.type_descriptor().name(), name),
            )),
        }
    }

    /// Allocate an array of type `array_ty` with `length` elements
    ///
    /// A negative length is reported as out-of-memory, like any other size
    /// the arena cannot satisfy.
    pub fn new_array(&self, array_ty: &'static TypeDescriptor, length: i32) -> Throws<ObjRef> {
        if !array_ty.is_array() {
            return Err(self.vm_error("not an array type", &array_ty.name()));
        }
        let size = usize::try_from(length)
            .ok()
            .and_then(|len| array_size(array_ty.element_size(), len))
            .and_then(|size| isize::try_from(size).ok())
            .ok_or_else(|| self.fault(FaultKind::OutOfMemory))?;
        let array = self.allocate(array_ty, size)?;
        // SAFETY: fresh array object, not yet shared.
        unsafe { ArrayObject::init_length(array, length) };
        Ok(array)
    }

    /// Thread object bound to the calling native thread, if any
    pub fn current_thread_object(&self) -> Option<&ThreadObject> {
        thread::bound_thread(self.id()).map(|obj| {
            // SAFETY: only thread objects are ever bound.
            unsafe { &*(obj.as_ptr() as *const ThreadObject) }
        })
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .field("heap", &self.inner.heap)
            .field("codec", &self.inner.codec)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::exception::ThrowableObject;
    use crate::thread::ThreadState;
    use crate::types::ClassSpec;

    #[test]
    fn test_boot_runs_constructors() {
        let rt = runtime();
        for kind in FaultKind::ALL {
            let obj = rt.fault(kind).object();
            let throwable = unsafe { obj.cast::<ThrowableObject>() };
            assert_eq!(throwable.cause(), Some(obj));
            assert!(rt.statics().contains(obj));
            assert!(!rt.heap().contains(obj));
        }

        let main = rt.current_thread_object().unwrap();
        assert_eq!(main.tid(), 1);
        assert_eq!(main.state(), ThreadState::Running);
        assert_eq!(rt.heap().stats().used, 0);
    }

    #[test]
    fn test_boot_with_unreservable_heap() {
        let err = Runtime::builder()
            .config(RuntimeConfig::default().with_heap_size(1))
            .console(Console::new(Box::new(std::io::sink()), Box::new(std::io::empty())))
            .boot()
            .unwrap_err();
        assert!(matches!(err, BootError::Heap { size: 1, .. }));
    }

    #[test]
    fn test_allocation_failures_raise_oom() {
        let (rt, _) = runtime_with_heap(256);
        let object = rt.builtins().object;
        let oom = rt.fault(FaultKind::OutOfMemory);

        assert_eq!(rt.allocate(object, -8), Err(oom));
        assert_eq!(rt.heap().cursor(), 0);
        assert_eq!(rt.allocate(object, 512), Err(oom));
        assert_eq!(rt.allocate(object, 8), Err(oom));
    }

    #[test]
    fn test_fault_outlives_runtime() {
        let fault = {
            let rt = runtime();
            Fault::new(rt.construct(rt.builtins().null_pointer).unwrap())
        };
        assert_eq!(fault.type_name(), "java.lang.NullPointerException");
        assert_eq!(fault.to_string(), "java.lang.NullPointerException");
    }

    #[test]
    fn test_undersized_thread_gets_full_layout() {
        let rt = runtime();
        let thread_ty = rt.builtins().thread;
        let t = rt.allocate(thread_ty, 0).unwrap();
        let next = rt.new_instance(rt.builtins().object).unwrap();
        assert!(next.addr() - t.addr() >= thread_ty.instance_size());

        rt.thread_start(Some(t)).unwrap();
        rt.thread_join(Some(t)).unwrap();
        assert_eq!(unsafe { t.cast::<ThreadObject>() }.state(), ThreadState::Joined);
    }

    #[test]
    fn test_new_array() {
        let rt = runtime();
        let ints = rt.new_array(rt.builtins().int_array, 10).unwrap();
        assert_eq!(rt.array_length(Some(ints)).unwrap(), 10);
        assert_eq!(rt.array_load::<i32>(Some(ints), 9).unwrap(), 0);

        let oom = rt.fault(FaultKind::OutOfMemory);
        assert_eq!(rt.new_array(rt.builtins().int_array, -1), Err(oom));
        assert_eq!(rt.new_array(rt.builtins().long_array, i32::MAX), Err(oom));
    }

    #[test]
    fn test_construct_and_dispatch() {
        fn init(rt: &Runtime, this: ObjRef) -> Throws<()> {
            unsafe { this.write_field::<i32>(crate::heap::HEADER_SIZE, 42) };
            let _ = rt;
            Ok(())
        }

        let mut builder = TypeRegistry::builder().unwrap();
        let point = builder
            .define_class(ClassSpec::new("app.Point", crate::heap::HEADER_SIZE + 8).method(methods::INIT, init))
            .unwrap();
        let rt = Runtime::builder()
            .types(builder.build().unwrap())
            .console(Console::new(Box::new(std::io::sink()), Box::new(std::io::empty())))
            .boot()
            .unwrap();

        let obj = rt.construct(point).unwrap();
        assert_eq!(unsafe { obj.read_field::<i32>(crate::heap::HEADER_SIZE) }, 42);

        let vm = rt.fault(FaultKind::VirtualMachine);
        assert_eq!(rt.invoke_virtual(obj, "missing"), Err(vm));
        assert_eq!(rt.new_instance(rt.builtins().int_array), Err(vm));
    }

    #[test]
    fn test_runtimes_are_independent() {
        let a = runtime();
        let b = runtime();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.main_thread(), b.main_thread());
        assert_ne!(a.fault(FaultKind::OutOfMemory), b.fault(FaultKind::OutOfMemory));
    }
}
