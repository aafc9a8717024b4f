//! Process entry boundary
//!
//! ```text
//! argv ──▶ marshal_args ──▶ String[] ──▶ main(rt, args)
//!                                           │
//!                    Ok ◀───────────────────┤
//!                    Err(fault) ──▶ "Uncaught exception: <name>" on stderr, exit 1
//! ```

use super::{BootError, Runtime, RuntimeBuilder};
use crate::exception::{write_uncaught, Fault, FaultKind, Throws, UNCAUGHT_PREFIX};
use crate::heap::ObjRef;
use crate::types::OUT_OF_MEMORY_ERROR;
use std::io::{self, Write};

/// Compiled `public static void main(String[])`
pub type MainMethod = fn(&Runtime, ObjRef) -> Throws<()>;

impl Runtime {
    /// Build the `String[]` handed to `main`
    ///
    /// `args` excludes the program name; each argument is transcoded from the
    /// native encoding.
    pub fn marshal_args<I, A>(&self, args: I) -> Throws<ObjRef>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let args: Vec<A> = args.into_iter().collect();
        let length = i32::try_from(args.len())
            .map_err(|_| self.fault(FaultKind::OutOfMemory))?;
        let array = self.new_array(self.builtins().string_array, length)?;
        for (index, arg) in args.iter().enumerate() {
            let string = self.string_from_native(arg.as_ref())?;
            self.array_store(Some(array), index as i32, Some(string))?;
        }
        Ok(array)
    }

    /// Marshal `args` and run `main`, flushing console output afterwards
    pub fn run_main<I, A>(&self, main: MainMethod, args: I) -> Throws<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<[u8]>,
    {
        let argv = self.marshal_args(args)?;
        let result = main(self, argv);
        self.flush_console();
        result
    }

    /// Flush output and write the uncaught-exception diagnostic to `out`
    pub fn report_uncaught<W: Write>(&self, fault: Fault, out: &mut W) -> io::Result<()> {
        self.flush_console();
        tracing::error!(exception = fault.type_name(), "uncaught exception");
        write_uncaught(fault, self.codec(), out)
    }

    /// Report an uncaught fault on stderr and terminate the process
    pub fn uncaught(&self, fault: Fault) -> ! {
        let _ = self.report_uncaught(fault, &mut io::stderr().lock());
        std::process::exit(1)
    }
}

/// Boot, run `main`, and report the outcome as an exit status
///
/// Diagnostics go to `err`. An arena that cannot be reserved is reported as
/// an uncaught out-of-memory error, the same as running out later.
pub fn execute<I, A, W>(builder: RuntimeBuilder, main: MainMethod, args: I, err: &mut W) -> i32
where
    I: IntoIterator<Item = A>,
    A: AsRef<[u8]>,
    W: Write,
{
    let runtime = match builder.boot() {
        Ok(runtime) => runtime,
        Err(BootError::Heap { size, source }) => {
            tracing::error!(size, error = %source, "unable to reserve heap");
            let _ = writeln!(err, "{}{}", UNCAUGHT_PREFIX, OUT_OF_MEMORY_ERROR);
            return 1;
        }
        Err(e) => {
            tracing::error!(error = %e, "runtime failed to boot");
            let _ = writeln!(err, "{}", e);
            return 1;
        }
    };

    match runtime.run_main(main, args) {
        Ok(()) => 0,
        Err(fault) => {
            let _ = runtime.report_uncaught(fault, err);
            1
        }
    }
}

/// [`execute`] against stderr, then exit the process with its status
pub fn launch<I, A>(builder: RuntimeBuilder, main: MainMethod, args: I) -> !
where
    I: IntoIterator<Item = A>,
    A: AsRef<[u8]>,
{
    let status = execute(builder, main, args, &mut io::stderr().lock());
    std::process::exit(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, NativeEncoding};
    use crate::config::RuntimeConfig;
    use crate::console::{Console, MemorySink};

    fn builder(heap_size: usize, sink: &MemorySink) -> RuntimeBuilder {
        Runtime::builder()
            .config(RuntimeConfig::default().with_heap_size(heap_size))
            .codec(Codec::new(NativeEncoding::Utf8))
            .console(Console::new(Box::new(sink.clone()), Box::new(io::empty())))
    }

    fn echo(rt: &Runtime, args: ObjRef) -> Throws<()> {
        let count = rt.array_length(Some(args))?;
        for i in 0..count {
            let arg = rt.array_load::<Option<ObjRef>>(Some(args), i)?;
            for unit in rt.string_units(arg)? {
                rt.write_unit(i32::from(unit));
            }
            rt.write_unit(i32::from(b'\n'));
        }
        Ok(())
    }

    fn exhaust(rt: &Runtime, _args: ObjRef) -> Throws<()> {
        loop {
            rt.new_array(rt.builtins().long_array, 1024)?;
        }
    }

    #[test]
    fn test_marshal_args() {
        let sink = MemorySink::new();
        let rt = builder(64 * 1024, &sink).boot().unwrap();
        let args = rt.marshal_args(["one", "zwei", "три"]).unwrap();

        assert!(std::ptr::eq(args.type_descriptor(), rt.builtins().string_array));
        assert_eq!(rt.array_length(Some(args)).unwrap(), 3);
        let third = rt.array_load::<Option<ObjRef>>(Some(args), 2).unwrap();
        assert_eq!(rt.string_to_rust(third).unwrap(), "три");

        let empty = rt.marshal_args(Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(rt.array_length(Some(empty)).unwrap(), 0);
    }

    #[test]
    fn test_execute_success() {
        let sink = MemorySink::new();
        let mut err = Vec::new();
        let status = execute(builder(64 * 1024, &sink), echo, ["a", "bc"], &mut err);
        assert_eq!(status, 0);
        assert_eq!(sink.to_string_lossy(), "a\nbc\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_execute_uncaught_oom() {
        let sink = MemorySink::new();
        let mut err = Vec::new();
        let status = execute(builder(64 * 1024, &sink), exhaust, Vec::<&str>::new(), &mut err);
        assert_eq!(status, 1);
        assert_eq!(err, b"Uncaught exception: java.lang.OutOfMemoryError\n");
    }

    #[test]
    fn test_execute_unreservable_heap() {
        let sink = MemorySink::new();
        let mut err = Vec::new();
        let status = execute(builder(0, &sink), echo, Vec::<&str>::new(), &mut err);
        assert_eq!(status, 1);
        assert_eq!(err, b"Uncaught exception: java.lang.OutOfMemoryError\n");
    }

    #[test]
    fn test_report_uncaught_flushes_console_first() {
        let sink = MemorySink::new();
        let rt = builder(4096, &sink).boot().unwrap();
        // A dangling high surrogate is only written on flush.
        rt.write_unit(0xD800);
        let mut err = Vec::new();
        rt.report_uncaught(rt.fault(FaultKind::ClassCast), &mut err).unwrap();
        assert_eq!(sink.contents(), b"?");
        assert_eq!(err, b"Uncaught exception: java.lang.ClassCastException\n");
    }
}
