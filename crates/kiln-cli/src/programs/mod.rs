//! Bundled programs
//!
//! Each program is written the way the compiler lowers Java: a `main` taking
//! the runtime and a `String[]`, explicit null and bounds checks through the
//! runtime helpers, every call site propagating faults with `?`, and object
//! state reached through `#[repr(C)]` layouts that extend the runtime's own.

mod counter;
mod echo;
mod exhaust;
mod pingpong;
mod sieve;

use kiln_runtime::heap::{HeapLayout, ObjRef, ObjectHeader};
use kiln_runtime::types::{ClassSpec, RegistryError, TypeDescriptor, TypeRegistryBuilder};
use kiln_runtime::{Fault, MainMethod, Runtime, Throws};
use std::mem::offset_of;

/// A bundled program and the classes it brings along
pub struct Program {
    pub name: &'static str,
    pub summary: &'static str,
    pub main: MainMethod,
    pub register: fn(&mut TypeRegistryBuilder) -> Result<(), RegistryError>,
}

pub const ALL: &[Program] = &[
    echo::PROGRAM,
    counter::PROGRAM,
    pingpong::PROGRAM,
    sieve::PROGRAM,
    exhaust::PROGRAM,
];

pub fn find(name: &str) -> Option<&'static Program> {
    ALL.iter().find(|program| program.name == name)
}

const NUMBER_FORMAT_EXCEPTION: &str = "java.lang.NumberFormatException";
const CELL_CLASS: &str = "kiln.demo.Cell";

/// Classes every program may use
pub fn register_common(types: &mut TypeRegistryBuilder) -> Result<(), RegistryError> {
    types.define_class(
        ClassSpec::new(
            NUMBER_FORMAT_EXCEPTION,
            kiln_runtime::exception::ThrowableObject::SIZE,
        )
        .extends("java.lang.RuntimeException"),
    )?;
    types.define_class(ClassSpec::new(CELL_CLASS, Cell::SIZE))?;
    Ok(())
}

fn no_classes(_: &mut TypeRegistryBuilder) -> Result<(), RegistryError> {
    Ok(())
}

/// Mutable `long` shared between threads, guarded by its own monitor
#[repr(C)]
pub struct Cell {
    header: ObjectHeader,
    value: i64,
}

// SAFETY: repr(C), header first, all-zero is a cell holding 0.
unsafe impl HeapLayout for Cell {}

impl Cell {
    pub fn get(cell: ObjRef) -> i64 {
        // SAFETY: only called on objects of CELL_CLASS.
        unsafe { cell.cast::<Cell>() }.value
    }

    pub fn set(cell: ObjRef, value: i64) {
        // SAFETY: only called on objects of CELL_CLASS.
        unsafe { cell.write_field(offset_of!(Cell, value), value) }
    }
}

/// Look up a class the program registered
pub fn class(rt: &Runtime, name: &str) -> Throws<&'static TypeDescriptor> {
    rt.types()
        .get(name)
        .ok_or_else(|| rt.vm_error("class not registered", &name))
}

/// `System.out.print(String)` through the one-unit output native
pub fn print(rt: &Runtime, string: Option<ObjRef>) -> Throws<()> {
    for unit in rt.string_units(string)? {
        rt.write_unit(i32::from(unit));
    }
    Ok(())
}

/// `System.out.println(String)` for a string literal
pub fn println(rt: &Runtime, text: &str) -> Throws<()> {
    let string = rt.new_string_from_str(text)?;
    print(rt, Some(string))?;
    rt.write_unit(i32::from(b'\n'));
    Ok(())
}

/// `Integer.parseInt(args[index])`, or `default` when there is no such argument
pub fn int_arg(rt: &Runtime, args: ObjRef, index: i32, default: i32) -> Throws<i32> {
    if index >= rt.array_length(Some(args))? {
        return Ok(default);
    }
    let arg = rt.array_load::<Option<ObjRef>>(Some(args), index)?;
    parse_int(rt, arg)
}

/// `Integer.parseInt(String)`
pub fn parse_int(rt: &Runtime, string: Option<ObjRef>) -> Throws<i32> {
    let units = rt.string_units(string)?;
    let (negative, digits) = match units.split_first() {
        Some((&unit, rest)) if unit == u16::from(b'-') => (true, rest),
        Some((&unit, rest)) if unit == u16::from(b'+') => (false, rest),
        _ => (false, &units[..]),
    };
    if digits.is_empty() {
        return Err(number_format(rt)?);
    }

    // Accumulate negatively so i32::MIN parses
    let mut value: i32 = 0;
    for &unit in digits {
        let digit = match char::from_u32(u32::from(unit)).and_then(|c| c.to_digit(10)) {
            Some(d) => d as i32,
            None => return Err(number_format(rt)?),
        };
        value = match value.checked_mul(10).and_then(|v| v.checked_sub(digit)) {
            Some(v) => v,
            None => return Err(number_format(rt)?),
        };
    }
    if negative {
        return Ok(value);
    }
    match value.checked_neg() {
        Some(v) => Ok(v),
        None => Err(number_format(rt)?),
    }
}

fn number_format(rt: &Runtime) -> Throws<Fault> {
    let ty = class(rt, NUMBER_FORMAT_EXCEPTION)?;
    Ok(Fault::new(rt.construct(ty)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_runtime::{Codec, Console, MemorySink, NativeEncoding, RuntimeConfig, TypeRegistry};

    fn boot(program: &Program) -> (Runtime, MemorySink) {
        let mut types = TypeRegistry::builder().unwrap();
        register_common(&mut types).unwrap();
        (program.register)(&mut types).unwrap();
        let sink = MemorySink::new();
        let rt = Runtime::builder()
            .config(RuntimeConfig::default().with_heap_size(4 * 1024 * 1024))
            .types(types.build().unwrap())
            .codec(Codec::new(NativeEncoding::Utf8))
            .console(Console::new(Box::new(sink.clone()), Box::new(std::io::empty())))
            .boot()
            .unwrap();
        (rt, sink)
    }

    fn run(name: &str, args: &[&str]) -> (Throws<()>, String) {
        let program = find(name).unwrap();
        let (rt, sink) = boot(program);
        let result = rt.run_main(program.main, args.iter().copied());
        (result, sink.to_string_lossy())
    }

    fn parse(rt: &Runtime, text: &str) -> Throws<i32> {
        let string = rt.new_string_from_str(text)?;
        parse_int(rt, Some(string))
    }

    #[test]
    fn test_parse_int() {
        let (rt, _) = boot(&ALL[0]);
        assert_eq!(parse(&rt, "0"), Ok(0));
        assert_eq!(parse(&rt, "+17"), Ok(17));
        assert_eq!(parse(&rt, "-42"), Ok(-42));
        assert_eq!(parse(&rt, "2147483647"), Ok(i32::MAX));
        assert_eq!(parse(&rt, "-2147483648"), Ok(i32::MIN));

        for bad in ["", "-", "12a", "2147483648", "٣"] {
            let fault = parse(&rt, bad).unwrap_err();
            assert_eq!(fault.type_name(), NUMBER_FORMAT_EXCEPTION, "input {:?}", bad);
        }
        assert_eq!(
            parse_int(&rt, None),
            Err(rt.fault(kiln_runtime::FaultKind::NullPointer))
        );
    }

    #[test]
    fn test_program_names_are_unique() {
        for (i, a) in ALL.iter().enumerate() {
            assert!(ALL[i + 1..].iter().all(|b| b.name != a.name));
            assert!(std::ptr::eq(find(a.name).unwrap(), a));
        }
        assert!(find("missing").is_none());
    }

    #[test]
    fn test_echo() {
        let (result, out) = run("echo", &["hello", "wörld"]);
        assert_eq!(result, Ok(()));
        assert_eq!(out, "hello wörld\n");

        let (_, out) = run("echo", &[]);
        assert_eq!(out, "\n");
    }

    #[test]
    fn test_counter() {
        let (result, out) = run("counter", &["4", "2500"]);
        assert_eq!(result, Ok(()));
        assert_eq!(out, "4 threads x 2500 increments = 10000\n");
    }

    #[test]
    fn test_pingpong() {
        let (result, out) = run("pingpong", &["300"]);
        assert_eq!(result, Ok(()));
        assert!(out.starts_with("600 moves in "), "{}", out);
    }

    #[test]
    fn test_sieve() {
        let (result, out) = run("sieve", &["100", "2"]);
        assert_eq!(result, Ok(()));
        assert!(out.starts_with("primes below 100: 25\nbest of 2 passes: "), "{}", out);
    }

    #[test]
    fn test_exhaust() {
        let (result, _) = run("exhaust", &["64"]);
        assert_eq!(result.unwrap_err().type_name(), kiln_runtime::types::OUT_OF_MEMORY_ERROR);
    }

    #[test]
    fn test_bad_argument_faults() {
        let (result, _) = run("counter", &["many"]);
        assert_eq!(result.unwrap_err().type_name(), NUMBER_FORMAT_EXCEPTION);
    }
}
