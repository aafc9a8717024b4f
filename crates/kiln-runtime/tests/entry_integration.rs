//! Integration tests for the process entry boundary

use kiln_runtime::exception::ThrowableObject;
use kiln_runtime::heap::{HeapLayout, ObjRef};
use kiln_runtime::types::{ClassSpec, TypeRegistry};
use kiln_runtime::{
    execute, Codec, Console, Fault, FaultKind, MemorySink, NativeEncoding, Runtime, RuntimeBuilder,
    RuntimeConfig, Throws,
};

fn builder(types: TypeRegistry, encoding: NativeEncoding, sink: &MemorySink) -> RuntimeBuilder {
    Runtime::builder()
        .config(RuntimeConfig::default().with_heap_size(128 * 1024))
        .types(types)
        .codec(Codec::new(encoding))
        .console(Console::new(Box::new(sink.clone()), Box::new(std::io::empty())))
}

fn custom_types() -> TypeRegistry {
    let mut types = TypeRegistry::builder().unwrap();
    types
        .define_class(
            ClassSpec::new("app.ConfigurationException", ThrowableObject::SIZE)
                .extends("java.lang.RuntimeException"),
        )
        .unwrap();
    types.build().unwrap()
}

/// Throws a program-defined exception
fn throw_custom(rt: &Runtime, _args: ObjRef) -> Throws<()> {
    let ty = rt.types().get("app.ConfigurationException").unwrap();
    let exception = rt.construct(ty)?;
    Err(Fault::new(exception))
}

/// Echoes its arguments back, reversed, one per line
fn reverse_args(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let count = rt.array_length(Some(args))?;
    for i in (0..count).rev() {
        let arg = rt.array_load::<Option<ObjRef>>(Some(args), i)?;
        for unit in rt.string_units(arg)? {
            rt.write_unit(i32::from(unit));
        }
        rt.write_unit(i32::from(b'\n'));
    }
    Ok(())
}

/// Indexes past the end of its arguments
fn out_of_bounds(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let count = rt.array_length(Some(args))?;
    rt.array_load::<Option<ObjRef>>(Some(args), count)?;
    Ok(())
}

/// Divides by the number of arguments
fn divide_by_argc(rt: &Runtime, args: ObjRef) -> Throws<()> {
    let count = rt.array_length(Some(args))?;
    rt.div_i32(100, count)?;
    Ok(())
}

#[test]
fn test_program_defined_exception_is_reported_by_name() {
    let sink = MemorySink::new();
    let mut err = Vec::new();
    let status = execute(
        builder(custom_types(), NativeEncoding::Utf8, &sink),
        throw_custom,
        Vec::<&str>::new(),
        &mut err,
    );
    assert_eq!(status, 1);
    assert_eq!(
        String::from_utf8(err).unwrap(),
        "Uncaught exception: app.ConfigurationException\n"
    );
}

#[test]
fn test_arguments_reach_main_in_order() {
    let sink = MemorySink::new();
    let mut err = Vec::new();
    let status = execute(
        builder(TypeRegistry::standard().unwrap(), NativeEncoding::Utf8, &sink),
        reverse_args,
        ["first", "zweite", "третий"],
        &mut err,
    );
    assert_eq!(status, 0);
    assert_eq!(sink.to_string_lossy(), "третий\nzweite\nfirst\n");
}

#[test]
fn test_latin1_arguments_are_transcoded() {
    let sink = MemorySink::new();
    let mut err = Vec::new();
    let status = execute(
        builder(TypeRegistry::standard().unwrap(), NativeEncoding::Latin1, &sink),
        reverse_args,
        [&b"caf\xe9"[..]],
        &mut err,
    );
    assert_eq!(status, 0);
    assert_eq!(sink.contents(), b"caf\xe9\n");
}

#[test]
fn test_implicit_checks_surface_as_uncaught() {
    let cases: [(fn(&Runtime, ObjRef) -> Throws<()>, &str); 2] = [
        (out_of_bounds, "java.lang.ArrayIndexOutOfBoundsException"),
        (divide_by_argc, "java.lang.ArithmeticException"),
    ];
    for (main, name) in cases {
        let sink = MemorySink::new();
        let mut err = Vec::new();
        let status = execute(
            builder(TypeRegistry::standard().unwrap(), NativeEncoding::Utf8, &sink),
            main,
            Vec::<&str>::new(),
            &mut err,
        );
        assert_eq!(status, 1);
        assert_eq!(String::from_utf8(err).unwrap(), format!("Uncaught exception: {}\n", name));
    }
}

#[test]
fn test_fault_identity_survives_the_boundary() {
    let sink = MemorySink::new();
    let rt = builder(TypeRegistry::standard().unwrap(), NativeEncoding::Utf8, &sink)
        .boot()
        .unwrap();
    let fault = rt.run_main(out_of_bounds, Vec::<&str>::new()).unwrap_err();
    assert_eq!(fault, rt.fault(FaultKind::ArrayIndexOutOfBounds));
    assert_eq!(rt.faults().kind_of(fault), Some(FaultKind::ArrayIndexOutOfBounds));
}
