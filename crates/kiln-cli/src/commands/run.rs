//! `kiln run`: boot a runtime and launch a bundled program

use crate::programs;
use anyhow::anyhow;
use kiln_runtime::{Codec, Runtime, RuntimeConfig, TypeRegistry};
use std::ffi::OsString;

pub fn execute(name: &str, heap_size: Option<usize>, args: &[OsString]) -> anyhow::Result<()> {
    let program = programs::find(name)
        .ok_or_else(|| anyhow!("unknown program '{}' (see `kiln info`)", name))?;

    let mut config = RuntimeConfig::from_env();
    if let Some(size) = heap_size {
        config = config.with_heap_size(size);
    }

    let mut types = TypeRegistry::builder()?;
    programs::register_common(&mut types)?;
    (program.register)(&mut types)?;

    tracing::debug!(
        program = program.name,
        heap_size = config.heap_size,
        args = args.len(),
        "launching"
    );

    let builder = Runtime::builder()
        .config(config)
        .types(types.build()?)
        .codec(Codec::detect());
    kiln_runtime::launch(builder, program.main, args.iter().map(|arg| arg.as_encoded_bytes()))
}
