//! `kiln info`: runtime configuration and bundled programs

use crate::programs;
use kiln_runtime::config::HEAP_SIZE_ENV;
use kiln_runtime::{NativeEncoding, RuntimeConfig};

pub fn execute() -> anyhow::Result<()> {
    println!("Kiln v{}", env!("CARGO_PKG_VERSION"));
    println!();

    let config = RuntimeConfig::from_env();
    println!("Platform:     {} ({})", std::env::consts::OS, std::env::consts::ARCH);
    println!("CPUs:         {}", num_cpus::get());
    println!("Heap size:    {} bytes", config.heap_size);
    println!("Encoding:     {}", encoding_name(NativeEncoding::detect()));

    println!();
    println!("Environment:");
    print_env("  KILN_HEAP_SIZE", HEAP_SIZE_ENV);
    print_env("  KILN_LOG", crate::LOG_ENV);

    println!();
    println!("Programs:");
    for program in programs::ALL {
        println!("  {:<10} {}", program.name, program.summary);
    }

    Ok(())
}

fn encoding_name(encoding: NativeEncoding) -> &'static str {
    match encoding {
        NativeEncoding::Utf8 => "UTF-8",
        NativeEncoding::Latin1 => "ISO-8859-1",
        NativeEncoding::Ascii => "US-ASCII",
    }
}

fn print_env(label: &str, var: &str) {
    match std::env::var(var) {
        Ok(val) => println!("{} = {}", label, val),
        Err(_) => println!("{} = (default)", label),
    }
}
