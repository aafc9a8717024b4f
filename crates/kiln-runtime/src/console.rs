//! Native console I/O
//!
//! Compiled code writes one internal code unit at a time and reads one
//! native byte at a time. The console transcodes on the way out and keeps a
//! high surrogate back until its partner arrives, so a supplementary
//! character written as two calls still reaches the sink as one character.

use crate::codec::Codec;
use parking_lot::Mutex;
use std::io::{self, Read, Write};
use std::sync::Arc;

struct OutputState {
    sink: Box<dyn Write + Send>,
    pending_high: Option<u16>,
}

/// Byte-oriented console with pluggable sinks
pub struct Console {
    out: Mutex<OutputState>,
    input: Mutex<Box<dyn Read + Send>>,
}

impl Console {
    /// Console over arbitrary output and input streams
    pub fn new(out: Box<dyn Write + Send>, input: Box<dyn Read + Send>) -> Self {
        Self {
            out: Mutex::new(OutputState {
                sink: out,
                pending_high: None,
            }),
            input: Mutex::new(input),
        }
    }

    /// Console over the process's stdout and stdin
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stdin()))
    }

    /// Write one code unit
    pub fn write_unit(&self, codec: &Codec, unit: u16) -> io::Result<()> {
        let mut out = self.out.lock();
        let units: ([u16; 2], usize) = match (out.pending_high.take(), unit) {
            (None, 0xD800..=0xDBFF) => {
                out.pending_high = Some(unit);
                return Ok(());
            }
            (Some(high), 0xDC00..=0xDFFF) => ([high, unit], 2),
            (Some(high), 0xD800..=0xDBFF) => {
                // Previous high surrogate was orphaned; this one waits in turn.
                out.pending_high = Some(unit);
                ([high, 0], 1)
            }
            (Some(high), _) => {
                let bytes = codec.decode_to_vec(&[high]);
                out.sink.write_all(&bytes)?;
                ([unit, 0], 1)
            }
            (None, _) => ([unit, 0], 1),
        };
        let bytes = codec.decode_to_vec(&units.0[..units.1]);
        out.sink.write_all(&bytes)
    }

    /// Write a run of code units
    pub fn write_units(&self, codec: &Codec, units: &[u16]) -> io::Result<()> {
        units.iter().try_for_each(|&unit| self.write_unit(codec, unit))
    }

    /// Read one native byte, `-1` at end of input
    pub fn read_byte(&self) -> io::Result<i32> {
        let mut input = self.input.lock();
        let mut byte = [0u8; 1];
        loop {
            match input.read(&mut byte) {
                Ok(0) => return Ok(-1),
                Ok(_) => return Ok(i32::from(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Flush buffered output (an orphaned high surrogate is written as `?`)
    pub fn flush(&self, codec: &Codec) -> io::Result<()> {
        let mut out = self.out.lock();
        if let Some(high) = out.pending_high.take() {
            let bytes = codec.decode_to_vec(&[high]);
            out.sink.write_all(&bytes)?;
        }
        out.sink.flush()
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdio()
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("pending_high", &self.out.lock().pending_high)
            .finish_non_exhaustive()
    }
}

/// Shared in-memory sink, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySink(Arc<Mutex<Vec<u8>>>);

impl MemorySink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// Contents as (lossy) UTF-8
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::NativeEncoding;

    fn console_with(input: &'static [u8]) -> (Console, MemorySink) {
        let sink = MemorySink::new();
        let console = Console::new(Box::new(sink.clone()), Box::new(input));
        (console, sink)
    }

    #[test]
    fn test_write_units() {
        let (console, sink) = console_with(b"");
        let codec = Codec::new(NativeEncoding::Utf8);
        let units: Vec<u16> = "hé €".encode_utf16().collect();
        console.write_units(&codec, &units).unwrap();
        assert_eq!(sink.to_string_lossy(), "hé €");
    }

    #[test]
    fn test_surrogate_pair_split_across_writes() {
        let (console, sink) = console_with(b"");
        let codec = Codec::new(NativeEncoding::Utf8);
        let units: Vec<u16> = "𝄞".encode_utf16().collect();

        console.write_unit(&codec, units[0]).unwrap();
        assert!(sink.contents().is_empty());
        console.write_unit(&codec, units[1]).unwrap();
        assert_eq!(sink.to_string_lossy(), "𝄞");
    }

    #[test]
    fn test_orphaned_surrogates() {
        let (console, sink) = console_with(b"");
        let codec = Codec::new(NativeEncoding::Utf8);

        console.write_unit(&codec, 0xD834).unwrap();
        console.write_unit(&codec, u16::from(b'x')).unwrap();
        console.write_unit(&codec, 0xDD1E).unwrap();
        console.write_unit(&codec, 0xD834).unwrap();
        console.flush(&codec).unwrap();
        assert_eq!(sink.contents(), b"?x??");
    }

    #[test]
    fn test_read_byte_until_eof() {
        let (console, _) = console_with(b"hi");
        assert_eq!(console.read_byte().unwrap(), i32::from(b'h'));
        assert_eq!(console.read_byte().unwrap(), i32::from(b'i'));
        assert_eq!(console.read_byte().unwrap(), -1);
        assert_eq!(console.read_byte().unwrap(), -1);
    }
}
