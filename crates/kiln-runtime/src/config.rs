//! Runtime configuration
//!
//! The runtime has a single startup knob: the size of the allocation arena.
//! It is read from the `KILN_HEAP_SIZE` environment variable using C `strtol`
//! base-0 syntax (`1048576`, `0x100000`, `04000000`). Anything that does not
//! parse to a positive size falls back to the default without complaint.

/// Environment variable selecting the arena size in bytes
pub const HEAP_SIZE_ENV: &str = "KILN_HEAP_SIZE";

/// Default arena size (1 MiB)
pub const DEFAULT_HEAP_SIZE: usize = 1024 * 1024;

/// Startup configuration for a [`Runtime`](crate::Runtime)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Arena size in bytes
    pub heap_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            heap_size: DEFAULT_HEAP_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let heap_size = match lookup(HEAP_SIZE_ENV) {
            Some(raw) => match parse_heap_size(&raw) {
                Some(size) => size,
                None => {
                    tracing::debug!(value = %raw, "ignoring malformed {}", HEAP_SIZE_ENV);
                    DEFAULT_HEAP_SIZE
                }
            },
            None => DEFAULT_HEAP_SIZE,
        };
        Self { heap_size }
    }

    /// Override the arena size
    pub fn with_heap_size(mut self, heap_size: usize) -> Self {
        self.heap_size = heap_size;
        self
    }
}

/// Parse a heap size written in `strtol` base-0 notation
///
/// Accepts an optional sign, a `0x`/`0X` prefix for hex, a leading `0` for
/// octal, and decimal otherwise. The whole string must be consumed. Zero and
/// negative values are rejected since they cannot describe an arena.
pub fn parse_heap_size(raw: &str) -> Option<usize> {
    let (negative, digits) = match raw.as_bytes().first()? {
        b'-' => (true, &raw[1..]),
        b'+' => (false, &raw[1..]),
        _ => (false, raw),
    };

    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }

    let value = usize::from_str_radix(body, radix).ok()?;
    if negative || value == 0 {
        return None;
    }
    Some(value)
}
