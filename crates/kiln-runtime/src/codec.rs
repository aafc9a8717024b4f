//! Text codec boundary
//!
//! Strings inside the runtime are UTF-16 code units. Everything crossing the
//! process boundary (arguments, console output, diagnostics) is in the
//! native encoding of the locale. Conversion is lossy in the direction that
//! has to be: characters the native encoding cannot represent are
//! transliterated to a close ASCII spelling, or `?` when there is none.
//!
//! | direction | bad input | result |
//! |-----------|-----------|--------|
//! | native → internal | invalid UTF-8 sequence | U+FFFD |
//! | native → internal | non-ASCII byte in ASCII locale | U+FFFD |
//! | internal → native | unpaired surrogate | `?` |
//! | internal → native | unrepresentable character | transliteration or `?` |

/// Replacement for characters that cannot be output at all
const UNKNOWN: &str = "?";

/// Errors that can occur when transcoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// The output buffer filled up before the input was consumed
    #[error("Output buffer exhausted after {written} units")]
    OutputExhausted {
        /// Units (or bytes) written before running out of room
        written: usize,
    },
}

/// Native character encodings the runtime understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeEncoding {
    /// UTF-8
    Utf8,
    /// ISO-8859-1
    Latin1,
    /// 7-bit US-ASCII
    Ascii,
}

impl NativeEncoding {
    /// Encoding named by a locale codeset such as `UTF-8` or `ISO-8859-1`
    pub fn from_codeset(codeset: &str) -> Option<Self> {
        let normalized: String = codeset
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" => Some(NativeEncoding::Utf8),
            "iso88591" | "latin1" | "l1" => Some(NativeEncoding::Latin1),
            "ascii" | "usascii" | "ansix3.41968" | "646" => Some(NativeEncoding::Ascii),
            _ => None,
        }
    }

    /// Encoding implied by a locale name (`C`, `en_US.UTF-8`, `de_DE.ISO-8859-1@euro`)
    pub fn from_locale(locale: &str) -> Self {
        if locale == "C" || locale == "POSIX" {
            return NativeEncoding::Ascii;
        }
        locale
            .split_once('.')
            .map(|(_, rest)| rest.split('@').next().unwrap_or(rest))
            .and_then(Self::from_codeset)
            .unwrap_or(NativeEncoding::Utf8)
    }

    /// Detect the encoding of the process locale
    ///
    /// The C library reports the codeset of the locale the environment
    /// selects. With no locale variable set, or on hosts that cannot answer,
    /// the variables are read directly.
    pub fn detect() -> Self {
        Self::resolve(|key| std::env::var(key).ok(), host_codeset)
    }

    /// Detect the encoding through an arbitrary variable lookup
    pub fn detect_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        LOCALE_VARS
            .into_iter()
            .filter_map(|key| lookup(key))
            .find(|value| !value.is_empty())
            .map(|locale| Self::from_locale(&locale))
            .unwrap_or(NativeEncoding::Utf8)
    }

    fn resolve<F, H>(lookup: F, host: H) -> Self
    where
        F: Fn(&str) -> Option<String>,
        H: FnOnce() -> Option<String>,
    {
        let configured = LOCALE_VARS
            .into_iter()
            .any(|key| lookup(key).is_some_and(|value| !value.is_empty()));
        if configured {
            if let Some(codeset) = host() {
                tracing::debug!(%codeset, "host locale codeset");
                return Self::from_codeset(&codeset).unwrap_or(NativeEncoding::Utf8);
            }
        }
        Self::detect_with(lookup)
    }
}

/// Variables selecting the character type locale, highest precedence first
const LOCALE_VARS: [&str; 3] = ["LC_ALL", "LC_CTYPE", "LANG"];

/// Codeset of the environment's locale as the C library names it
#[cfg(unix)]
fn host_codeset() -> Option<String> {
    use once_cell::sync::Lazy;
    use std::ffi::CStr;

    // setlocale mutates process state; query it once.
    static CODESET: Lazy<Option<String>> = Lazy::new(|| {
        // SAFETY: the empty locale name selects the environment's locale and
        // the returned codeset is copied out before any other locale call.
        unsafe {
            if libc::setlocale(libc::LC_ALL, c"".as_ptr()).is_null() {
                return None;
            }
            let codeset = libc::nl_langinfo(libc::CODESET);
            if codeset.is_null() {
                return None;
            }
            Some(CStr::from_ptr(codeset).to_string_lossy().into_owned())
        }
    });
    CODESET.clone()
}

#[cfg(not(unix))]
fn host_codeset() -> Option<String> {
    None
}

/// Destination for transcoded output
trait Sink<T> {
    /// Append `items` whole, or nothing; false when they do not fit
    fn put(&mut self, items: &[T]) -> bool;
}

struct SliceSink<'a, T> {
    buf: &'a mut [T],
    len: usize,
}

impl<T: Copy> Sink<T> for SliceSink<'_, T> {
    fn put(&mut self, items: &[T]) -> bool {
        let end = self.len + items.len();
        if end > self.buf.len() {
            return false;
        }
        self.buf[self.len..end].copy_from_slice(items);
        self.len = end;
        true
    }
}

impl<T: Copy> Sink<T> for Vec<T> {
    fn put(&mut self, items: &[T]) -> bool {
        self.extend_from_slice(items);
        true
    }
}

/// Converter between native bytes and internal code units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    native: NativeEncoding,
}

impl Codec {
    /// Codec for a fixed native encoding
    pub fn new(native: NativeEncoding) -> Self {
        Self { native }
    }

    /// Codec for the process locale
    pub fn detect() -> Self {
        Self::new(NativeEncoding::detect())
    }

    /// The native encoding
    pub fn native(&self) -> NativeEncoding {
        self.native
    }

    /// Native bytes to code units, returning the number of units written
    pub fn encode(&self, input: &[u8], out: &mut [u16]) -> Result<usize, CodecError> {
        let mut sink = SliceSink { buf: out, len: 0 };
        if self.encode_into(input, &mut sink) {
            Ok(sink.len)
        } else {
            Err(CodecError::OutputExhausted { written: sink.len })
        }
    }

    /// Code units to native bytes, returning the number of bytes written
    pub fn decode(&self, input: &[u16], out: &mut [u8]) -> Result<usize, CodecError> {
        let mut sink = SliceSink { buf: out, len: 0 };
        if self.decode_into(input, &mut sink) {
            Ok(sink.len)
        } else {
            Err(CodecError::OutputExhausted { written: sink.len })
        }
    }

    /// Native bytes to a freshly sized vector of code units
    pub fn encode_to_vec(&self, input: &[u8]) -> Vec<u16> {
        let mut out = Vec::with_capacity(input.len());
        self.encode_into(input, &mut out);
        out
    }

    /// Code units to a freshly sized vector of native bytes
    pub fn decode_to_vec(&self, input: &[u16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len());
        self.decode_into(input, &mut out);
        out
    }

    fn encode_into<S: Sink<u16>>(&self, input: &[u8], sink: &mut S) -> bool {
        match self.native {
            NativeEncoding::Utf8 => {
                let mut units = [0u16; 2];
                for chunk in input.utf8_chunks() {
                    for c in chunk.valid().chars() {
                        if !sink.put(c.encode_utf16(&mut units)) {
                            return false;
                        }
                    }
                    if !chunk.invalid().is_empty()
                        && !sink.put(&[char::REPLACEMENT_CHARACTER as u16])
                    {
                        return false;
                    }
                }
                true
            }
            NativeEncoding::Latin1 => input.iter().all(|&b| sink.put(&[u16::from(b)])),
            NativeEncoding::Ascii => input.iter().all(|&b| {
                let unit = if b.is_ascii() {
                    u16::from(b)
                } else {
                    char::REPLACEMENT_CHARACTER as u16
                };
                sink.put(&[unit])
            }),
        }
    }

    fn decode_into<S: Sink<u8>>(&self, input: &[u16], sink: &mut S) -> bool {
        let mut bytes = [0u8; 4];
        for decoded in char::decode_utf16(input.iter().copied()) {
            let fits = match decoded {
                Err(_) => sink.put(UNKNOWN.as_bytes()),
                Ok(c) => match self.native {
                    NativeEncoding::Utf8 => sink.put(c.encode_utf8(&mut bytes).as_bytes()),
                    NativeEncoding::Latin1 if (c as u32) <= 0xFF => sink.put(&[c as u8]),
                    NativeEncoding::Ascii if c.is_ascii() => sink.put(&[c as u8]),
                    NativeEncoding::Latin1 | NativeEncoding::Ascii => {
                        sink.put(transliterate(c).unwrap_or(UNKNOWN).as_bytes())
                    }
                },
            };
            if !fits {
                return false;
            }
        }
        true
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(NativeEncoding::Utf8)
    }
}

/// ASCII approximation of a character, if one is known
pub fn transliterate(c: char) -> Option<&'static str> {
    let approx = match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{2032}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{2033}' => "\"",
        '\u{2010}'..='\u{2015}' | '\u{2212}' => "-",
        '\u{2026}' => "...",
        '\u{2022}' => "o",
        '\u{00A0}' | '\u{2002}'..='\u{200A}' => " ",
        '\u{00AB}' => "<<",
        '\u{00BB}' => ">>",
        '\u{00A9}' => "(C)",
        '\u{00AE}' => "(R)",
        '\u{2122}' => "(TM)",
        '\u{00D7}' => "x",
        '\u{20AC}' => "EUR",
        '\u{00A3}' => "GBP",
        '\u{00DF}' => "ss",
        '\u{00C6}' => "AE",
        '\u{00E6}' => "ae",
        '\u{0152}' => "OE",
        '\u{0153}' => "oe",
        '\u{00C0}'..='\u{00C5}' | '\u{0100}' | '\u{0102}' | '\u{0104}' => "A",
        '\u{00E0}'..='\u{00E5}' | '\u{0101}' | '\u{0103}' | '\u{0105}' => "a",
        '\u{00C7}' | '\u{0106}' | '\u{010C}' => "C",
        '\u{00E7}' | '\u{0107}' | '\u{010D}' => "c",
        '\u{00C8}'..='\u{00CB}' | '\u{0118}' | '\u{011A}' => "E",
        '\u{00E8}'..='\u{00EB}' | '\u{0119}' | '\u{011B}' => "e",
        '\u{00CC}'..='\u{00CF}' => "I",
        '\u{00EC}'..='\u{00EF}' | '\u{0131}' => "i",
        '\u{0141}' => "L",
        '\u{0142}' => "l",
        '\u{00D1}' | '\u{0143}' | '\u{0147}' => "N",
        '\u{00F1}' | '\u{0144}' | '\u{0148}' => "n",
        '\u{00D2}'..='\u{00D6}' | '\u{00D8}' | '\u{0150}' => "O",
        '\u{00F2}'..='\u{00F6}' | '\u{00F8}' | '\u{0151}' => "o",
        '\u{0160}' | '\u{015A}' => "S",
        '\u{0161}' | '\u{015B}' => "s",
        '\u{00D9}'..='\u{00DC}' | '\u{016E}' | '\u{0170}' => "U",
        '\u{00F9}'..='\u{00FC}' | '\u{016F}' | '\u{0171}' => "u",
        '\u{00DD}' | '\u{0178}' => "Y",
        '\u{00FD}' | '\u{00FF}' => "y",
        '\u{017D}' | '\u{0179}' | '\u{017B}' => "Z",
        '\u{017E}' | '\u{017A}' | '\u{017C}' => "z",
        _ => return None,
    };
    Some(approx)
}
