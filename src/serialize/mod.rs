//! `Serialize` — the directed traversal driver described in `spec.md`
//! §4.3: a session bound to exactly one channel and one format plugin,
//! turning a type's `beginType`/`endType`/`beginBaseType`/leaf calls into
//! bytes (or the inverse), with an optional self-describing header and a
//! calc-size mode.
//!
//! The traversal is symmetric: a single [`Serializable::serialize`]
//! implementation drives both directions, the same shape as Boost's
//! `serialize()` archive pattern or `cereal`'s `CEREAL_NVP` — `Serialize`
//! itself decides whether a leaf call writes the value it's given or
//! overwrites it from the stream, so user code never branches on
//! direction.

mod error;
pub mod format;
mod header;
mod primitive;

pub use error::{SerializeError, SerializeResult};
pub use format::Format;
pub use header::{Header, HeaderSizes, DEFAULT_MAX_DECLARED_TYPE_LEN};
pub use primitive::{Primitive, PrimitiveKind};

use crate::channel::backends::calc::CalcChannel;
use crate::channel::{AccessMode, ChannelError, ChannelResult, IOChannel, PropertyValue, Whence};

/// Which way a session moves bytes, per `spec.md` §3's "direction (read or
/// write)" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// `spec.md` §3's "stream mode (normal, header-embedded, header-separated)".
/// `Normal` writes no header at all — used internally by
/// [`crate::pqueue::PQueue`], which has no use for cross-process format
/// validation on a slot that never leaves the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Normal,
    HeaderEmbedded,
    HeaderSeparate,
}

/// The Rust shape of `<TypeName>_indirectSerialize` (`spec.md` §9's
/// "naming-convention dynamic dispatch" collapsed into a compile-time
/// trait, per `SPEC_FULL.md` §4.4). One implementation per user type,
/// responsible for its own `begin_type`/`end_type` wrapping and field
/// order.
pub trait Serializable {
    fn serialize(&mut self, name: &str, s: &mut Serialize<'_>) -> SerializeResult<()>;
}

/// A thin `IOChannel` wrapper that counts bytes crossing it, letting
/// `Serialize` track a running byte count (`spec.md` §3) without needing
/// every format plugin to report it explicitly.
struct CountingChannel<'c> {
    inner: &'c mut dyn IOChannel,
    count: u64,
}

impl<'c> CountingChannel<'c> {
    fn new(inner: &'c mut dyn IOChannel) -> Self {
        CountingChannel { inner, count: 0 }
    }
}

impl<'c> IOChannel for CountingChannel<'c> {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        self.inner.flush()
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> ChannelResult<u64> {
        self.inner.seek(offset, whence)
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.inner.close()
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        self.inner.get_property(name)
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> bool {
        self.inner.set_property(name, value)
    }

    fn error(&self) -> Option<ChannelError> {
        self.inner.error()
    }

    fn clear_error(&mut self) {
        self.inner.clear_error()
    }

    fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }

    fn mode(&self) -> AccessMode {
        self.inner.mode()
    }
}

/// A serialization session bound to one channel and one format plugin, per
/// `spec.md` §3/§4.3.
pub struct Serialize<'a> {
    channel: &'a mut dyn IOChannel,
    header_channel: Option<&'a mut dyn IOChannel>,
    format: Box<dyn Format>,
    direction: Direction,
    stream_mode: StreamMode,
    depth: u32,
    type_stack: Vec<(String, String)>,
    in_base_type: bool,
    header_sizes: HeaderSizes,
    header_written: bool,
    max_declared_type_len: usize,
    major: u8,
    minor: u8,
    error: Option<SerializeError>,
    is_calc_size: bool,
    byte_count: u64,
}

impl<'a> Serialize<'a> {
    pub fn new(channel: &'a mut dyn IOChannel, format: Box<dyn Format>, direction: Direction) -> Self {
        Serialize {
            channel,
            header_channel: None,
            format,
            direction,
            stream_mode: StreamMode::Normal,
            depth: 0,
            type_stack: Vec::new(),
            in_base_type: false,
            header_sizes: HeaderSizes::default(),
            header_written: false,
            max_declared_type_len: DEFAULT_MAX_DECLARED_TYPE_LEN,
            major: 1,
            minor: 0,
            error: None,
            is_calc_size: false,
            byte_count: 0,
        }
    }

    pub fn with_stream_mode(mut self, mode: StreamMode) -> Self {
        self.stream_mode = mode;
        self
    }

    /// Binds a second channel that carries the header when `stream_mode`
    /// is [`StreamMode::HeaderSeparate`]; ignored in other modes.
    pub fn with_header_channel(mut self, header_channel: &'a mut dyn IOChannel) -> Self {
        self.header_channel = Some(header_channel);
        self
    }

    pub fn with_version(mut self, major: u8, minor: u8) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    /// Configures the header's size maxima. Per `spec.md` §9's Open
    /// Question, a declared type string longer than
    /// [`DEFAULT_MAX_DECLARED_TYPE_LEN`] (or an explicit override via
    /// [`Self::set_max_declared_type_len`]) is rejected rather than
    /// silently truncated.
    pub fn set_header_sizes(&mut self, sizes: HeaderSizes) {
        self.header_sizes = sizes;
    }

    pub fn set_max_declared_type_len(&mut self, max: usize) {
        self.max_declared_type_len = max;
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_write(&self) -> bool {
        self.direction == Direction::Write
    }

    pub fn is_read(&self) -> bool {
        self.direction == Direction::Read
    }

    pub fn is_calc_size(&self) -> bool {
        self.is_calc_size
    }

    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }

    pub fn error_occurred(&self) -> bool {
        self.error.is_some()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    fn header_target(&mut self) -> &mut dyn IOChannel {
        match (&mut self.header_channel, self.stream_mode) {
            (Some(ch), StreamMode::HeaderSeparate) => &mut **ch,
            _ => &mut *self.channel,
        }
    }

    fn fail<T>(&mut self, e: SerializeError) -> SerializeResult<T> {
        tracing::warn!(error = %e, "serialize error (sticky until cleared)");
        self.error = Some(e.clone());
        Err(e)
    }

    fn short_circuit_if_errored(&self) -> SerializeResult<()> {
        if self.direction == Direction::Read {
            if let Some(e) = &self.error {
                return Err(e.clone());
            }
        }
        Ok(())
    }

    /// Opens a named aggregate, per `spec.md` §4.3. At the top level of a
    /// header-bearing stream, this is also where the header record is
    /// written (or read and validated).
    pub fn begin_type(&mut self, name: &str, declared_type: &str) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        if declared_type.len() > self.max_declared_type_len {
            return self.fail(SerializeError::DeclaredTypeTooLong {
                max: self.max_declared_type_len,
            });
        }

        if self.depth == 0 && self.stream_mode != StreamMode::Normal && !self.header_written {
            let format_name = self.format.name().to_string();
            let (major, minor) = (self.major, self.minor);
            let sizes = self.header_sizes.clone();
            let max_len = self.max_declared_type_len;
            match self.direction {
                Direction::Write => {
                    let header = Header {
                        format_name,
                        major,
                        minor,
                        sizes,
                        top_type_name: declared_type.to_string(),
                    };
                    let target = self.header_target();
                    if let Err(e) = header.write(target, max_len) {
                        return self.fail(e);
                    }
                }
                Direction::Read => {
                    let expected_format = format_name;
                    let target = self.header_target();
                    match Header::read(target, &expected_format, major, max_len) {
                        Ok(h) => self.header_sizes = h.sizes,
                        Err(e) => return self.fail(e),
                    }
                }
            }
            self.header_written = true;
        }

        self.type_stack.push((name.to_string(), declared_type.to_string()));
        self.depth += 1;

        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.begin_type(&mut counting, name, declared_type),
            Direction::Read => self.format.read_begin_type(&mut counting, name),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            return self.fail(e);
        }
        Ok(())
    }

    pub fn end_type(&mut self, name: &str) -> SerializeResult<()> {
        match self.type_stack.pop() {
            Some((expected, _)) if expected == name => {}
            Some((expected, _)) => {
                return self.fail(SerializeError::NameMismatchOnEnd {
                    expected,
                    got: name.to_string(),
                });
            }
            None => {
                return self.fail(SerializeError::NameMismatchOnEnd {
                    expected: String::new(),
                    got: name.to_string(),
                });
            }
        }
        self.depth -= 1;

        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.end_type(&mut counting, name),
            Direction::Read => self.format.read_end_type(&mut counting, name),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            return self.fail(e);
        }
        Ok(())
    }

    pub fn begin_base_type(&mut self, name: &str, kind: PrimitiveKind) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        if self.in_base_type {
            return self.fail(SerializeError::NestedBaseType);
        }
        self.in_base_type = true;

        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.begin_base_type(&mut counting, name, kind),
            Direction::Read => self.format.read_begin_base_type(&mut counting, name, kind),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            self.in_base_type = false;
            return self.fail(e);
        }
        Ok(())
    }

    pub fn end_base_type(&mut self) -> SerializeResult<()> {
        self.in_base_type = false;
        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.end_base_type(&mut counting),
            Direction::Read => self.format.read_end_base_type(&mut counting),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            return self.fail(e);
        }
        Ok(())
    }

    fn leaf(&mut self, name: &str, kind: PrimitiveKind, value: &mut Primitive, max_string_len: usize) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        self.begin_base_type(name, kind)?;

        let mut counting = CountingChannel::new(self.channel);
        let outcome = match self.direction {
            Direction::Write => self.format.write_primitive(&mut counting, name, value).map(|_| None),
            Direction::Read => self
                .format
                .read_primitive(&mut counting, name, kind, max_string_len)
                .map(Some),
        };
        self.byte_count += counting.count;
        match outcome {
            Ok(Some(read_value)) => *value = read_value,
            Ok(None) => {}
            Err(e) => return self.fail(e),
        }
        self.end_base_type()?;
        Ok(())
    }

    fn array(
        &mut self,
        name: &str,
        kind: PrimitiveKind,
        values: &mut Vec<Primitive>,
        max_string_len: usize,
    ) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        let len = values.len();
        let mut counting = CountingChannel::new(self.channel);
        let outcome = match self.direction {
            Direction::Write => self.format.write_array(&mut counting, name, values).map(|_| None),
            Direction::Read => self
                .format
                .read_array(&mut counting, name, kind, len, max_string_len)
                .map(Some),
        };
        self.byte_count += counting.count;
        match outcome {
            Ok(Some(read_values)) => *values = read_values,
            Ok(None) => {}
            Err(e) => return self.fail(e),
        }
        Ok(())
    }

    /// Opens a heterogeneous struct array; returns the element count to
    /// iterate over (on read, this is whatever the format reports — see
    /// `MatlabFormat`'s documented limitation that it cannot report one).
    pub fn begin_struct_array(&mut self, name: &str, element_type: &str, len: u32) -> SerializeResult<u32> {
        self.short_circuit_if_errored()?;
        let mut counting = CountingChannel::new(self.channel);
        let outcome = match self.direction {
            Direction::Write => self
                .format
                .begin_struct_array(&mut counting, name, element_type, len)
                .map(|_| len),
            Direction::Read => self.format.read_begin_struct_array(&mut counting, name),
        };
        self.byte_count += counting.count;
        match outcome {
            Ok(n) => Ok(n),
            Err(e) => self.fail(e),
        }
    }

    pub fn begin_struct_array_separator(&mut self, name: &str, index: u32, len: u32) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.begin_struct_array_separator(&mut counting, name, index, len),
            Direction::Read => self.format.read_begin_struct_array_separator(&mut counting, name, index, len),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            return self.fail(e);
        }
        Ok(())
    }

    pub fn end_struct_array_separator(&mut self, name: &str, index: u32, len: u32) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.end_struct_array_separator(&mut counting, name, index, len),
            Direction::Read => self.format.read_end_struct_array_separator(&mut counting, name, index, len),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            return self.fail(e);
        }
        Ok(())
    }

    pub fn end_struct_array(&mut self, name: &str) -> SerializeResult<()> {
        self.short_circuit_if_errored()?;
        let mut counting = CountingChannel::new(self.channel);
        let result = match self.direction {
            Direction::Write => self.format.end_struct_array(&mut counting, name),
            Direction::Read => self.format.read_end_struct_array(&mut counting, name),
        };
        self.byte_count += counting.count;
        if let Err(e) = result {
            return self.fail(e);
        }
        Ok(())
    }
}

macro_rules! leaf_method {
    ($fn_name:ident, $kind:ident, $prim:ident, $t:ty) => {
        /// One entry in the "one function per primitive kind" contract of
        /// `spec.md` §4.3.
        pub fn $fn_name(&mut self, name: &str, value: &mut $t) -> SerializeResult<()> {
            let mut boxed = Primitive::$prim(*value);
            self.leaf(name, PrimitiveKind::$kind, &mut boxed, 0)?;
            if let Primitive::$prim(v) = boxed {
                *value = v;
            }
            Ok(())
        }
    };
}

macro_rules! array_method {
    ($fn_name:ident, $kind:ident, $prim:ident, $t:ty) => {
        pub fn $fn_name(&mut self, name: &str, values: &mut Vec<$t>) -> SerializeResult<()> {
            let mut boxed: Vec<Primitive> = values.iter().map(|v| Primitive::$prim(*v)).collect();
            self.array(name, PrimitiveKind::$kind, &mut boxed, 0)?;
            *values = boxed
                .into_iter()
                .map(|p| match p {
                    Primitive::$prim(v) => v,
                    _ => unreachable!("format plugin returned the wrong primitive kind"),
                })
                .collect();
            Ok(())
        }
    };
}

impl<'a> Serialize<'a> {
    leaf_method!(char_value, Char, Char, u8);
    leaf_method!(s_char, SChar, SChar, i8);
    leaf_method!(u_char, UChar, UChar, u8);
    leaf_method!(s_int, SInt, SInt, i16);
    leaf_method!(u_s_int, USInt, USInt, u16);
    leaf_method!(int, Int, Int, i32);
    leaf_method!(uint, UInt, UInt, u32);
    leaf_method!(l_int, LInt, LInt, i64);
    leaf_method!(ul_int, ULInt, ULInt, u64);
    leaf_method!(ll, LL, LL, i64);
    leaf_method!(ull, ULL, ULL, u64);
    leaf_method!(float, Float, Float, f32);
    leaf_method!(double, Double, Double, f64);
    /// `LDouble` is aliased to `f64` (`SPEC_FULL.md` §4.3 carries forward
    /// the source's own "not really working!!!" caveat about this kind's
    /// portability rather than silently dropping it).
    leaf_method!(l_double, LDouble, LDouble, f64);

    pub fn string(&mut self, name: &str, value: &mut String, max_len: usize) -> SerializeResult<()> {
        let mut boxed = Primitive::String(std::mem::take(value));
        self.leaf(name, PrimitiveKind::String, &mut boxed, max_len)?;
        if let Primitive::String(s) = boxed {
            *value = s;
        }
        Ok(())
    }

    array_method!(char_array, Char, Char, u8);
    array_method!(s_char_array, SChar, SChar, i8);
    array_method!(u_char_array, UChar, UChar, u8);
    array_method!(s_int_array, SInt, SInt, i16);
    array_method!(u_s_int_array, USInt, USInt, u16);
    array_method!(int_array, Int, Int, i32);
    array_method!(uint_array, UInt, UInt, u32);
    array_method!(l_int_array, LInt, LInt, i64);
    array_method!(ul_int_array, ULInt, ULInt, u64);
    array_method!(ll_array, LL, LL, i64);
    array_method!(ull_array, ULL, ULL, u64);
    array_method!(float_array, Float, Float, f32);
    array_method!(double_array, Double, Double, f64);
    array_method!(l_double_array, LDouble, LDouble, f64);

    pub fn string_array(&mut self, name: &str, values: &mut Vec<String>, max_len: usize) -> SerializeResult<()> {
        let mut boxed: Vec<Primitive> = values.drain(..).map(Primitive::String).collect();
        self.array(name, PrimitiveKind::String, &mut boxed, max_len)?;
        *values = boxed
            .into_iter()
            .map(|p| match p {
                Primitive::String(s) => s,
                _ => unreachable!("format plugin returned the wrong primitive kind"),
            })
            .collect();
        Ok(())
    }
}

/// Looks up a format plugin by the name it advertises in the format
/// registry (`spec.md` §6): `Ascii`, `Binary`, `Xml`, `Matlab`, `Json`.
pub fn format_by_name(name: &str) -> Option<Box<dyn Format>> {
    match name {
        "Ascii" => Some(Box::new(format::ascii::AsciiFormat::new())),
        "Binary" => Some(Box::new(format::binary::BinaryFormat::new())),
        "Xml" => Some(Box::new(format::xml::XmlFormat::new())),
        "Matlab" => Some(Box::new(format::matlab::MatlabFormat::new())),
        "Json" => Some(Box::new(format::json::JsonFormat::new())),
        _ => None,
    }
}

/// Measures the serialized size of `value` by driving it through a
/// [`CalcChannel`] (`spec.md` §4.3's calc-size mode) — the mechanism
/// [`crate::pqueue::PQueue::setup_element`] uses to learn a type's
/// maximum slot size.
pub fn calc_size_of<T: Serializable>(value: &mut T, name: &str) -> SerializeResult<u64> {
    let mut channel = CalcChannel::new();
    let mut s = Serialize::new(&mut channel, Box::new(format::binary::BinaryFormat::new()), Direction::Write);
    s.is_calc_size = true;
    value.serialize(name, &mut s)?;
    Ok(channel.stats().total_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::backends::mem::MemBufferChannel;

    struct Point {
        x: i32,
        y: i32,
    }

    impl Serializable for Point {
        fn serialize(&mut self, name: &str, s: &mut Serialize<'_>) -> SerializeResult<()> {
            s.begin_type(name, "Point")?;
            s.int("x", &mut self.x)?;
            s.int("y", &mut self.y)?;
            s.end_type(name)
        }
    }

    #[test]
    fn begin_end_type_balanced_round_trip() {
        let mut point = Point { x: 5, y: -3 };
        let mut channel = MemBufferChannel::new(AccessMode::READ_WRITE);
        {
            let mut s = Serialize::new(&mut channel, Box::new(format::binary::BinaryFormat::new()), Direction::Write);
            point.serialize("p", &mut s).unwrap();
            assert_eq!(s.depth(), 0);
        }
        let bytes = channel.into_inner();

        let mut roundtripped = Point { x: 0, y: 0 };
        let mut reader = MemBufferChannel::from_bytes(bytes, AccessMode::READ);
        let mut s = Serialize::new(&mut reader, Box::new(format::binary::BinaryFormat::new()), Direction::Read);
        roundtripped.serialize("p", &mut s).unwrap();
        assert_eq!(roundtripped.x, 5);
        assert_eq!(roundtripped.y, -3);
    }

    #[test]
    fn end_type_name_mismatch_is_sticky() {
        let mut channel = MemBufferChannel::new(AccessMode::WRITE);
        let mut s = Serialize::new(&mut channel, Box::new(format::binary::BinaryFormat::new()), Direction::Write);
        s.begin_type("p", "Point").unwrap();
        let err = s.end_type("not-p").unwrap_err();
        assert!(matches!(err, SerializeError::NameMismatchOnEnd { .. }));
        assert!(s.error_occurred());
    }

    #[test]
    fn read_short_circuits_after_header_mismatch() {
        let mut channel = MemBufferChannel::new(AccessMode::READ_WRITE);
        // Write with Ascii, then try to read back expecting Binary.
        {
            let mut s = Serialize::new(&mut channel, Box::new(format::ascii::AsciiFormat::new()), Direction::Write)
                .with_stream_mode(StreamMode::HeaderEmbedded);
            let mut x = 1i32;
            s.begin_type("t", "T").unwrap();
            s.int("x", &mut x).unwrap();
            s.end_type("t").unwrap();
        }
        let bytes = channel.into_inner();
        let mut reader = MemBufferChannel::from_bytes(bytes, AccessMode::READ);
        let mut s = Serialize::new(&mut reader, Box::new(format::binary::BinaryFormat::new()), Direction::Read)
            .with_stream_mode(StreamMode::HeaderEmbedded);
        let err = s.begin_type("t", "T").unwrap_err();
        assert!(matches!(err, SerializeError::FormatMismatch { .. }));
        assert!(s.error_occurred());

        // Further reads short-circuit without touching the channel.
        let err2 = s.begin_type("t2", "T").unwrap_err();
        assert!(matches!(err2, SerializeError::FormatMismatch { .. }));
    }

    #[test]
    fn calc_size_matches_binary_byte_count() {
        let mut point = Point { x: 1, y: 2 };
        let calc_bytes = calc_size_of(&mut point, "p").unwrap();

        let mut channel = MemBufferChannel::new(AccessMode::WRITE);
        let mut s = Serialize::new(&mut channel, Box::new(format::binary::BinaryFormat::new()), Direction::Write);
        point.serialize("p", &mut s).unwrap();
        assert_eq!(s.byte_count(), calc_bytes);
    }
}
