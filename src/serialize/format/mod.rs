//! Format plugins: each turns `Serialize`'s traversal events into bytes on
//! an `IOChannel`, or the inverse. Grounded on `spec.md` §4.3/§6; the
//! endian helpers mirror `original_source/BerkeleySocketByteOrder.c`
//! (`BerkeleySocket_ntohI64`/`ntohF64`), generalized to every integer
//! width `Binary` needs instead of just the two the source's sockets used.

pub mod ascii;
pub mod binary;
pub mod json;
pub mod matlab;
pub mod xml;

use crate::channel::IOChannel;

use super::error::SerializeResult;
use super::primitive::{Primitive, PrimitiveKind};

/// The traversal-event contract every wire format implements, per
/// `spec.md` §4.3. `Serialize` drives these; formats never touch the
/// channel outside of them.
pub trait Format: Send {
    fn name(&self) -> &'static str;

    /// Configures a format-specific option, e.g. `Ascii`'s
    /// `WITH_TYPE=TRUE` (`spec.md` §4.3/§6).
    fn set_option(&mut self, key: &str, value: &str) {
        let _ = (key, value);
    }

    /// Emits the opening of an aggregate. Only called while writing.
    fn begin_type(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        declared_type: &str,
    ) -> SerializeResult<()>;

    fn end_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()>;

    /// Consumes and validates the opening of an aggregate. Only called
    /// while reading; formats with no structural framing (`Binary`) have
    /// nothing to consume and just mirror the write-side no-op.
    fn read_begin_type(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
    ) -> SerializeResult<()>;

    fn read_end_type(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()>;

    fn begin_base_type(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
    ) -> SerializeResult<()>;

    fn end_base_type(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<()>;

    fn read_begin_base_type(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
    ) -> SerializeResult<()>;

    fn read_end_base_type(&mut self, channel: &mut dyn IOChannel) -> SerializeResult<()>;

    fn write_primitive(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        value: &Primitive,
    ) -> SerializeResult<()>;

    fn read_primitive(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
        max_string_len: usize,
    ) -> SerializeResult<Primitive>;

    fn write_array(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        values: &[Primitive],
    ) -> SerializeResult<()>;

    fn read_array(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        kind: PrimitiveKind,
        len: usize,
        max_string_len: usize,
    ) -> SerializeResult<Vec<Primitive>>;

    fn begin_struct_array(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        element_type: &str,
        len: u32,
    ) -> SerializeResult<()>;

    fn begin_struct_array_separator(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        index: u32,
        len: u32,
    ) -> SerializeResult<()>;

    fn end_struct_array_separator(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        index: u32,
        len: u32,
    ) -> SerializeResult<()>;

    fn end_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()>;

    /// Consumes the struct-array framing and returns the declared element
    /// count, which the caller cross-checks against what it expected.
    fn read_begin_struct_array(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
    ) -> SerializeResult<u32>;

    fn read_begin_struct_array_separator(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        index: u32,
        len: u32,
    ) -> SerializeResult<()>;

    fn read_end_struct_array_separator(
        &mut self,
        channel: &mut dyn IOChannel,
        name: &str,
        index: u32,
        len: u32,
    ) -> SerializeResult<()>;

    fn read_end_struct_array(&mut self, channel: &mut dyn IOChannel, name: &str) -> SerializeResult<()>;
}

/// Reads one byte at a time until (and excluding) the next `\n`, for the
/// line-oriented text formats (`Ascii`, `Matlab`). Not efficient, but the
/// channel abstraction gives no buffered-reader primitive of its own and
/// every back-end already short-read-tolerant per `spec.md` §4.2.
pub(crate) fn read_line(channel: &mut dyn IOChannel, max_len: usize) -> SerializeResult<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = channel.read(&mut byte)?;
        if n == 0 {
            if bytes.is_empty() {
                return Err(super::error::SerializeError::TruncatedStream("line".into()));
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        bytes.push(byte[0]);
        if bytes.len() > max_len {
            return Err(super::error::SerializeError::TruncatedStream(
                "line exceeded maximum length".into(),
            ));
        }
    }
    String::from_utf8(bytes).map_err(|_| super::error::SerializeError::TruncatedStream("line".into()))
}

pub(crate) fn write_line(channel: &mut dyn IOChannel, line: &str) -> SerializeResult<()> {
    channel.write(line.as_bytes())?;
    channel.write(b"\n")?;
    Ok(())
}
