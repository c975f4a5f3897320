//! Compact binary format: no field names or struct delimiters on the
//! wire, every integer and float in network byte order, strings as a
//! big-endian `u32` length prefix followed by the raw UTF-8 bytes.
//!
//! A `Serializable` impl drives reads and writes in the same field order
//! on both sides, so there is nothing to tag beyond the leaf encoding
//! itself — the same shape as most compact binary codecs (bincode,
//! protobuf's `packed` mode).

use crate::channel::IOChannel;

use crate::serialize::error::{SerializeError, SerializeResult};
use crate::serialize::primitive::{Primitive, PrimitiveKind};

use super::Format;

#[derive(Debug, Default)]
pub struct BinaryFormat;

impl BinaryFormat {
    pub fn new() -> Self {
        BinaryFormat
    }
}

fn read_exact(channel: &mut dyn IOChannel, buf: &mut [u8]) -> SerializeResult<()> {
    let mut read = 0;
    while read < buf.len() {
        let n = channel.read(&mut buf[read..])?;
        if n == 0 {
            return Err(SerializeError::TruncatedStream("binary field".into()));
        }
        read += n;
    }
    Ok(())
}

fn write_string(channel: &mut dyn IOChannel, s: &str, max_len: usize) -> SerializeResult<()> {
    if s.len() > max_len {
        return Err(SerializeError::DeclaredTypeTooLong { max: max_len });
    }
    channel.write(&(s.len() as u32).to_be_bytes())?;
    channel.write(s.as_bytes())?;
    Ok(())
}

fn read_string(channel: &mut dyn IOChannel, max_len: usize) -> SerializeResult<String> {
    let mut len_buf = [0u8; 4];
    read_exact(channel, &mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_len {
        return Err(SerializeError::DeclaredTypeTooLong { max: max_len });
    }
    let mut bytes = vec![0u8; len];
    read_exact(channel, &mut bytes)?;
    String::from_utf8(bytes).map_err(|_| SerializeError::TruncatedStream("string".into()))
}

fn write_one(channel: &mut dyn IOChannel, value: &Primitive, max_string_len: usize) -> SerializeResult<()> {
    match value {
        Primitive::Char(v) | Primitive::UChar(v) => {
            channel.write(&[*v])?;
        }
        Primitive::SChar(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::SInt(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::USInt(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::Int(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::UInt(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::LInt(v) | Primitive::LL(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::ULInt(v) | Primitive::ULL(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::Float(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::Double(v) | Primitive::LDouble(v) => {
            channel.write(&v.to_be_bytes())?;
        }
        Primitive::String(s) => {
            write_string(channel, s, max_string_len)?;
        }
    }
    Ok(())
}

fn read_one(channel: &mut dyn IOChannel, kind: PrimitiveKind, max_string_len: usize) -> SerializeResult<Primitive> {
    Ok(match kind {
        PrimitiveKind::Char => {
            let mut b = [0u8; 1];
            read_exact(channel, &mut b)?;
            Primitive::Char(b[0])
        }
        PrimitiveKind::UChar => {
            let mut b = [0u8; 1];
            read_exact(channel, &mut b)?;
            Primitive::UChar(b[0])
        }
        PrimitiveKind::SChar => {
            let mut b = [0u8; 1];
            read_exact(channel, &mut b)?;
            Primitive::SChar(b[0] as i8)
        }
        PrimitiveKind::SInt => {
            let mut b = [0u8; 2];
            read_exact(channel, &mut b)?;
            Primitive::SInt(i16::from_be_bytes(b))
        }
        PrimitiveKind::USInt => {
            let mut b = [0u8; 2];
            read_exact(channel, &mut b)?;
            Primitive::USInt(u16::from_be_bytes(b))
        }
        PrimitiveKind::Int => {
            let mut b = [0u8; 4];
            read_exact(channel, &mut b)?;
            Primitive::Int(i32::from_be_bytes(b))
        }
        PrimitiveKind::UInt => {
            let mut b = [0u8; 4];
            read_exact(channel, &mut b)?;
            Primitive::UInt(u32::from_be_bytes(b))
        }
        PrimitiveKind::LInt => {
            let mut b = [0u8; 8];
            read_exact(channel, &mut b)?;
            Primitive::LInt(i64::from_be_bytes(b))
        }
        PrimitiveKind::ULInt => {
            let mut b = [0u8; 8];
            read_exact(channel, &mut b)?;
            Primitive::ULInt(u64::from_be_bytes(b))
        }
        PrimitiveKind::LL => {
            let mut b = [0u8; 8];
            read_exact(channel, &mut b)?;
            Primitive::LL(i64::from_be_bytes(b))
        }
        PrimitiveKind::ULL => {
            let mut b = [0u8; 8];
            read_exact(channel, &mut b)?;
            Primitive::ULL(u64::from_be_bytes(b))
        }
        PrimitiveKind::Float => {
            let mut b = [0u8; 4];
            read_exact(channel, &mut b)?;
            Primitive::Float(f32::from_be_bytes(b))
        }
        PrimitiveKind::Double => {
            let mut b = [0u8; 8];
            read_exact(channel, &mut b)?;
            Primitive::Double(f64::from_be_bytes(b))
        }
        PrimitiveKind::LDouble => {
            let mut b = [0u8; 8];
            read_exact(channel, &mut b)?;
            Primitive::LDouble(f64::from_be_bytes(b))
        }
        PrimitiveKind::String => Primitive::String(read_string(channel, max_string_len)?),
    })
}

impl Format for BinaryFormat {
    fn name(&self) -> &'static str {
        "Binary"
    }

    fn begin_type(&mut self, _channel: &mut dyn IOChannel, _name: &str, _declared_type: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn end_type(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn read_begin_type(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn read_end_type(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn begin_base_type(&mut self, _channel: &mut dyn IOChannel, _name: &str, _kind: PrimitiveKind) -> SerializeResult<()> {
        Ok(())
    }

    fn end_base_type(&mut self, _channel: &mut dyn IOChannel) -> SerializeResult<()> {
        Ok(())
    }

    fn read_begin_base_type(&mut self, _channel: &mut dyn IOChannel, _name: &str, _kind: PrimitiveKind) -> SerializeResult<()> {
        Ok(())
    }

    fn read_end_base_type(&mut self, _channel: &mut dyn IOChannel) -> SerializeResult<()> {
        Ok(())
    }

    fn write_primitive(&mut self, channel: &mut dyn IOChannel, _name: &str, value: &Primitive) -> SerializeResult<()> {
        write_one(channel, value, usize::MAX)
    }

    fn read_primitive(
        &mut self,
        channel: &mut dyn IOChannel,
        _name: &str,
        kind: PrimitiveKind,
        max_string_len: usize,
    ) -> SerializeResult<Primitive> {
        read_one(channel, kind, max_string_len)
    }

    fn write_array(&mut self, channel: &mut dyn IOChannel, _name: &str, values: &[Primitive]) -> SerializeResult<()> {
        channel.write(&(values.len() as u32).to_be_bytes())?;
        for v in values {
            write_one(channel, v, usize::MAX)?;
        }
        Ok(())
    }

    fn read_array(
        &mut self,
        channel: &mut dyn IOChannel,
        _name: &str,
        kind: PrimitiveKind,
        len: usize,
        max_string_len: usize,
    ) -> SerializeResult<Vec<Primitive>> {
        let mut len_buf = [0u8; 4];
        read_exact(channel, &mut len_buf)?;
        let declared = u32::from_be_bytes(len_buf) as usize;
        if declared != len {
            return Err(SerializeError::UnexpectedPrimitive);
        }
        (0..len).map(|_| read_one(channel, kind, max_string_len)).collect()
    }

    fn begin_struct_array(&mut self, channel: &mut dyn IOChannel, _name: &str, _element_type: &str, len: u32) -> SerializeResult<()> {
        channel.write(&len.to_be_bytes())?;
        Ok(())
    }

    fn begin_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        Ok(())
    }

    fn end_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        Ok(())
    }

    fn end_struct_array(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }

    fn read_begin_struct_array(&mut self, channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<u32> {
        let mut buf = [0u8; 4];
        read_exact(channel, &mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn read_begin_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        Ok(())
    }

    fn read_end_struct_array_separator(&mut self, _channel: &mut dyn IOChannel, _name: &str, _index: u32, _len: u32) -> SerializeResult<()> {
        Ok(())
    }

    fn read_end_struct_array(&mut self, _channel: &mut dyn IOChannel, _name: &str) -> SerializeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::backends::file::FileChannel;
    use crate::channel::{AccessMode, Permissions};
    use tempfile::NamedTempFile;

    #[test]
    fn int_roundtrips_through_a_file_channel() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let mut fmt = BinaryFormat::new();
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.write_primitive(channel.as_mut(), "x", &Primitive::Int(-42)).unwrap();
            channel.flush().unwrap();
        }
        {
            let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
            let value = fmt
                .read_primitive(channel.as_mut(), "x", PrimitiveKind::Int, 0)
                .unwrap();
            assert_eq!(value, Primitive::Int(-42));
        }
    }

    #[test]
    fn string_with_length_prefix_roundtrips() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap().to_string();
        let mut fmt = BinaryFormat::new();
        {
            let mut channel = FileChannel::open_payload(
                &path,
                AccessMode::WRITE | AccessMode::CREATE | AccessMode::TRUNCATE,
                Permissions::rw_user(),
            )
            .unwrap();
            fmt.write_primitive(channel.as_mut(), "s", &Primitive::String("hello world".into()))
                .unwrap();
            channel.flush().unwrap();
        }
        {
            let mut channel = FileChannel::open_payload(&path, AccessMode::READ, Permissions::rw_user()).unwrap();
            let value = fmt
                .read_primitive(channel.as_mut(), "s", PrimitiveKind::String, 1024)
                .unwrap();
            assert_eq!(value, Primitive::String("hello world".into()));
        }
    }
}
