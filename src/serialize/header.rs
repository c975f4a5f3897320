//! The self-describing header record written at the top-level `beginType`
//! when a `Serialize` session runs in header-embedded mode. Wire layout
//! per `spec.md` §6, all integers network byte order:
//!
//! ```text
//! <magic: 4 bytes> <formatName: zero-terminated> <major:u8> <minor:u8>
//! <typeBytes:u32> <dataBytes:u32> <objBytes:u32> <streamBytes:u32>
//! <topTypeName: zero-terminated>
//! ```

use crate::channel::IOChannel;

use super::error::{SerializeError, SerializeResult};

pub const MAGIC: [u8; 4] = *b"SRLZ";

/// Default cap on a declared type string, per `spec.md` §9's guidance to
/// "choose a sane maximum at the interface boundary rather than silently
/// truncating" (the source's test data includes a 5 000-byte mangled
/// Boost-accumulator type name, so the default leaves ample headroom).
pub const DEFAULT_MAX_DECLARED_TYPE_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSizes {
    pub type_bytes: u32,
    pub data_bytes: u32,
    pub object_bytes: u32,
    pub stream_bytes: u32,
}

impl Default for HeaderSizes {
    fn default() -> Self {
        HeaderSizes {
            type_bytes: 0,
            data_bytes: 0,
            object_bytes: 0,
            stream_bytes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub format_name: String,
    pub major: u8,
    pub minor: u8,
    pub sizes: HeaderSizes,
    pub top_type_name: String,
}

fn write_u32(channel: &mut dyn IOChannel, value: u32) -> SerializeResult<()> {
    channel.write(&value.to_be_bytes())?;
    Ok(())
}

fn read_u32(channel: &mut dyn IOChannel) -> SerializeResult<u32> {
    let mut buf = [0u8; 4];
    read_exact(channel, &mut buf, "u32 field")?;
    Ok(u32::from_be_bytes(buf))
}

fn write_cstring(channel: &mut dyn IOChannel, s: &str) -> SerializeResult<()> {
    channel.write(s.as_bytes())?;
    channel.write(&[0u8])?;
    Ok(())
}

fn read_cstring(channel: &mut dyn IOChannel, max_len: usize) -> SerializeResult<String> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = channel.read(&mut byte)?;
        if n == 0 {
            return Err(SerializeError::TruncatedStream("header string".into()));
        }
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
        if bytes.len() > max_len {
            return Err(SerializeError::DeclaredTypeTooLong { max: max_len });
        }
    }
    String::from_utf8(bytes).map_err(|_| SerializeError::TruncatedStream("header string".into()))
}

fn read_exact(channel: &mut dyn IOChannel, buf: &mut [u8], what: &str) -> SerializeResult<()> {
    let mut read = 0;
    while read < buf.len() {
        let n = channel.read(&mut buf[read..])?;
        if n == 0 {
            return Err(SerializeError::TruncatedStream(what.to_string()));
        }
        read += n;
    }
    Ok(())
}

impl Header {
    pub fn write(&self, channel: &mut dyn IOChannel, max_declared_type_len: usize) -> SerializeResult<()> {
        if self.top_type_name.len() > max_declared_type_len {
            return Err(SerializeError::DeclaredTypeTooLong {
                max: max_declared_type_len,
            });
        }
        channel.write(&MAGIC)?;
        write_cstring(channel, &self.format_name)?;
        channel.write(&[self.major, self.minor])?;
        write_u32(channel, self.sizes.type_bytes)?;
        write_u32(channel, self.sizes.data_bytes)?;
        write_u32(channel, self.sizes.object_bytes)?;
        write_u32(channel, self.sizes.stream_bytes)?;
        write_cstring(channel, &self.top_type_name)?;
        Ok(())
    }

    pub fn read(
        channel: &mut dyn IOChannel,
        expected_format: &str,
        expected_major: u8,
        max_declared_type_len: usize,
    ) -> SerializeResult<Header> {
        let mut magic = [0u8; 4];
        read_exact(channel, &mut magic, "header magic")?;
        if magic != MAGIC {
            return Err(SerializeError::HeaderMagicMismatch);
        }

        let format_name = read_cstring(channel, 256)?;
        if format_name != expected_format {
            return Err(SerializeError::FormatMismatch {
                expected: expected_format.to_string(),
                got: format_name,
            });
        }

        let mut version = [0u8; 2];
        read_exact(channel, &mut version, "header version")?;
        let (major, minor) = (version[0], version[1]);
        if major != expected_major {
            return Err(SerializeError::VersionMismatch {
                expected_major,
                expected_minor: 0,
                got_major: major,
                got_minor: minor,
            });
        }

        let sizes = HeaderSizes {
            type_bytes: read_u32(channel)?,
            data_bytes: read_u32(channel)?,
            object_bytes: read_u32(channel)?,
            stream_bytes: read_u32(channel)?,
        };

        let top_type_name = read_cstring(channel, max_declared_type_len)?;

        Ok(Header {
            format_name,
            major,
            minor,
            sizes,
            top_type_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::backends::calc::CalcChannel;
    use crate::channel::{AccessMode, Permissions};

    #[test]
    fn declared_type_over_max_is_rejected_before_writing() {
        let header = Header {
            format_name: "Binary".into(),
            major: 1,
            minor: 0,
            sizes: HeaderSizes::default(),
            top_type_name: "x".repeat(10),
        };
        let mut channel =
            CalcChannel::open_payload("", AccessMode::WRITE, Permissions::rw_user()).unwrap();
        assert!(header.write(channel.as_mut(), 5).is_err());
    }
}
