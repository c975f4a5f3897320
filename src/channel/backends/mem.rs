//! In-memory byte-buffer back-end — the "memory buffer" transport named
//! alongside `MemMapFd` in `spec.md` §1. Unlike `MemMapFdChannel`, which
//! maps a caller-supplied descriptor, this back-end owns a plain `Vec<u8>`
//! it grows as it's written; `Serialize` drives it to deep-copy a value
//! into a [`crate::pqueue::PQueue`] slot (`spec.md` §2's data-flow note on
//! `PQueue_push`).

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, Whence,
};

pub struct MemBufferChannel {
    state: ChannelState,
    buffer: Vec<u8>,
    position: usize,
}

impl MemBufferChannel {
    pub fn new(mode: AccessMode) -> Self {
        MemBufferChannel {
            state: ChannelState::new(mode, Permissions::rw_user()),
            buffer: Vec::new(),
            position: 0,
        }
    }

    /// Wraps existing bytes for reading (or overwriting) from position 0.
    pub fn from_bytes(buffer: Vec<u8>, mode: AccessMode) -> Self {
        MemBufferChannel {
            state: ChannelState::new(mode, Permissions::rw_user()),
            buffer,
            position: 0,
        }
    }

    /// Consumes the channel, handing back the accumulated bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn open_payload(
        _payload: &str,
        mode: AccessMode,
        _permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        let mode = if mode.is_defined() { mode } else { AccessMode::READ_WRITE };
        Ok(Box::new(MemBufferChannel::new(mode)))
    }
}

impl IOChannel for MemBufferChannel {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        if self.position >= self.buffer.len() {
            self.state.set_eof();
            return Ok(0);
        }
        let available = &self.buffer[self.position..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.position += n;
        self.state.offset = self.position as u64;
        if n < buf.len() {
            tracing::warn!(requested = buf.len(), got = n, "short read from memory buffer");
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        if self.position > self.buffer.len() {
            self.buffer.resize(self.position, 0);
        }
        let end = self.position + buf.len();
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.position..end].copy_from_slice(buf);
        self.position = end;
        self.state.offset = self.position as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        Ok(0)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> ChannelResult<u64> {
        let base = match whence {
            Whence::Start => 0i64,
            Whence::Current => self.position as i64,
            Whence::End => self.buffer.len() as i64,
        };
        let target = base + offset;
        if target < 0 {
            return Err(ChannelError::BadOpenArg("negative seek position".into()));
        }
        self.position = target as usize;
        self.state.offset = self.position as u64;
        Ok(self.state.offset)
    }

    fn close(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    fn error(&self) -> Option<ChannelError> {
        self.state.error()
    }

    fn clear_error(&mut self) {
        self.state.clear_error();
    }

    fn is_eof(&self) -> bool {
        self.state.is_eof()
    }

    fn mode(&self) -> AccessMode {
        self.state.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_back_roundtrips() {
        let mut channel = MemBufferChannel::new(AccessMode::READ_WRITE);
        channel.write(b"hello").unwrap();
        let bytes = channel.into_inner();
        assert_eq!(bytes, b"hello");

        let mut reader = MemBufferChannel::from_bytes(bytes, AccessMode::READ);
        let mut buf = [0u8; 5];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert!(reader.is_eof());
    }

    #[test]
    fn seek_then_overwrite_in_place() {
        let mut channel = MemBufferChannel::new(AccessMode::READ_WRITE);
        channel.write(b"aaaa").unwrap();
        channel.seek(1, Whence::Start).unwrap();
        channel.write(b"bb").unwrap();
        assert_eq!(channel.as_slice(), b"abba");
    }
}
