//! Bit-sink back-end: reads return EOF, writes report success without
//! storing anything, seeks are no-ops. Grounded on
//! `original_source/IOChannelNull.c`.

use crate::channel::{AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, Whence};

pub struct NullChannel {
    state: ChannelState,
}

impl NullChannel {
    pub fn open_payload(
        _payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        let mode = if mode.is_defined() { mode } else { AccessMode::READ_WRITE };
        Ok(Box::new(NullChannel {
            state: ChannelState::new(mode, permissions),
        }))
    }
}

impl IOChannel for NullChannel {
    fn read(&mut self, _buf: &mut [u8]) -> ChannelResult<usize> {
        self.state.set_eof();
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> ChannelResult<u64> {
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
    fn reads_return_zero_writes_return_size() {
        let mut channel = NullChannel::open_payload("", AccessMode::READ_WRITE, Permissions::rw_user()).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(channel.read(&mut buf).unwrap(), 0);
        assert!(channel.is_eof());
        assert_eq!(channel.write(b"abcd").unwrap(), 4);
        assert_eq!(channel.seek(5, Whence::Start).unwrap(), 0);
    }
}
