//! Standard-stream back-ends. Grounded on
//! `original_source/IOChannelStdIn.c`/`StdOut.c`/`StdErr.c`: mode defaults
//! to read-only for `StdIn`, write-only for `StdOut`/`StdErr`; all three
//! are non-seekable, matching `spec.md` §4.2 ("`StdErr` is non-seekable")
//! extended to `StdIn`/`StdOut` since none of the three are meaningfully
//! seekable when attached to a terminal, which is the common case.

use std::io::{Read, Write};

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, Whence,
};

pub struct StdInChannel {
    state: ChannelState,
}

impl StdInChannel {
    pub fn open_payload(
        _payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        let mode = if mode.is_defined() { mode } else { AccessMode::READ };
        Ok(Box::new(StdInChannel {
            state: ChannelState::new(mode, permissions),
        }))
    }
}

impl IOChannel for StdInChannel {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        let n = std::io::stdin().read(buf).map_err(ChannelError::from)?;
        if n == 0 && !buf.is_empty() {
            self.state.set_eof();
        }
        self.state.offset += n as u64;
        Ok(n)
    }

    fn write(&mut self, _buf: &[u8]) -> ChannelResult<usize> {
        Err(ChannelError::BadMode)
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> ChannelResult<u64> {
        Err(ChannelError::NotSeekable)
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

pub struct StdOutChannel {
    state: ChannelState,
}

impl StdOutChannel {
    pub fn open_payload(
        _payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        let mode = if mode.is_defined() { mode } else { AccessMode::WRITE };
        Ok(Box::new(StdOutChannel {
            state: ChannelState::new(mode, permissions),
        }))
    }
}

impl IOChannel for StdOutChannel {
    fn read(&mut self, _buf: &mut [u8]) -> ChannelResult<usize> {
        Err(ChannelError::BadMode)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        let n = std::io::stdout().write(buf).map_err(ChannelError::from)?;
        if n < buf.len() {
            return Err(ChannelError::ShortWrite {
                wrote: n,
                requested: buf.len(),
            });
        }
        self.state.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        std::io::stdout().flush().map_err(ChannelError::from)?;
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> ChannelResult<u64> {
        Err(ChannelError::NotSeekable)
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.flush().ok();
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

pub struct StdErrChannel {
    state: ChannelState,
}

impl StdErrChannel {
    pub fn open_payload(
        _payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        let mode = if mode.is_defined() { mode } else { AccessMode::WRITE };
        Ok(Box::new(StdErrChannel {
            state: ChannelState::new(mode, permissions),
        }))
    }
}

impl IOChannel for StdErrChannel {
    fn read(&mut self, _buf: &mut [u8]) -> ChannelResult<usize> {
        Err(ChannelError::BadMode)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        let n = std::io::stderr().write(buf).map_err(ChannelError::from)?;
        if n < buf.len() {
            return Err(ChannelError::ShortWrite {
                wrote: n,
                requested: buf.len(),
            });
        }
        self.state.offset += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        std::io::stderr().flush().map_err(ChannelError::from)?;
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> ChannelResult<u64> {
        Err(ChannelError::NotSeekable)
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
    fn defaults_match_scheme() {
        let stdin = StdInChannel::open_payload("", AccessMode::empty(), Permissions::rw_user()).unwrap();
        assert!(stdin.mode().is_read_only());

        let stdout = StdOutChannel::open_payload("", AccessMode::empty(), Permissions::rw_user()).unwrap();
        assert!(stdout.mode().is_write_only());

        let stderr = StdErrChannel::open_payload("", AccessMode::empty(), Permissions::rw_user()).unwrap();
        assert!(stderr.mode().is_write_only());
    }

    #[test]
    fn stderr_is_not_seekable() {
        let mut stderr =
            StdErrChannel::open_payload("", AccessMode::empty(), Permissions::rw_user()).unwrap();
        assert!(matches!(stderr.seek(0, Whence::Start), Err(ChannelError::NotSeekable)));
    }
}
