//! Externally-owned file descriptor back-end. Grounded on
//! `original_source/IOChannelFd.c`: the descriptor is supplied by the
//! caller (`Fd://<integer>`) rather than opened by this channel, so
//! `close-on-drop` suppression (`NOTCLOSE`) means "detach, don't close
//! the fd".

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, PropertyValue, Whence,
};

#[cfg(unix)]
mod imp {
    use super::*;
    use std::fs::File;
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};

    pub struct FdChannel {
        state: ChannelState,
        file: Option<File>,
        raw_fd: i32,
    }

    impl FdChannel {
        pub fn open_payload(
            payload: &str,
            mode: AccessMode,
            permissions: Permissions,
        ) -> ChannelResult<Box<dyn IOChannel>> {
            if !mode.is_defined() {
                tracing::error!("IOChannelFd: access mode not specified");
                return Err(ChannelError::BadModeFlags);
            }
            if mode.contains(AccessMode::CREATE) || mode.contains(AccessMode::APPEND) {
                return Err(ChannelError::BadMode);
            }

            let raw_fd: i32 = payload
                .parse()
                .map_err(|_| ChannelError::BadOpenArg(payload.to_string()))?;
            if raw_fd < 0 {
                return Err(ChannelError::BadDescriptor);
            }

            // SAFETY: the caller asserts ownership transfer semantics are
            // governed by `mode`'s CLOSE/NOTCLOSE bit; we never call
            // `IntoRawFd` unless `close()` is invoked with CLOSE set.
            let file = unsafe { File::from_raw_fd(raw_fd) };

            let mut state = ChannelState::new(mode, permissions);
            state.enable_write_buffering();

            Ok(Box::new(FdChannel {
                state,
                file: Some(file),
                raw_fd,
            }))
        }
    }

    impl IOChannel for FdChannel {
        fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
            let file = self.file.as_mut().ok_or(ChannelError::BadDescriptor)?;
            let n = file.read(buf).map_err(ChannelError::from)?;
            if n == 0 && !buf.is_empty() {
                self.state.set_eof();
            }
            self.state.offset += n as u64;
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
            if self.state.uses_write_buffering() {
                return Ok(self.state.add_to_write_buffer(buf));
            }
            let file = self.file.as_mut().ok_or(ChannelError::BadDescriptor)?;
            let n = file.write(buf).map_err(ChannelError::from)?;
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
            let pending = self.state.take_write_buffer();
            if pending.is_empty() {
                return Ok(0);
            }
            let file = self.file.as_mut().ok_or(ChannelError::BadDescriptor)?;
            let n = file.write(&pending).map_err(ChannelError::from)?;
            if n < pending.len() {
                return Err(ChannelError::ShortWrite {
                    wrote: n,
                    requested: pending.len(),
                });
            }
            file.flush().map_err(ChannelError::from)?;
            self.state.offset += n as u64;
            Ok(n)
        }

        fn seek(&mut self, offset: i64, whence: Whence) -> ChannelResult<u64> {
            let file = self.file.as_mut().ok_or(ChannelError::BadDescriptor)?;
            let pos = match whence {
                Whence::Start => SeekFrom::Start(offset.max(0) as u64),
                Whence::Current => SeekFrom::Current(offset),
                Whence::End => SeekFrom::End(offset),
            };
            let new_offset = file.seek(pos).map_err(ChannelError::from)?;
            self.state.offset = new_offset;
            Ok(new_offset)
        }

        fn close(&mut self) -> ChannelResult<()> {
            if let Some(file) = self.file.take() {
                if self.state.mode.contains(AccessMode::CLOSE) && !self.state.mode.is_not_close() {
                    drop(file); // closes the fd
                } else {
                    // Detach without closing: leak the raw fd back to its owner.
                    let _ = file.into_raw_fd();
                }
            }
            Ok(())
        }

        fn get_property(&self, name: &str) -> Option<PropertyValue> {
            match name {
                "Fd" => Some(PropertyValue::Fd(self.raw_fd)),
                _ => None,
            }
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

    #[allow(dead_code)]
    fn _assert_raw_fd(f: &std::fs::File) -> i32 {
        f.as_raw_fd()
    }
}

#[cfg(unix)]
pub use imp::FdChannel;

#[cfg(not(unix))]
pub struct FdChannel;

#[cfg(not(unix))]
impl FdChannel {
    pub fn open_payload(
        _payload: &str,
        _mode: AccessMode,
        _permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        Err(ChannelError::UnknownScheme("Fd (unix only)".into()))
    }
}
