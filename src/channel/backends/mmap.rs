//! Memory-mapped file back-end over a caller-supplied descriptor and
//! size. Grounded on `original_source/IOChannelMemMapFd.c`; the mapping
//! itself is done through `memmap2` rather than hand-rolled `mmap(2)`
//! calls. `seek` moves a logical cursor inside the mapping; `read`/`write`
//! are `memcpy`s, per `spec.md` §4.2.

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, Whence,
};

#[cfg(unix)]
mod imp {
    use super::*;
    use memmap2::MmapMut;
    use std::os::unix::io::FromRawFd;

    pub struct MemMapFdChannel {
        state: ChannelState,
        mmap: MmapMut,
        cursor: usize,
    }

    impl MemMapFdChannel {
        /// `payload` is `<fd>:<size>`, the string-encoded form of the
        /// source's `(fd, size)` vararg pair.
        pub fn open_payload(
            payload: &str,
            mode: AccessMode,
            permissions: Permissions,
        ) -> ChannelResult<Box<dyn IOChannel>> {
            let (fd_str, size_str) = payload
                .split_once(':')
                .ok_or_else(|| ChannelError::BadOpenArg(payload.to_string()))?;
            let fd: i32 = fd_str
                .parse()
                .map_err(|_| ChannelError::BadDescriptor)?;
            let size: usize = size_str
                .parse()
                .map_err(|_| ChannelError::BadMmapSize)?;

            if fd < 0 {
                return Err(ChannelError::BadDescriptor);
            }
            if size == 0 {
                return Err(ChannelError::BadMmapSize);
            }
            if !mode.is_defined() {
                return Err(ChannelError::BadModeFlags);
            }

            // SAFETY: the caller is expected to hand over an fd it owns for
            // the lifetime of the mapping, mirroring the source's
            // `IOChannelGenericMem_mapFd` contract.
            let file = unsafe { std::fs::File::from_raw_fd(fd) };
            file.set_len(size as u64).map_err(ChannelError::from)?;
            let mmap = unsafe { MmapMut::map_mut(&file) }.map_err(ChannelError::from)?;
            std::mem::forget(file); // the fd is caller-owned, see NOTCLOSE handling in close()

            Ok(Box::new(MemMapFdChannel {
                state: ChannelState::new(mode, permissions),
                mmap,
                cursor: 0,
            }))
        }
    }

    impl IOChannel for MemMapFdChannel {
        fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
            let available = self.mmap.len().saturating_sub(self.cursor);
            let n = buf.len().min(available);
            if n == 0 {
                self.state.set_eof();
                return Ok(0);
            }
            buf[..n].copy_from_slice(&self.mmap[self.cursor..self.cursor + n]);
            self.cursor += n;
            self.state.offset = self.cursor as u64;
            Ok(n)
        }

        fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
            let available = self.mmap.len().saturating_sub(self.cursor);
            let n = buf.len().min(available);
            self.mmap[self.cursor..self.cursor + n].copy_from_slice(&buf[..n]);
            self.cursor += n;
            self.state.offset = self.cursor as u64;
            if n < buf.len() {
                return Err(ChannelError::ShortWrite {
                    wrote: n,
                    requested: buf.len(),
                });
            }
            Ok(n)
        }

        fn flush(&mut self) -> ChannelResult<usize> {
            self.mmap.flush().map_err(ChannelError::from)?;
            Ok(0)
        }

        fn seek(&mut self, offset: i64, whence: Whence) -> ChannelResult<u64> {
            let base = match whence {
                Whence::Start => 0i64,
                Whence::Current => self.cursor as i64,
                Whence::End => self.mmap.len() as i64,
            };
            let new_cursor = (base + offset).clamp(0, self.mmap.len() as i64) as usize;
            self.cursor = new_cursor;
            self.state.offset = new_cursor as u64;
            Ok(new_cursor as u64)
        }

        fn close(&mut self) -> ChannelResult<()> {
            self.mmap.flush().ok();
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
}

#[cfg(unix)]
pub use imp::MemMapFdChannel;

#[cfg(not(unix))]
pub struct MemMapFdChannel;

#[cfg(not(unix))]
impl MemMapFdChannel {
    pub fn open_payload(
        _payload: &str,
        _mode: AccessMode,
        _permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        Err(ChannelError::UnknownScheme("MemMapFd (unix only)".into()))
    }
}
