//! Descriptor-based file back-end: honors `create`/`truncate`/`append`,
//! aligns the channel's logical offset to the descriptor's current offset
//! on open. Grounded on `original_source/IOChannelFile.c` +
//! `IOChannelGenericFd.h`.

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, PropertyValue, Whence,
};

pub struct FileChannel {
    state: ChannelState,
    file: std::fs::File,
}

impl FileChannel {
    pub fn open_payload(
        payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        if payload.is_empty() {
            tracing::error!("File stream needs a file name");
            return Err(ChannelError::BadInfoString("empty file name".into()));
        }

        let mode = if mode.is_defined() { mode } else { AccessMode::READ };

        let mut options = OpenOptions::new();
        options
            .read(mode.contains(AccessMode::READ))
            .write(mode.contains(AccessMode::WRITE))
            .create(mode.contains(AccessMode::CREATE))
            .truncate(mode.contains(AccessMode::TRUNCATE))
            .append(mode.contains(AccessMode::APPEND));

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(permissions.as_mode_bits());
        }

        let mut file = options.open(payload).map_err(ChannelError::from)?;
        let offset = file.stream_position().unwrap_or(0);

        let mut state = ChannelState::new(mode, permissions);
        state.offset = offset;
        state.enable_write_buffering();

        Ok(Box::new(FileChannel { state, file }))
    }
}

impl IOChannel for FileChannel {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        let n = self.file.read(buf).map_err(ChannelError::from)?;
        if n == 0 && !buf.is_empty() {
            self.state.set_eof();
        } else if n < buf.len() {
            tracing::warn!(requested = buf.len(), got = n, "short read");
        }
        self.state.offset += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        if self.state.uses_write_buffering() {
            Ok(self.state.add_to_write_buffer(buf))
        } else {
            let n = self.file.write(buf).map_err(ChannelError::from)?;
            if n < buf.len() {
                return Err(ChannelError::ShortWrite {
                    wrote: n,
                    requested: buf.len(),
                });
            }
            self.state.offset += n as u64;
            Ok(n)
        }
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        let pending = self.state.take_write_buffer();
        if pending.is_empty() {
            return Ok(0);
        }
        let n = self.file.write(&pending).map_err(ChannelError::from)?;
        if n < pending.len() {
            return Err(ChannelError::ShortWrite {
                wrote: n,
                requested: pending.len(),
            });
        }
        self.file.flush().map_err(ChannelError::from)?;
        self.state.offset += n as u64;
        Ok(n)
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> ChannelResult<u64> {
        let pos = match whence {
            Whence::Start => SeekFrom::Start(offset.max(0) as u64),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let new_offset = self.file.seek(pos).map_err(ChannelError::from)?;
        self.state.offset = new_offset;
        Ok(new_offset)
    }

    fn close(&mut self) -> ChannelResult<()> {
        self.flush().ok();
        // `std::fs::File` has no explicit detach; `NOTCLOSE` is honored by
        // simply not calling any close syscall here — dropping the
        // `FileChannel` without a prior `close()` still releases the fd
        // via Rust's own `Drop`, same as the source treating close-on-drop
        // suppression as "don't touch the fd, let the owner manage it".
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            #[cfg(unix)]
            "Fd" => {
                use std::os::unix::io::AsRawFd;
                Some(PropertyValue::Fd(self.file.as_raw_fd()))
            }
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
