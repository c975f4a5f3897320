//! Statistics-only sink: writes are counted but discarded, which drives
//! `Serialize`'s calc-size mode (`spec.md` §4.3). Grounded on
//! `original_source/IOChannelCalc.c`.

use crate::channel::{AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, PropertyValue, Whence};

#[derive(Debug, Default, Clone, Copy)]
pub struct CalcStats {
    pub num_writes: u64,
    pub max_size: i64,
    pub min_size: i64,
    pub total_bytes: u64,
}

pub struct CalcChannel {
    state: ChannelState,
    stats: CalcStats,
}

impl CalcChannel {
    /// A concrete (unboxed) instance for callers that need to read
    /// [`CalcStats`] back out afterwards — `open_payload` returns a
    /// `Box<dyn IOChannel>` for the registry, which erases that.
    pub fn new() -> Self {
        CalcChannel {
            state: ChannelState::new(AccessMode::WRITE, Permissions::rw_user()),
            stats: CalcStats::default(),
        }
    }

    pub fn open_payload(
        _payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        if !mode.is_write_only() && mode.is_defined() {
            tracing::error!("IOChannelCalc accepts write-only mode only");
            return Err(ChannelError::BadModeFlags);
        }
        Ok(Box::new(CalcChannel {
            state: ChannelState::new(AccessMode::WRITE, permissions),
            stats: CalcStats::default(),
        }))
    }

    pub fn stats(&self) -> CalcStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.stats = CalcStats::default();
    }
}

impl IOChannel for CalcChannel {
    fn read(&mut self, _buf: &mut [u8]) -> ChannelResult<usize> {
        Err(ChannelError::BadMode)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        let size = buf.len() as i64;
        self.stats.num_writes += 1;
        self.stats.max_size = self.stats.max_size.max(size);
        self.stats.min_size = if self.stats.num_writes == 1 {
            size
        } else {
            self.stats.min_size.min(size)
        };
        self.stats.total_bytes += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        Ok(0)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> ChannelResult<u64> {
        Ok(0)
    }

    fn close(&mut self) -> ChannelResult<()> {
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "TotalBytes" => Some(PropertyValue::Int(self.stats.total_bytes as i64)),
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
        false
    }

    fn mode(&self) -> AccessMode {
        self.state.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_bytes_without_storing() {
        let mut channel = CalcChannel::open_payload("", AccessMode::WRITE, Permissions::rw_user()).unwrap();
        channel.write(b"hello").unwrap();
        channel.write(b"hi").unwrap();
        let stats = channel.stats();
        assert_eq!(stats.num_writes, 2);
        assert_eq!(stats.total_bytes, 7);
        assert_eq!(stats.max_size, 5);
        assert_eq!(stats.min_size, 2);
    }

    #[test]
    fn read_mode_rejected() {
        let err = CalcChannel::open_payload("", AccessMode::READ, Permissions::rw_user()).unwrap_err();
        assert!(matches!(err, ChannelError::BadModeFlags));
    }
}
