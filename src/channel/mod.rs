//! `IOChannel` — a uniform byte-stream abstraction over pluggable
//! transport back-ends, per `spec.md` §4.2.
//!
//! Each back-end implements the same [`IOChannel`] trait; [`open`] parses
//! the `scheme://payload` URI grammar of §6 and dispatches to the
//! scheme's factory via [`registry`] (the Rust shape of the source's
//! void-pointer plugin v-table, per `spec.md` §9).

mod error;
mod registry;
mod uri;

pub mod backends;

pub use error::{ChannelError, ChannelResult};
pub use registry::open;

use std::collections::VecDeque;

bitflags::bitflags! {
    /// Channel access-mode bitset, per `spec.md` §3/§6.
    pub struct AccessMode: u32 {
        const READ      = 0b0000_0001;
        const WRITE     = 0b0000_0010;
        const CREATE    = 0b0000_0100;
        const TRUNCATE  = 0b0000_1000;
        const APPEND    = 0b0001_0000;
        const CLOSE     = 0b0010_0000;
        const NOTCLOSE  = 0b0100_0000;
        const READ_WRITE = Self::READ.bits | Self::WRITE.bits;
    }
}

impl AccessMode {
    pub fn is_defined(self) -> bool {
        self.intersects(AccessMode::READ | AccessMode::WRITE)
    }

    pub fn is_read_only(self) -> bool {
        self.contains(AccessMode::READ) && !self.contains(AccessMode::WRITE)
    }

    pub fn is_write_only(self) -> bool {
        self.contains(AccessMode::WRITE) && !self.contains(AccessMode::READ)
    }

    pub fn is_not_close(self) -> bool {
        self.contains(AccessMode::NOTCLOSE)
    }
}

bitflags::bitflags! {
    /// POSIX-style permission mask, per `spec.md` §6.
    pub struct Permissions: u32 {
        const USER_R  = 0o400;
        const USER_W  = 0o200;
        const USER_X  = 0o100;
        const GROUP_R = 0o040;
        const GROUP_W = 0o020;
        const GROUP_X = 0o010;
        const OTHER_R = 0o004;
        const OTHER_W = 0o002;
        const OTHER_X = 0o001;
    }
}

impl Permissions {
    pub fn all_rw() -> Self {
        Permissions::USER_R
            | Permissions::USER_W
            | Permissions::GROUP_R
            | Permissions::GROUP_W
            | Permissions::OTHER_R
            | Permissions::OTHER_W
    }

    pub fn rw_user() -> Self {
        Permissions::USER_R | Permissions::USER_W
    }

    /// The raw POSIX mode bits, for `std::fs::Permissions` / `open(2)` use.
    pub fn as_mode_bits(self) -> u32 {
        self.bits()
    }
}

/// Seek origin, per `spec.md` §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// A typed channel property, per the `getProperty`/`setProperty` contract
/// in `spec.md` §4.2 (examples: `Fd`, `Socket`, `MemPointer`).
#[derive(Debug, Clone)]
pub enum PropertyValue {
    Fd(i32),
    Int(i64),
    Text(String),
}

/// Shared bookkeeping every back-end embeds: access mode, permissions,
/// byte offset, sticky error state, EOF flag, and the optional internal
/// write buffer (`spec.md` §3's channel invariants).
pub struct ChannelState {
    pub mode: AccessMode,
    pub permissions: Permissions,
    pub offset: u64,
    error: Option<ChannelError>,
    eof: bool,
    write_buffer: Option<Vec<u8>>,
    read_lookahead: VecDeque<u8>,
}

impl ChannelState {
    pub fn new(mode: AccessMode, permissions: Permissions) -> Self {
        ChannelState {
            mode,
            permissions,
            offset: 0,
            error: None,
            eof: false,
            write_buffer: None,
            read_lookahead: VecDeque::new(),
        }
    }

    pub fn set_error(&mut self, err: ChannelError) {
        tracing::warn!(error = %err, "channel error set (sticky until cleared)");
        self.error = Some(err);
    }

    pub fn error(&self) -> Option<ChannelError> {
        self.error.clone()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
        self.eof = false;
    }

    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn enable_write_buffering(&mut self) {
        self.write_buffer = Some(Vec::new());
    }

    pub fn uses_write_buffering(&self) -> bool {
        self.write_buffer.is_some()
    }

    /// Appends to the internal write buffer; the buffer empties only on
    /// `flush`, matching "write buffer empty implies flushed" (`spec.md`
    /// §3).
    pub fn add_to_write_buffer(&mut self, buf: &[u8]) -> usize {
        if let Some(buffer) = self.write_buffer.as_mut() {
            buffer.extend_from_slice(buf);
        }
        buf.len()
    }

    pub fn write_buffered_bytes(&self) -> usize {
        self.write_buffer.as_ref().map_or(0, Vec::len)
    }

    pub fn take_write_buffer(&mut self) -> Vec<u8> {
        self.write_buffer
            .as_mut()
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

/// The polymorphic byte-stream contract every back-end implements, per
/// `spec.md` §4.2.
pub trait IOChannel: Send {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize>;
    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize>;
    fn flush(&mut self) -> ChannelResult<usize>;
    fn seek(&mut self, offset: i64, whence: Whence) -> ChannelResult<u64>;
    fn close(&mut self) -> ChannelResult<()>;

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        tracing::warn!(property = name, "property not set or not defined for this stream");
        None
    }

    fn set_property(&mut self, name: &str, value: PropertyValue) -> bool {
        let _ = (name, value);
        false
    }

    fn error(&self) -> Option<ChannelError>;
    fn clear_error(&mut self);
    fn is_eof(&self) -> bool;
    fn mode(&self) -> AccessMode;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_defaults_detection() {
        assert!(!AccessMode::empty().is_defined());
        assert!(AccessMode::READ.is_defined());
        assert!(AccessMode::READ.is_read_only());
        assert!(AccessMode::WRITE.is_write_only());
        assert!(!AccessMode::READ_WRITE.is_read_only());
    }

    #[test]
    fn write_buffer_accumulates_until_flush() {
        let mut state = ChannelState::new(AccessMode::WRITE, Permissions::rw_user());
        state.enable_write_buffering();
        assert_eq!(state.add_to_write_buffer(b"abc"), 3);
        assert_eq!(state.add_to_write_buffer(b"de"), 2);
        assert_eq!(state.write_buffered_bytes(), 5);
        let drained = state.take_write_buffer();
        assert_eq!(drained, b"abcde");
        assert_eq!(state.write_buffered_bytes(), 0);
    }

    #[test]
    fn error_is_sticky_until_cleared() {
        let mut state = ChannelState::new(AccessMode::READ, Permissions::rw_user());
        assert!(state.error().is_none());
        state.set_error(ChannelError::BadDescriptor);
        assert!(state.error().is_some());
        state.clear_error();
        assert!(state.error().is_none());
    }
}
