//! Name→factory dispatch for channel schemes — the trait-polymorphism
//! replacement for the source's void-pointer v-table lookup, per
//! `spec.md` §9 "void-pointer plugin v-tables → trait polymorphism".

use std::collections::HashMap;
use std::sync::OnceLock;

use super::backends::{calc, fd, file, mem, mmap, null, stdio, tcp, udp};
use super::error::{ChannelError, ChannelResult};
use super::uri;
use super::{AccessMode, IOChannel, Permissions};

type Factory = fn(&str, AccessMode, Permissions) -> ChannelResult<Box<dyn IOChannel>>;

fn table() -> &'static HashMap<&'static str, Factory> {
    static TABLE: OnceLock<HashMap<&'static str, Factory>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut m: HashMap<&'static str, Factory> = HashMap::new();
        m.insert("File", file::FileChannel::open_payload);
        m.insert("Fd", fd::FdChannel::open_payload);
        m.insert("MemMapFd", mmap::MemMapFdChannel::open_payload);
        m.insert("Tcp", tcp::TcpChannel::open_payload);
        m.insert("Socket", tcp::TcpChannel::open_payload);
        m.insert("Udp", udp::UdpChannel::open_payload);
        m.insert("StdIn", stdio::StdInChannel::open_payload);
        m.insert("StdOut", stdio::StdOutChannel::open_payload);
        m.insert("StdErr", stdio::StdErrChannel::open_payload);
        m.insert("Null", null::NullChannel::open_payload);
        m.insert("Calc", calc::CalcChannel::open_payload);
        m.insert("Mem", mem::MemBufferChannel::open_payload);
        m
    })
}

/// Parses `uri` as `scheme://payload` and opens the matching back-end.
pub fn open(uri: &str, mode: AccessMode, permissions: Permissions) -> ChannelResult<Box<dyn IOChannel>> {
    let parsed = uri::parse(uri)?;
    let factory = table()
        .get(parsed.scheme)
        .ok_or_else(|| ChannelError::UnknownScheme(parsed.scheme.to_string()))?;
    factory(parsed.payload, mode, permissions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scheme_errors() {
        let err = open("Carrier://pigeon", AccessMode::READ, Permissions::rw_user()).unwrap_err();
        assert!(matches!(err, ChannelError::UnknownScheme(_)));
    }

    #[test]
    fn null_scheme_resolves() {
        let channel = open("Null://", AccessMode::READ_WRITE, Permissions::rw_user()).unwrap();
        assert_eq!(channel.mode(), AccessMode::READ_WRITE);
    }
}
