//! TCP client back-end: resolves `host:port`, connects, applies a default
//! 10 s timeout and a graceful-close linger policy. Grounded on
//! `original_source/IOChannelTcp.c`; `SO_LINGER`/receive-timeout come from
//! `socket2` since `std::net::TcpStream` doesn't expose them directly.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use socket2::Socket;

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, PropertyValue, Whence,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const LINGER_TIMEOUT: Duration = Duration::from_secs(1);

pub struct TcpChannel {
    state: ChannelState,
    stream: TcpStream,
}

impl TcpChannel {
    /// `payload` is `host:port`; an empty host defaults to `localhost`,
    /// matching `original_source/IOChannelTcp.c`'s
    /// `BerkeleySocketClient_connect` fallback.
    pub fn open_payload(
        payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        if payload.is_empty() {
            tracing::error!("Tcp stream needs a hostname and a port");
            return Err(ChannelError::BadInfoString(
                "Tcp stream needs a hostname and a port".into(),
            ));
        }

        let target = if payload.starts_with(':') {
            format!("localhost{payload}")
        } else {
            payload.to_string()
        };

        let mode = if mode.is_defined() { mode } else { AccessMode::READ_WRITE };

        let stream = TcpStream::connect(&target)
            .map_err(|e| ChannelError::UnableToConnect(format!("{target}: {e}")))?;

        let socket = Socket::from(stream.try_clone().map_err(ChannelError::from)?);
        socket
            .set_read_timeout(Some(DEFAULT_TIMEOUT))
            .map_err(ChannelError::from)?;
        socket
            .set_linger(Some(LINGER_TIMEOUT))
            .map_err(ChannelError::from)?;

        let mut state = ChannelState::new(mode, permissions);
        state.enable_write_buffering();

        Ok(Box::new(TcpChannel { state, stream }))
    }
}

impl IOChannel for TcpChannel {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        let n = self.stream.read(buf).map_err(ChannelError::from)?;
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
        let n = self.stream.write(buf).map_err(ChannelError::from)?;
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
        let n = self.stream.write(&pending).map_err(ChannelError::from)?;
        if n < pending.len() {
            return Err(ChannelError::ShortWrite {
                wrote: n,
                requested: pending.len(),
            });
        }
        self.stream.flush().map_err(ChannelError::from)?;
        self.state.offset += n as u64;
        Ok(n)
    }

    fn seek(&mut self, _offset: i64, _whence: Whence) -> ChannelResult<u64> {
        Err(ChannelError::NotSeekable)
    }

    fn close(&mut self) -> ChannelResult<()> {
        if !self.state.mode.is_not_close() {
            self.stream.shutdown(std::net::Shutdown::Both).ok();
        }
        Ok(())
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            #[cfg(unix)]
            "Fd" | "Socket" => {
                use std::os::unix::io::AsRawFd;
                Some(PropertyValue::Fd(self.stream.as_raw_fd()))
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    /// Scenario 5 of `spec.md` §8: connect a `TcpChannel` to a listening
    /// server, write a 32-bit network-order integer, and have the server
    /// side decode it back to the same host-order value.
    #[test]
    fn client_writes_network_order_int_server_decodes_it() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let server_addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut conn, _peer) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            conn.read_exact(&mut buf).unwrap();
            i32::from_be_bytes(buf)
        });

        let mut client = TcpChannel::open_payload(
            &server_addr.to_string(),
            AccessMode::READ_WRITE,
            Permissions::rw_user(),
        )
        .unwrap();
        let value: i32 = 42;
        client.write(&value.to_be_bytes()).unwrap();
        client.flush().unwrap();

        let decoded = server.join().unwrap();
        assert_eq!(decoded, value);
    }
}
