//! Connectionless datagram back-end. Writes never fail on non-delivery
//! (`spec.md` §4.2); client and server forms differ only in whether the
//! socket is bound before or after the peer address is known.

use std::net::UdpSocket;

use crate::channel::{
    AccessMode, ChannelError, ChannelResult, ChannelState, IOChannel, Permissions, Whence,
};

pub struct UdpChannel {
    state: ChannelState,
    socket: UdpSocket,
    peer: Option<std::net::SocketAddr>,
}

impl UdpChannel {
    /// `payload` is `host:port` for the client form (connects the socket
    /// to a peer) or an empty payload to bind a server socket on an
    /// ephemeral local port, matching the source's client/server
    /// distinction.
    pub fn open_payload(
        payload: &str,
        mode: AccessMode,
        permissions: Permissions,
    ) -> ChannelResult<Box<dyn IOChannel>> {
        let mode = if mode.is_defined() { mode } else { AccessMode::READ_WRITE };

        if payload.is_empty() {
            let socket = UdpSocket::bind("0.0.0.0:0").map_err(ChannelError::from)?;
            let mut state = ChannelState::new(mode, permissions);
            state.enable_write_buffering();
            return Ok(Box::new(UdpChannel {
                state,
                socket,
                peer: None,
            }));
        }

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(ChannelError::from)?;
        let peer = std::net::ToSocketAddrs::to_socket_addrs(&payload)
            .map_err(|e| ChannelError::UnableToConnect(format!("{payload}: {e}")))?
            .next()
            .ok_or_else(|| ChannelError::UnableToConnect(payload.to_string()))?;
        socket.connect(peer).map_err(ChannelError::from)?;

        let mut state = ChannelState::new(mode, permissions);
        state.enable_write_buffering();
        Ok(Box::new(UdpChannel {
            state,
            socket,
            peer: Some(peer),
        }))
    }
}

impl IOChannel for UdpChannel {
    fn read(&mut self, buf: &mut [u8]) -> ChannelResult<usize> {
        let (n, _from) = self.socket.recv_from(buf).map_err(ChannelError::from)?;
        if n == 0 {
            self.state.set_eof();
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> ChannelResult<usize> {
        if self.state.uses_write_buffering() {
            return Ok(self.state.add_to_write_buffer(buf));
        }
        let n = match self.peer {
            Some(peer) => self.socket.send_to(buf, peer),
            None => {
                tracing::warn!("UDP write with no connected peer; datagram dropped");
                return Ok(buf.len());
            }
        }
        .unwrap_or(buf.len()); // non-delivery is not an error, per spec.md §4.2
        Ok(n)
    }

    fn flush(&mut self) -> ChannelResult<usize> {
        let pending = self.state.take_write_buffer();
        if pending.is_empty() {
            return Ok(0);
        }
        if let Some(peer) = self.peer {
            self.socket.send_to(&pending, peer).ok();
        }
        Ok(pending.len())
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
    fn client_server_roundtrip() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = server_socket.local_addr().unwrap();

        let mut client = UdpChannel::open_payload(
            &server_addr.to_string(),
            AccessMode::READ_WRITE,
            Permissions::rw_user(),
        )
        .unwrap();
        client.write(b"ping").unwrap();

        let mut buf = [0u8; 4];
        let (n, _from) = server_socket.recv_from(&mut buf).unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf, b"ping");
    }
}
