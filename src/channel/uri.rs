//! `scheme://payload` URI grammar, per `spec.md` §6.

use super::error::{ChannelError, ChannelResult};

pub struct ParsedUri<'a> {
    pub scheme: &'a str,
    pub payload: &'a str,
}

pub fn parse(uri: &str) -> ChannelResult<ParsedUri<'_>> {
    match uri.split_once("://") {
        Some((scheme, payload)) if !scheme.is_empty() => Ok(ParsedUri { scheme, payload }),
        _ => Err(ChannelError::BadInfoString(uri.to_string())),
    }
}

/// Splits a `Tcp`/`Udp` `host:port` payload. Delegates the actual address
/// resolution to `std::net::ToSocketAddrs`, which already understands
/// bracketed IPv6 (`[::1]:8080`) — the source's ad-hoc `:`-scanning parser
/// (`spec.md` §9 Open Questions) does not, and this picks up that
/// extension for free rather than reproducing the gap.
pub fn host_port(payload: &str) -> ChannelResult<&str> {
    if payload.is_empty() {
        return Err(ChannelError::BadInfoString(
            "Tcp/Udp stream needs a hostname and a port".into(),
        ));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_and_payload() {
        let parsed = parse("File:///tmp/x").unwrap();
        assert_eq!(parsed.scheme, "File");
        assert_eq!(parsed.payload, "/tmp/x");
    }

    #[test]
    fn rejects_missing_scheme_separator() {
        assert!(parse("not-a-uri").is_err());
    }

    #[test]
    fn accepts_ipv6_host_port_payload() {
        assert_eq!(host_port("[::1]:8080").unwrap(), "[::1]:8080");
    }
}
