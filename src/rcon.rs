use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const RCON_TIMEOUT: Duration = Duration::from_secs(2);
pub const PING_COMMAND: &str = "status";
pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

const OOB_HEADER: [u8; 4] = [0xFF; 4];
const PRINT_HEADER: &[u8; 10] = b"\xFF\xFF\xFF\xFFprint\n";
const RECV_BUF: usize = 4096;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RconError {
    #[error("no RCON password set")]
    NoCredential,
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("RCON transport error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// `FF FF FF FF rcon <password> <command>\n`
pub fn encode_request(password: &str, command: &str) -> Vec<u8> {
    let body = format!("rcon {password} {command}\n");
    let mut packet = Vec::with_capacity(OOB_HEADER.len() + body.len());
    packet.extend_from_slice(&OOB_HEADER);
    packet.extend_from_slice(body.as_bytes());
    packet
}

/// Strip the `FF FF FF FF print\n` header when present and decode the rest,
/// dropping any bytes that are not valid UTF-8.
pub fn decode_response(raw: &[u8]) -> String {
    let body = raw.strip_prefix(PRINT_HEADER.as_slice()).unwrap_or(raw);
    let mut out = String::with_capacity(body.len());
    for chunk in body.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RconClient {
    timeout: Duration,
}

impl Default for RconClient {
    fn default() -> Self {
        Self::new(RCON_TIMEOUT)
    }
}

impl RconClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn ping(&self, host: IpAddr, port: u16, password: &str) -> Result<String, RconError> {
        self.send(host, port, password, PING_COMMAND).await
    }

    /// Send one command and collect every datagram that arrives before the
    /// first receive timeout. There is no end-of-response marker, so a slow
    /// multi-packet reply may be cut short.
    pub async fn send(
        &self,
        host: IpAddr,
        port: u16,
        password: &str,
        command: &str,
    ) -> Result<String, RconError> {
        if password.is_empty() {
            return Err(RconError::NoCredential);
        }

        let bind_addr: SocketAddr = match host {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket
            .send_to(&encode_request(password, command), (host, port))
            .await?;

        let mut response = Vec::new();
        let mut received_any = false;
        let mut buf = [0u8; RECV_BUF];
        loop {
            match tokio::time::timeout(self.timeout, socket.recv_from(&mut buf)).await {
                Ok(Ok((n, _from))) => {
                    response.extend_from_slice(&buf[..n]);
                    received_any = true;
                }
                Ok(Err(e)) => return Err(RconError::Io(e)),
                Err(_) => break,
            }
        }

        if !received_any {
            return Err(RconError::Timeout(self.timeout));
        }
        Ok(decode_response(&response))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_layout() {
        let packet = encode_request("secret", "status");
        assert_eq!(&packet[..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&packet[4..], b"rcon secret status\n");
    }

    #[test]
    fn test_decode_strips_print_header() {
        let mut raw = PRINT_HEADER.to_vec();
        raw.extend_from_slice(b"map: mp_rust\n");
        assert_eq!(decode_response(&raw), "map: mp_rust\n");
    }

    #[test]
    fn test_decode_keeps_body_without_header() {
        assert_eq!(decode_response(b"plain text"), "plain text");
    }

    #[test]
    fn test_decode_only_strips_full_header() {
        // Four 0xFF bytes without "print\n" are not a header; they are invalid
        // UTF-8 and get dropped instead.
        let raw = b"\xFF\xFF\xFF\xFFprin";
        assert_eq!(decode_response(raw), "prin");
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        assert_eq!(decode_response(b"ok\xC3\x28 done"), "ok( done");
    }

    #[test]
    fn test_echoed_request_roundtrip() {
        // A server echoing the command body behind a print header yields the
        // original command text back.
        let packet = encode_request("secret", "status");
        let mut echo = PRINT_HEADER.to_vec();
        echo.extend_from_slice(&packet[4..]);
        assert_eq!(decode_response(&echo), "rcon secret status\n");
    }

    #[tokio::test]
    async fn test_empty_password_fails_before_io() {
        let client = RconClient::default();
        // Port 9 on loopback would time out; NoCredential must come first.
        let err = client.ping(LOOPBACK, 9, "").await.unwrap_err();
        assert!(matches!(err, RconError::NoCredential));
    }

    #[tokio::test]
    async fn test_send_concatenates_datagrams() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let server_task = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let (n, from) = server.recv_from(&mut buf).await.unwrap();
            let request = buf[..n].to_vec();
            let mut first = PRINT_HEADER.to_vec();
            first.extend_from_slice(b"hostname: test\n");
            server.send_to(&first, from).await.unwrap();
            server.send_to(b"players: 0\n", from).await.unwrap();
            request
        });

        let client = RconClient::new(Duration::from_millis(300));
        let response = client.ping(LOOPBACK, port, "pw").await.unwrap();
        assert_eq!(response, "hostname: test\nplayers: 0\n");

        let request = server_task.await.unwrap();
        assert_eq!(request, encode_request("pw", "status"));
    }

    #[tokio::test]
    async fn test_silent_endpoint_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let client = RconClient::new(Duration::from_millis(100));
        let err = client.send(LOOPBACK, port, "pw", "status").await.unwrap_err();
        assert!(matches!(err, RconError::Timeout(_)));
        drop(server);
    }
}
