//! OpenRGB SDK link: the handful of requests needed for profile switching.
//!
//! Every packet starts with a 16-byte header:
//! `"ORGB"` magic, then `device_index: u32`, `packet_id: u32`,
//! `payload_size: u32`, all little-endian. The server may push unsolicited
//! packets (e.g. device-list updates) at any time; they are skipped while
//! waiting for a reply.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use super::{LightingError, LightingLink, LinkConnector, Result};

pub const DEFAULT_PORT: u16 = 6742;

/// Name this client announces to the server.
pub const CLIENT_NAME: &str = "Hushkey";

/// Highest SDK protocol version we speak.
pub const CLIENT_PROTOCOL_VERSION: u32 = 3;

/// Profiles were added in protocol version 2.
const MIN_PROFILE_VERSION: u32 = 2;

const MAGIC: &[u8; 4] = b"ORGB";
pub const HEADER_LEN: usize = 16;

/// Refuse replies larger than this.
const MAX_PAYLOAD: u32 = 1 << 20;

/// Unsolicited packets tolerated while waiting for one reply.
const MAX_SKIPPED: usize = 32;

// ── Packet IDs ──

pub const REQUEST_CONTROLLER_COUNT: u32 = 0;
pub const REQUEST_PROTOCOL_VERSION: u32 = 40;
pub const SET_CLIENT_NAME: u32 = 50;
pub const DEVICE_LIST_UPDATED: u32 = 100;
pub const REQUEST_PROFILE_LIST: u32 = 150;
pub const LOAD_PROFILE: u32 = 152;

// ── Framing ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub device: u32,
    pub id: u32,
    pub size: u32,
}

/// Build one packet: header followed by payload.
pub fn encode_packet(id: u32, payload: &[u8]) -> Vec<u8> {
    let mut pkt = Vec::with_capacity(HEADER_LEN + payload.len());
    pkt.extend_from_slice(MAGIC);
    pkt.extend_from_slice(&0u32.to_le_bytes()); // device index
    pkt.extend_from_slice(&id.to_le_bytes());
    pkt.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    pkt.extend_from_slice(payload);
    pkt
}

pub fn decode_header(buf: &[u8; HEADER_LEN]) -> Result<Header> {
    if &buf[0..4] != MAGIC {
        return Err(LightingError::Protocol(format!(
            "bad magic {:02X?}",
            &buf[0..4]
        )));
    }
    let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
    Ok(Header {
        device: word(4),
        id: word(8),
        size: word(12),
    })
}

/// Null-terminated string payload.
fn c_string(s: &str) -> Vec<u8> {
    let mut v = Vec::with_capacity(s.len() + 1);
    v.extend_from_slice(s.as_bytes());
    v.push(0);
    v
}

fn read_u32(payload: &[u8], at: usize) -> Result<u32> {
    payload
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| LightingError::Protocol(format!("truncated u32 at offset {at}")))
}

fn read_u16(payload: &[u8], at: usize) -> Result<u16> {
    payload
        .get(at..at + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| LightingError::Protocol(format!("truncated u16 at offset {at}")))
}

/// Parse a `REQUEST_PROFILE_LIST` reply:
/// `data_size: u32, count: u16, count * (len: u16, name[len] incl. NUL)`.
pub fn parse_profile_list(payload: &[u8]) -> Result<Vec<String>> {
    let count = read_u16(payload, 4)? as usize;
    let mut at = 6;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_u16(payload, at)? as usize;
        at += 2;
        let raw = payload
            .get(at..at + len)
            .ok_or_else(|| LightingError::Protocol("truncated profile name".into()))?;
        at += len;
        let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
        names.push(String::from_utf8_lossy(raw).into_owned());
    }
    Ok(names)
}

// ── TCP link ──

/// Time left before `deadline`, or `None` once it has passed.
fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|d| !d.is_zero())
}

pub struct OpenRgbLink {
    stream: TcpStream,
    protocol_version: u32,
}

impl OpenRgbLink {
    /// Connect, negotiate the protocol version and announce the client name.
    ///
    /// TCP connect and the version handshake share one deadline of
    /// `timeout`. A server that accepts but never answers the version
    /// request fails with [`LightingError::Timeout`].
    pub fn connect(address: &str, client_name: &str, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        let addrs: Vec<_> = address
            .to_socket_addrs()
            .map_err(|e| LightingError::Unavailable(format!("{address}: {e}")))?
            .collect();

        let mut last_err = LightingError::Unavailable(format!("{address}: no addresses"));
        let mut stream = None;
        for addr in addrs {
            let Some(left) = remaining(deadline) else {
                last_err = LightingError::Timeout;
                break;
            };
            match TcpStream::connect_timeout(&addr, left) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    last_err = LightingError::Timeout;
                }
                Err(e) => last_err = LightingError::Unavailable(format!("{addr}: {e}")),
            }
        }
        let stream = stream.ok_or(last_err)?;
        let left = remaining(deadline).ok_or(LightingError::Timeout)?;
        stream.set_read_timeout(Some(left))?;
        stream.set_write_timeout(Some(left))?;
        stream.set_nodelay(true)?;

        let mut link = OpenRgbLink {
            stream,
            protocol_version: 0,
        };

        let reply = link.request(
            REQUEST_PROTOCOL_VERSION,
            &CLIENT_PROTOCOL_VERSION.to_le_bytes(),
        )?;
        link.protocol_version = read_u32(&reply, 0)?.min(CLIENT_PROTOCOL_VERSION);
        log::debug!(
            "[lighting] negotiated OpenRGB protocol version {}",
            link.protocol_version
        );

        link.send(SET_CLIENT_NAME, &c_string(client_name))?;

        // Later requests each get the full timeout.
        link.stream.set_read_timeout(Some(timeout))?;
        link.stream.set_write_timeout(Some(timeout))?;
        Ok(link)
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    fn send(&mut self, id: u32, payload: &[u8]) -> Result<()> {
        self.stream.write_all(&encode_packet(id, payload))?;
        Ok(())
    }

    fn read_packet(&mut self) -> Result<(Header, Vec<u8>)> {
        let mut buf = [0u8; HEADER_LEN];
        self.stream.read_exact(&mut buf)?;
        let header = decode_header(&buf)?;
        if header.size > MAX_PAYLOAD {
            return Err(LightingError::Protocol(format!(
                "payload too large ({} bytes)",
                header.size
            )));
        }
        let mut payload = vec![0u8; header.size as usize];
        self.stream.read_exact(&mut payload)?;
        Ok((header, payload))
    }

    /// Send a request and wait for the reply with the same packet id.
    fn request(&mut self, id: u32, payload: &[u8]) -> Result<Vec<u8>> {
        self.send(id, payload)?;
        for _ in 0..=MAX_SKIPPED {
            let (header, reply) = self.read_packet()?;
            if header.id == id {
                return Ok(reply);
            }
            log::debug!("[lighting] skipping unsolicited packet id {}", header.id);
        }
        Err(LightingError::Protocol(format!(
            "no reply to packet id {id} after {MAX_SKIPPED} unsolicited packets"
        )))
    }
}

impl LightingLink for OpenRgbLink {
    fn controller_count(&mut self) -> Result<u32> {
        let reply = self.request(REQUEST_CONTROLLER_COUNT, &[])?;
        read_u32(&reply, 0)
    }

    fn profiles(&mut self) -> Result<Vec<String>> {
        if self.protocol_version < MIN_PROFILE_VERSION {
            return Err(LightingError::Protocol(format!(
                "server protocol version {} does not support profiles",
                self.protocol_version
            )));
        }
        let reply = self.request(REQUEST_PROFILE_LIST, &[])?;
        parse_profile_list(&reply)
    }

    fn load_profile(&mut self, name: &str) -> Result<()> {
        self.send(LOAD_PROFILE, &c_string(name))
    }
}

/// Opens [`OpenRgbLink`]s to a fixed `host:port`.
pub struct OpenRgbConnector {
    address: String,
    client_name: String,
}

impl OpenRgbConnector {
    pub fn new(address: impl Into<String>) -> Self {
        OpenRgbConnector {
            address: address.into(),
            client_name: CLIENT_NAME.into(),
        }
    }
}

impl LinkConnector for OpenRgbConnector {
    fn connect(&self, timeout: Duration) -> Result<Box<dyn LightingLink>> {
        Ok(Box::new(OpenRgbLink::connect(
            &self.address,
            &self.client_name,
            timeout,
        )?))
    }

    fn describe(&self) -> String {
        format!("OpenRGB at {}", self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    fn profile_list_payload(names: &[&str]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(names.len() as u16).to_le_bytes());
        for n in names {
            body.extend_from_slice(&((n.len() + 1) as u16).to_le_bytes());
            body.extend_from_slice(n.as_bytes());
            body.push(0);
        }
        let mut payload = ((body.len() + 4) as u32).to_le_bytes().to_vec();
        payload.extend_from_slice(&body);
        payload
    }

    fn read_request(stream: &mut TcpStream) -> Option<(Header, Vec<u8>)> {
        let mut buf = [0u8; HEADER_LEN];
        stream.read_exact(&mut buf).ok()?;
        let header = decode_header(&buf).ok()?;
        let mut payload = vec![0u8; header.size as usize];
        stream.read_exact(&mut payload).ok()?;
        Some((header, payload))
    }

    /// Minimal OpenRGB server. Records every request it sees and returns
    /// them when the client closes the connection.
    fn fake_server(
        answer_version: bool,
        profiles: &'static [&'static str],
    ) -> (String, JoinHandle<Vec<(u32, Vec<u8>)>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            while let Some((header, payload)) = read_request(&mut stream) {
                seen.push((header.id, payload.clone()));
                let reply = match header.id {
                    REQUEST_PROTOCOL_VERSION if answer_version => Some(3u32.to_le_bytes().to_vec()),
                    REQUEST_CONTROLLER_COUNT => {
                        // Unsolicited update first; the client must skip it.
                        stream
                            .write_all(&encode_packet(DEVICE_LIST_UPDATED, &[]))
                            .unwrap();
                        Some(2u32.to_le_bytes().to_vec())
                    }
                    REQUEST_PROFILE_LIST => Some(profile_list_payload(profiles)),
                    _ => None,
                };
                if let Some(reply) = reply {
                    stream.write_all(&encode_packet(header.id, &reply)).unwrap();
                }
            }
            seen
        });
        (addr, handle)
    }

    #[test]
    fn encode_packet_layout() {
        let pkt = encode_packet(LOAD_PROFILE, b"Muted\0");
        assert_eq!(&pkt[0..4], b"ORGB");
        assert_eq!(&pkt[4..8], &0u32.to_le_bytes());
        assert_eq!(&pkt[8..12], &152u32.to_le_bytes());
        assert_eq!(&pkt[12..16], &6u32.to_le_bytes());
        assert_eq!(&pkt[16..], b"Muted\0");
    }

    #[test]
    fn decode_header_rejects_bad_magic() {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(b"NOPE");
        assert!(matches!(decode_header(&buf), Err(LightingError::Protocol(_))));
    }

    #[test]
    fn parse_profile_list_reads_names() {
        let payload = profile_list_payload(&["Default", "Muted", "Off"]);
        assert_eq!(
            parse_profile_list(&payload).unwrap(),
            vec!["Default", "Muted", "Off"]
        );
        assert!(parse_profile_list(&profile_list_payload(&[])).unwrap().is_empty());
    }

    #[test]
    fn parse_profile_list_truncated() {
        let mut payload = profile_list_payload(&["Default"]);
        payload.truncate(payload.len() - 3);
        assert!(parse_profile_list(&payload).is_err());
    }

    #[test]
    fn link_negotiates_and_talks_to_server() {
        let (addr, server) = fake_server(true, &["Default", "Muted"]);
        let mut link = OpenRgbLink::connect(&addr, "Test", Duration::from_secs(2)).unwrap();
        assert_eq!(link.protocol_version(), 3);
        assert_eq!(link.controller_count().unwrap(), 2);
        assert_eq!(link.profiles().unwrap(), vec!["Default", "Muted"]);
        link.load_profile("Muted").unwrap();
        drop(link);

        let seen = server.join().unwrap();
        let ids: Vec<u32> = seen.iter().map(|(id, _)| *id).collect();
        assert_eq!(
            ids,
            vec![
                REQUEST_PROTOCOL_VERSION,
                SET_CLIENT_NAME,
                REQUEST_CONTROLLER_COUNT,
                REQUEST_PROFILE_LIST,
                LOAD_PROFILE
            ]
        );
        assert_eq!(seen[1].1, b"Test\0");
        assert_eq!(seen[4].1, b"Muted\0");
    }

    #[test]
    fn silent_version_request_times_out() {
        let (addr, server) = fake_server(false, &["Default"]);
        let started = Instant::now();
        let result = OpenRgbLink::connect(&addr, "Test", Duration::from_millis(200));
        assert!(matches!(result, Err(LightingError::Timeout)));
        assert!(started.elapsed() < Duration::from_millis(1500));
        drop(result);

        // Only the version request went out; the client name never did.
        let seen = server.join().unwrap();
        let ids: Vec<u32> = seen.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![REQUEST_PROTOCOL_VERSION]);
    }

    #[test]
    fn accepting_but_mute_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink);
        });

        let started = Instant::now();
        let result = OpenRgbLink::connect(&addr, "Test", Duration::from_millis(300));
        assert!(matches!(result, Err(LightingError::Timeout)));
        assert!(started.elapsed() < Duration::from_millis(1500));
        drop(result);
        server.join().unwrap();
    }

    #[test]
    fn client_against_mute_server_stays_disconnected() {
        use crate::lighting::{ConnectionState, LightingClient};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut sink = Vec::new();
            let _ = stream.read_to_end(&mut sink);
        });

        let mut client = LightingClient::new(
            Box::new(OpenRgbConnector::new(addr)),
            Duration::from_millis(300),
            Duration::from_secs(5),
        );
        assert!(matches!(client.connect(), Err(LightingError::Timeout)));
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(client.next_poll().is_none());
        assert!(client.select_profile("Muted").is_err());
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn remaining_is_none_after_deadline() {
        assert!(remaining(Instant::now()).is_none());
        assert!(remaining(Instant::now() + Duration::from_secs(5)).is_some());
    }

    #[test]
    fn refused_connection_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        let result = OpenRgbLink::connect(&addr, "Test", Duration::from_millis(500));
        assert!(matches!(result, Err(LightingError::Unavailable(_))));
    }

    #[test]
    fn connector_describes_target() {
        let c = OpenRgbConnector::new("127.0.0.1:6742");
        assert_eq!(c.describe(), "OpenRGB at 127.0.0.1:6742");
    }
}
