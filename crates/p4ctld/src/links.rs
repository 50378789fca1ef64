//! Static link configuration per switch.
//!
//! A [`LinkSource`] hands out the ordered list of directly attached hosts
//! for a device. [`RouteFile`] reads them from a JSON route file:
//!
//! ```json
//! {
//!   "1": [
//!     { "ip": "10.0.1.1", "mac": "08:00:00:00:01:11", "port": 1 },
//!     { "ip": "10.0.2.2", "mac": "08:00:00:00:02:22", "port": 2 }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::LinkError;

/// One host route, as raw match/action bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// IPv4 destination, 4 bytes.
    pub ip: Vec<u8>,
    /// Destination MAC, 6 bytes.
    pub mac: Vec<u8>,
    /// Egress port, shortest big-endian encoding.
    pub port: Vec<u8>,
}

impl LinkConfig {
    /// Builds a link from typed values.
    pub fn new(ip: Ipv4Addr, mac: [u8; 6], port: u32) -> Self {
        Self {
            ip: ip.octets().to_vec(),
            mac: mac.to_vec(),
            port: encode_port(port),
        }
    }
}

/// Supplier of per-device links.
pub trait LinkSource: Send + Sync {
    /// Returns the links of `device_id` in installation order.
    ///
    /// Unknown devices have no links.
    fn links(&self, device_id: u64) -> Vec<LinkConfig>;
}

/// In-memory link source.
#[derive(Debug, Clone, Default)]
pub struct StaticLinks {
    links: HashMap<u64, Vec<LinkConfig>>,
}

impl StaticLinks {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds links for a device, replacing previous ones.
    pub fn with_device(mut self, device_id: u64, links: Vec<LinkConfig>) -> Self {
        self.links.insert(device_id, links);
        self
    }
}

impl LinkSource for StaticLinks {
    fn links(&self, device_id: u64) -> Vec<LinkConfig> {
        self.links.get(&device_id).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct RouteRecord {
    ip: String,
    mac: String,
    port: u32,
}

/// Link source backed by a JSON route file.
#[derive(Debug, Clone)]
pub struct RouteFile {
    links: StaticLinks,
}

impl RouteFile {
    /// Loads and parses a route file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LinkError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| LinkError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let routes = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded route file");
        Ok(routes)
    }

    /// Parses route file content.
    pub fn parse(content: &str) -> Result<Self, LinkError> {
        let raw: HashMap<String, Vec<RouteRecord>> = serde_json::from_str(content)?;

        let mut links = StaticLinks::new();
        for (device, records) in raw {
            let device_id: u64 = device
                .trim()
                .parse()
                .map_err(|_| LinkError::InvalidDevice(device.clone()))?;

            let device_links = records
                .iter()
                .map(|r| {
                    let ip: Ipv4Addr = r
                        .ip
                        .parse()
                        .map_err(|_| LinkError::InvalidAddress(r.ip.clone()))?;
                    Ok(LinkConfig::new(ip, parse_mac(&r.mac)?, r.port))
                })
                .collect::<Result<Vec<_>, LinkError>>()?;

            links = links.with_device(device_id, device_links);
        }

        Ok(Self { links })
    }
}

impl LinkSource for RouteFile {
    fn links(&self, device_id: u64) -> Vec<LinkConfig> {
        self.links.links(device_id)
    }
}

/// Parses a colon or hyphen separated MAC address.
fn parse_mac(s: &str) -> Result<[u8; 6], LinkError> {
    let separator = if s.contains(':') { ':' } else { '-' };

    let parts: Vec<&str> = s.split(separator).collect();
    if parts.len() != 6 {
        return Err(LinkError::InvalidMac(s.to_string()));
    }

    let mut bytes = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        bytes[i] =
            u8::from_str_radix(part, 16).map_err(|_| LinkError::InvalidMac(s.to_string()))?;
    }

    Ok(bytes)
}

/// Shortest big-endian encoding of a port number, at least one byte.
fn encode_port(port: u32) -> Vec<u8> {
    let bytes = port.to_be_bytes();
    let first = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const ROUTES: &str = r#"{
        "1": [
            { "ip": "10.0.1.1", "mac": "08:00:00:00:01:11", "port": 1 },
            { "ip": "10.0.2.2", "mac": "08:00:00:00:02:22", "port": 2 }
        ],
        "2": [
            { "ip": "10.0.3.3", "mac": "08-00-00-00-03-33", "port": 300 }
        ]
    }"#;

    #[test]
    fn test_encode_port() {
        assert_eq!(encode_port(0), vec![0]);
        assert_eq!(encode_port(1), vec![1]);
        assert_eq!(encode_port(255), vec![0xff]);
        assert_eq!(encode_port(256), vec![1, 0]);
        assert_eq!(encode_port(0x0102_0304), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(
            parse_mac("08:00:00:00:01:11").unwrap(),
            [0x08, 0, 0, 0, 0x01, 0x11]
        );
        assert_eq!(
            parse_mac("08-00-00-00-01-11").unwrap(),
            [0x08, 0, 0, 0, 0x01, 0x11]
        );
        assert!(parse_mac("08:00:00:00:01").is_err());
        assert!(parse_mac("zz:00:00:00:01:11").is_err());
    }

    #[test]
    fn test_parse_routes_keeps_order() {
        let routes = RouteFile::parse(ROUTES).unwrap();

        assert_eq!(
            routes.links(1),
            vec![
                LinkConfig {
                    ip: vec![10, 0, 1, 1],
                    mac: vec![0x08, 0, 0, 0, 0x01, 0x11],
                    port: vec![1],
                },
                LinkConfig {
                    ip: vec![10, 0, 2, 2],
                    mac: vec![0x08, 0, 0, 0, 0x02, 0x22],
                    port: vec![2],
                },
            ]
        );
        assert_eq!(routes.links(2)[0].port, vec![0x01, 0x2c]);
    }

    #[test]
    fn test_unknown_device_has_no_links() {
        let routes = RouteFile::parse(ROUTES).unwrap();
        assert!(routes.links(9).is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            RouteFile::parse(r#"{ "s1": [] }"#),
            Err(LinkError::InvalidDevice(_))
        ));
        assert!(matches!(
            RouteFile::parse(r#"{ "1": [{ "ip": "10.0.1", "mac": "08:00:00:00:01:11", "port": 1 }] }"#),
            Err(LinkError::InvalidAddress(_))
        ));
        assert!(matches!(
            RouteFile::parse("[]"),
            Err(LinkError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", ROUTES).unwrap();

        let routes = RouteFile::load(file.path()).unwrap();
        assert_eq!(routes.links(1).len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            RouteFile::load("/nonexistent/routes.json"),
            Err(LinkError::Io { .. })
        ));
    }

    #[test]
    fn test_static_links() {
        let link = LinkConfig::new(Ipv4Addr::new(10, 0, 1, 1), [8, 0, 0, 0, 1, 0x11], 1);
        let source = StaticLinks::new().with_device(3, vec![link.clone()]);
        assert_eq!(source.links(3), vec![link]);
        assert!(source.links(1).is_empty());
    }
}
