//! Tunnel configuration: loosely-typed payload in, validated descriptor out
//!
//! [`TunnelConfig::validate`] is the single constructor for
//! [`TunnelConfig`]. It is pure and all-or-nothing: the same payload always
//! yields the same config or the same error, and nothing partially built
//! ever escapes.

use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::key::Key;
use crate::{DEFAULT_INTERFACE_ADDRESS, DEFAULT_MTU, MAX_MTU, MIN_MTU, PERSISTENT_KEEPALIVE_SECS};

/// Loosely-typed connection payload as supplied by the caller.
///
/// Field names follow the caller-facing wire shape. Everything is optional
/// at this layer; [`TunnelConfig::validate`] decides what is required and
/// reports a precise diagnostic for anything missing or malformed. List
/// entries are kept as raw JSON values so that non-string entries are
/// rejected instead of silently dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTunnelPayload {
    pub private_key: Option<String>,
    pub public_key: Option<String>,
    pub server_address: Option<String>,
    pub server_port: Option<i64>,
    /// CIDR literals; doubles as the peer's allowed routes and, for
    /// single-host entries, the local interface addresses.
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Option<Vec<Value>>,
    pub dns: Option<Vec<Value>>,
    pub mtu: Option<i64>,
    pub preshared_key: Option<String>,
}

/// The single remote peer of the tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// The peer's public key
    pub public_key: Key,
    /// Optional extra symmetric secret layered onto the key exchange
    pub preshared_key: Option<Key>,
    /// Remote endpoint host (name or address literal)
    pub endpoint_host: String,
    /// Remote endpoint port, in [1, 65535]
    pub endpoint_port: u16,
    /// Network prefixes the peer may route for; input order preserved
    pub allowed_routes: Vec<IpNet>,
    /// Always [`PERSISTENT_KEEPALIVE_SECS`]
    pub keepalive_interval: u16,
}

/// Validated tunnel descriptor.
///
/// A value of this type always satisfies the configuration invariants:
/// keys decode to 32 bytes, the MTU and port are in range, the peer has at
/// least one allowed route, and at least one local interface address is
/// present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Local private key
    pub private_key: Key,
    /// Local interface addresses (single-host prefixes)
    pub addresses: Vec<IpNet>,
    /// DNS servers to install while the tunnel is up; may be empty
    pub dns_servers: Vec<IpAddr>,
    /// Interface MTU
    pub mtu: u16,
    /// The remote peer
    pub peer: PeerConfig,
}

impl TunnelConfig {
    /// Validate a raw payload into a tunnel descriptor.
    ///
    /// Interface addresses are derived from the `allowedIPs` entries whose
    /// prefix length denotes a single host (/32 or /128); when none
    /// qualify, [`DEFAULT_INTERFACE_ADDRESS`] is synthesized so the
    /// interface has at least one local address. Every `allowedIPs` entry,
    /// single-host or not, is registered as a peer allowed route.
    pub fn validate(payload: &RawTunnelPayload) -> Result<Self> {
        let private_key = match payload.private_key.as_deref() {
            Some(encoded) => {
                Key::from_base64(encoded).map_err(|_| Error::MalformedKey("privateKey"))?
            }
            None => return Err(Error::MissingField("privateKey")),
        };

        let public_key = match payload.public_key.as_deref() {
            Some(encoded) => {
                Key::from_base64(encoded).map_err(|_| Error::MalformedKey("publicKey"))?
            }
            None => return Err(Error::MissingField("publicKey")),
        };

        // An empty preshared key means "not supplied".
        let preshared_key = match payload.preshared_key.as_deref() {
            Some("") | None => None,
            Some(encoded) => {
                Some(Key::from_base64(encoded).map_err(|_| Error::MalformedKey("presharedKey"))?)
            }
        };

        let endpoint_host = payload
            .server_address
            .as_deref()
            .filter(|host| !host.is_empty())
            .ok_or(Error::MissingField("serverAddress"))?
            .to_string();

        let endpoint_port = payload
            .server_port
            .ok_or(Error::MissingField("serverPort"))
            .and_then(|port| range_check("serverPort", port, 1, 65535))? as u16;

        let mtu = match payload.mtu {
            None => DEFAULT_MTU,
            Some(value) => range_check("mtu", value, MIN_MTU as i64, MAX_MTU as i64)? as u16,
        };

        let entries = payload.allowed_ips.as_deref().unwrap_or(&[]);
        if entries.is_empty() {
            return Err(Error::MissingField("allowedIPs"));
        }

        let mut allowed_routes = Vec::with_capacity(entries.len());
        for entry in entries {
            let literal = entry
                .as_str()
                .ok_or_else(|| Error::MalformedNetwork(entry.to_string()))?;
            let network: IpNet = literal
                .parse()
                .map_err(|_| Error::MalformedNetwork(literal.to_string()))?;
            allowed_routes.push(network);
        }

        // Single-host prefixes double as local interface addresses.
        let mut addresses: Vec<IpNet> = allowed_routes
            .iter()
            .copied()
            .filter(is_host_prefix)
            .collect();
        if addresses.is_empty() {
            addresses.push(default_interface_address());
        }

        let mut dns_servers = Vec::new();
        if let Some(entries) = payload.dns.as_deref() {
            for entry in entries {
                let literal = entry
                    .as_str()
                    .ok_or_else(|| Error::MalformedDns(entry.to_string()))?;
                let server: IpAddr = literal
                    .parse()
                    .map_err(|_| Error::MalformedDns(literal.to_string()))?;
                dns_servers.push(server);
            }
        }

        Ok(Self {
            private_key,
            addresses,
            dns_servers,
            mtu,
            peer: PeerConfig {
                public_key,
                preshared_key,
                endpoint_host,
                endpoint_port,
                allowed_routes,
                keepalive_interval: PERSISTENT_KEEPALIVE_SECS,
            },
        })
    }
}

/// The fallback interface address as a typed network.
pub fn default_interface_address() -> IpNet {
    DEFAULT_INTERFACE_ADDRESS
        .parse()
        .expect("default interface address is a valid prefix")
}

fn is_host_prefix(network: &IpNet) -> bool {
    network.prefix_len() == network.max_prefix_len()
}

fn range_check(field: &'static str, value: i64, min: i64, max: i64) -> Result<i64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(Error::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
