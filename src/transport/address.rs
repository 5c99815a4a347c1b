use std::fmt::Write as _;
use std::path::PathBuf;

use crate::{BusType, ConnectError, ConnectErrorKind};

pub(crate) const ENV_STARTER_ADDRESS: &str = "DBUS_STARTER_ADDRESS";
pub(crate) const ENV_SESSION_BUS: &str = "DBUS_SESSION_BUS_ADDRESS";
pub(crate) const ENV_SYSTEM_BUS: &str = "DBUS_SYSTEM_BUS_ADDRESS";
pub(crate) const DEFAULT_SYSTEM_BUS: &str = "unix:path=/var/run/dbus/system_bus_socket";

/// A single connectable address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Address {
    Unix(PathBuf),
}

impl Address {
    /// Parse a D-Bus address string into the alternatives it lists which are
    /// supported, in order.
    pub(crate) fn parse_all(string: &str) -> Result<Vec<Address>, ConnectError> {
        let mut addresses = Vec::new();

        for entry in string.split(';').filter(|entry| !entry.is_empty()) {
            let Some((transport, params)) = entry.split_once(':') else {
                return Err(invalid(format!("missing transport in `{entry}`")));
            };

            let mut path = None;

            for param in params.split(',').filter(|param| !param.is_empty()) {
                let Some((key, value)) = param.split_once('=') else {
                    return Err(invalid(format!("malformed parameter `{param}`")));
                };

                if key == "path" {
                    path = Some(unescape(value)?);
                }
            }

            match (transport, path) {
                ("unix", Some(path)) => addresses.push(Address::Unix(PathBuf::from(path))),
                _ => {
                    tracing::debug!(entry, "Skipping unsupported address");
                }
            }
        }

        if addresses.is_empty() {
            return Err(invalid(format!("no supported address in `{string}`")));
        }

        Ok(addresses)
    }
}

/// Resolve the address of a standard bus using the given environment lookup.
pub(crate) fn bus_address(
    bus: BusType,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, ConnectError> {
    let (key, default) = match bus {
        BusType::Session => (ENV_SESSION_BUS, None),
        BusType::System => (ENV_SYSTEM_BUS, Some(DEFAULT_SYSTEM_BUS)),
        BusType::Starter => (ENV_STARTER_ADDRESS, None),
    };

    if let Some(address) = env(key) {
        return Ok(address);
    }

    match default {
        Some(address) => Ok(address.to_owned()),
        None => Err(invalid(format!("no address configured for the {bus}"))),
    }
}

/// Decode percent-escapes in an address value.
fn unescape(value: &str) -> Result<String, ConnectError> {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut n = 0;

    while n < bytes.len() {
        let b = bytes[n];
        n += 1;

        if b != b'%' {
            out.push(b);
            continue;
        }

        let Some(hex) = value.get(n..n + 2) else {
            return Err(invalid(format!("truncated escape in `{value}`")));
        };

        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid(format!("bad escape `%{hex}` in `{value}`")));
        }

        let Ok(byte) = u8::from_str_radix(hex, 16) else {
            return Err(invalid(format!("bad escape `%{hex}` in `{value}`")));
        };

        out.push(byte);
        n += 2;
    }

    String::from_utf8(out).map_err(|_| invalid(format!("escapes in `{value}` are not UTF-8")))
}

/// Escape a value for use in an address, leaving only the bytes which never
/// need escaping as they are.
pub(crate) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());

    for b in value.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'/' | b'.' | b'\\') {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "%{b:02x}");
        }
    }

    out
}

fn invalid(message: String) -> ConnectError {
    ConnectError::new(ConnectErrorKind::InvalidAddress, message)
}
