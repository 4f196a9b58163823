//! Shared authority-URI splitting and query-table assembly
//!
//! Most dialects are `scheme://userinfo@host:port?query#name` with a
//! protocol-specific reading of the userinfo and a largely shared query
//! vocabulary (`security`, `sni`, `fp`, `alpn`, `pbk`, `sid`, `type`,
//! `path`, `host`, `serviceName`).

use crate::common::codec::percent_decode;
use crate::common::validate;
use crate::config::{Network, Security, Tls, Transport};
use crate::{Error, Result};

/// Parser knobs surfaced to callers instead of buried as constants.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// When a record enables TLS without an explicit insecure flag,
    /// default `skip_cert_verify` to this value. Upstream subscription
    /// tooling has historically defaulted to `true`; callers that want
    /// strict verification set it to `false`.
    pub insecure_tls_default: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            insecure_tls_default: true,
        }
    }
}

/// Decomposed authority URI payload (everything after `scheme://`).
#[derive(Debug)]
pub struct Authority {
    /// Raw userinfo, not percent-decoded (dialects differ on decoding).
    pub userinfo: Option<String>,
    pub host: String,
    pub port: u16,
    /// Query pairs in source order, values percent-decoded.
    pub query: Vec<(String, String)>,
    /// Percent-decoded fragment, the user-facing display name.
    pub fragment: Option<String>,
}

impl Authority {
    /// First query value for `key`, if present and non-empty.
    pub fn query_get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

/// Split an authority payload, validating server and port jointly.
pub fn split_authority(payload: &str) -> Result<Authority> {
    let (payload, fragment) = match payload.rfind('#') {
        Some(idx) => {
            let name = percent_decode(&payload[idx + 1..]);
            let name = name.trim();
            (
                &payload[..idx],
                if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
            )
        }
        None => (payload, None),
    };

    let (payload, query) = match payload.find('?') {
        Some(idx) => (&payload[..idx], parse_query(&payload[idx + 1..])),
        None => (payload, Vec::new()),
    };

    // Strip an optional path component some generators append.
    let payload = payload.strip_suffix('/').unwrap_or(payload);

    let (userinfo, host_port) = match payload.rfind('@') {
        Some(idx) => (Some(payload[..idx].to_string()), &payload[idx + 1..]),
        None => (None, payload),
    };

    let (host, port) = split_host_port(host_port)?;

    Ok(Authority {
        userinfo,
        host,
        port,
        query,
        fragment,
    })
}

/// Split `host:port`, handling bracketed IPv6 literals. Any failure of
/// the address-shape or range check rejects the whole record.
pub fn split_host_port(input: &str) -> Result<(String, u16)> {
    let (host, port_str) = if let Some(stripped) = input.strip_prefix('[') {
        let end = stripped
            .find(']')
            .ok_or_else(|| Error::server_port(format!("unterminated ipv6 literal: {}", input)))?;
        let host = &stripped[..end];
        let rest = &stripped[end + 1..];
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| Error::server_port(format!("missing port: {}", input)))?;
        (host, port)
    } else {
        input
            .rsplit_once(':')
            .ok_or_else(|| Error::server_port(format!("missing port: {}", input)))?
    };

    if !validate::is_valid_server(host) {
        return Err(Error::server_port(format!("invalid server: {:?}", host)));
    }
    let port = validate::parse_port(port_str)
        .ok_or_else(|| Error::server_port(format!("invalid port: {:?}", port_str)))?;

    Ok((host.to_string(), port))
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), percent_decode(v)),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Query keys consumed by [`security_from_query`] / [`transport_from_query`];
/// everything else is the caller's to interpret or stash in `extra`.
pub const SECURITY_KEYS: &[&str] = &[
    "security",
    "sni",
    "peer",
    "alpn",
    "fp",
    "pbk",
    "sid",
    "allowInsecure",
    "allow_insecure",
    "insecure",
    "skip-cert-verify",
];
pub const TRANSPORT_KEYS: &[&str] = &["type", "path", "host", "serviceName", "ed"];

/// Assemble the security layer from the shared query vocabulary.
///
/// `security=reality` requires both `pbk` and `sid`; missing either is
/// a hard reject. `default_tls` is the dialect's baseline when no
/// `security` key is present (trojan and hysteria2 imply TLS).
pub fn security_from_query(
    authority: &Authority,
    default_tls: bool,
    opts: &ParseOptions,
) -> Result<Security> {
    let mode = authority.query_get("security");
    let tls = match mode {
        Some("reality") => {
            let public_key = authority
                .query_get("pbk")
                .ok_or_else(|| Error::security("reality requires pbk"))?;
            let short_id = authority
                .query_get("sid")
                .ok_or_else(|| Error::security("reality requires sid"))?;
            if hex::decode(short_id).is_err() {
                return Err(Error::security(format!(
                    "reality short id is not hex: {:?}",
                    short_id
                )));
            }
            Tls::Reality {
                public_key: public_key.to_string(),
                short_id: short_id.to_string(),
            }
        }
        Some("tls") => Tls::Tls,
        Some("none") | Some("") => Tls::None,
        Some(other) => {
            return Err(Error::security(format!(
                "unknown security mode: {:?}",
                other
            )))
        }
        None if default_tls => Tls::Tls,
        None => Tls::None,
    };

    let sni = authority
        .query_get("sni")
        .or_else(|| authority.query_get("peer"))
        .map(str::to_string);
    let alpn = authority
        .query_get("alpn")
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let fingerprint = authority.query_get("fp").map(str::to_string);

    let insecure_flag = authority
        .query_get("allowInsecure")
        .or_else(|| authority.query_get("allow_insecure"))
        .or_else(|| authority.query_get("insecure"))
        .or_else(|| authority.query_get("skip-cert-verify"))
        .map(|v| matches!(v, "1" | "true" | "yes" | "on"));
    let skip_cert_verify = match insecure_flag {
        Some(flag) => flag,
        None => tls.enabled() && opts.insecure_tls_default,
    };

    Ok(Security {
        tls,
        sni,
        alpn,
        fingerprint,
        skip_cert_verify,
    })
}

/// Assemble the transport layer from the shared query vocabulary.
pub fn transport_from_query(authority: &Authority) -> Result<Transport> {
    let network = match authority.query_get("type") {
        Some(value) => Network::from_str_opt(value)
            .ok_or_else(|| Error::malformed_scheme(format!("unknown transport: {:?}", value)))?,
        None => Network::Tcp,
    };

    let mut transport = Transport {
        network,
        ..Transport::default()
    };
    match network {
        Network::Ws | Network::H2 | Network::Http => {
            if let Some(path) = authority.query_get("path") {
                transport.set("path", path);
            }
            if let Some(host) = authority.query_get("host") {
                transport.set("host", host);
            }
            if let Some(ed) = authority.query_get("ed") {
                transport.set("early-data", ed);
            }
        }
        Network::Grpc => {
            if let Some(service) = authority.query_get("serviceName") {
                transport.set("service-name", service);
            }
        }
        Network::Tcp => {}
    }

    Ok(transport)
}

/// Leftover query pairs not consumed by the shared tables or the
/// dialect's own key list, preserved as string extras.
pub fn leftover_query(
    authority: &Authority,
    consumed: &[&str],
) -> Vec<(String, serde_json::Value)> {
    authority
        .query
        .iter()
        .filter(|(k, v)| {
            !v.is_empty()
                && !SECURITY_KEYS.contains(&k.as_str())
                && !TRANSPORT_KEYS.contains(&k.as_str())
                && !consumed.contains(&k.as_str())
        })
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}

/// Leftover query pairs for dialects that never consult the shared
/// security/transport vocabulary (snell, ssh, mieru, wireguard).
/// Only the dialect's own keys are excluded, so keys like `sni` ride
/// along in `extra` instead of vanishing on round trip.
pub fn leftover_query_verbatim(
    authority: &Authority,
    consumed: &[&str],
) -> Vec<(String, serde_json::Value)> {
    authority
        .query
        .iter()
        .filter(|(k, v)| !v.is_empty() && !consumed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}
