//! Clash `proxies:` dictionaries → canonical model
//!
//! A proxy entry with an unrecognized `type` is skipped (`Ok(None)`)
//! rather than rejected, so mixed documents degrade per entry. Fields
//! with no dedicated slot land in `extra` with their YAML types intact.

use super::authority::ParseOptions;
use super::shadowsocks::decompose_plugin;
use super::wireguard::derive_public_key;
use crate::common::validate;
use crate::config::{
    Credential, Network, Protocol, ProxyConfig, Security, Tls, Transport,
};
use crate::{Error, Result};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Keys consumed by the shared server/security/transport plumbing.
const COMMON_KEYS: &[&str] = &[
    "name",
    "type",
    "server",
    "port",
    "tls",
    "sni",
    "servername",
    "alpn",
    "skip-cert-verify",
    "client-fingerprint",
    "fingerprint",
    "reality-opts",
    "network",
    "ws-opts",
    "grpc-opts",
    "h2-opts",
    "http-opts",
    "ws-path",
    "ws-headers",
];

/// Convert a single Clash proxy mapping. Returns `Ok(None)` when the
/// `type` names a protocol outside the supported set.
pub fn parse_proxy(value: &Value, opts: &ParseOptions) -> Result<Option<ProxyConfig>> {
    let map = value
        .as_mapping()
        .ok_or_else(|| Error::config("proxy entry is not a mapping"))?;

    let kind = require_str(map, "type")?;
    let protocol = match Protocol::from_clash_type(&kind) {
        Some(p) => p,
        None => return Ok(None),
    };

    let server = require_str(map, "server")?;
    if !validate::is_valid_server(&server) {
        return Err(Error::server_port(format!(
            "invalid server address: {:?}",
            server
        )));
    }
    let port = get_str(map, "port")
        .and_then(|p| validate::parse_port(&p))
        .ok_or_else(|| Error::server_port("missing or out-of-range port"))?;

    let mut extra = BTreeMap::new();
    let credential = credential_for(protocol, map, &mut extra)?;
    let consumed = collect_extras(protocol, map, &mut extra)?;

    let tls_implied = matches!(
        protocol,
        Protocol::Trojan
            | Protocol::Hysteria
            | Protocol::Hysteria2
            | Protocol::Tuic
            | Protocol::Juicity
            | Protocol::Anytls
    );
    let security = match protocol {
        Protocol::Wireguard | Protocol::Snell | Protocol::Ssh | Protocol::Mieru => {
            Security::none()
        }
        _ => security_from_map(map, tls_implied, opts)?,
    };
    let transport = match protocol {
        Protocol::Vless | Protocol::Vmess | Protocol::Trojan => transport_from_map(map)?,
        _ => Transport::tcp(),
    };

    // Anything not consumed above rides along verbatim.
    for (key, val) in map {
        let Some(key) = key.as_str() else { continue };
        if COMMON_KEYS.contains(&key) || consumed.contains(&key) {
            continue;
        }
        if let Ok(json) = serde_json::to_value(val) {
            extra.entry(key.to_string()).or_insert(json);
        }
    }

    let name = get_str(map, "name")
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| ProxyConfig::synthesized_name(protocol, &server));

    Ok(Some(ProxyConfig {
        protocol,
        server,
        port,
        credential,
        transport,
        security,
        name,
        extra,
    }))
}

fn credential_for(
    protocol: Protocol,
    map: &Mapping,
    extra: &mut BTreeMap<String, serde_json::Value>,
) -> Result<Credential> {
    match protocol {
        Protocol::Vless | Protocol::Vmess | Protocol::Juicity => {
            let uuid = require_str(map, "uuid")?;
            if !validate::is_valid_uuid(&uuid) {
                return Err(Error::credential(format!("invalid uuid: {:?}", uuid)));
            }
            if protocol == Protocol::Juicity {
                let password = require_str(map, "password")?;
                extra.insert("password".to_string(), serde_json::Value::String(password));
            }
            Ok(Credential::Uuid(uuid))
        }
        Protocol::Tuic => match get_str(map, "uuid") {
            Some(uuid) => {
                if !validate::is_valid_uuid(&uuid) {
                    return Err(Error::credential(format!("invalid tuic uuid: {:?}", uuid)));
                }
                let password = require_str(map, "password")?;
                extra.insert("password".to_string(), serde_json::Value::String(password));
                Ok(Credential::Uuid(uuid))
            }
            None => {
                let token = require_str(map, "token")?;
                Ok(Credential::Password(token))
            }
        },
        Protocol::Trojan | Protocol::Hysteria2 | Protocol::Anytls => {
            Ok(Credential::Password(require_str(map, "password")?))
        }
        Protocol::Hysteria => {
            let auth = get_str(map, "auth-str")
                .or_else(|| get_str(map, "auth_str"))
                .filter(|a| !a.is_empty())
                .ok_or_else(|| Error::credential("hysteria entry has no auth-str"))?;
            Ok(Credential::Password(auth))
        }
        Protocol::Snell => Ok(Credential::Password(require_str(map, "psk")?)),
        Protocol::Shadowsocks => {
            let cipher = validate::normalize_cipher(&require_str(map, "cipher")?);
            if !validate::is_supported_cipher(&cipher) {
                return Err(Error::credential(format!("unsupported cipher: {:?}", cipher)));
            }
            Ok(Credential::CipherPassword {
                cipher,
                password: require_str(map, "password")?,
            })
        }
        Protocol::ShadowsocksR => Ok(Credential::SsrBundle {
            protocol: require_str(map, "protocol")?,
            method: require_str(map, "cipher")?,
            obfs: require_str(map, "obfs")?,
            password: require_str(map, "password")?,
            obfs_param: get_str(map, "obfs-param").unwrap_or_default(),
            protocol_param: get_str(map, "protocol-param").unwrap_or_default(),
        }),
        Protocol::Wireguard => {
            let private_key = require_str(map, "private-key")?;
            let public_key = match get_str(map, "public-key") {
                Some(pk) => pk,
                None => derive_public_key(&private_key)?,
            };
            Ok(Credential::KeyPair {
                private_key,
                public_key,
            })
        }
        Protocol::Ssh | Protocol::Mieru => Ok(Credential::UsernamePassword {
            username: require_str(map, "username")?,
            password: get_str(map, "password").unwrap_or_default(),
        }),
    }
}

/// Move protocol-specific fields into `extra` under their canonical
/// keys. Returns the Clash keys consumed so the verbatim pass skips
/// them.
fn collect_extras(
    protocol: Protocol,
    map: &Mapping,
    extra: &mut BTreeMap<String, serde_json::Value>,
) -> Result<Vec<&'static str>> {
    use serde_json::Value as Json;

    let mut consumed: Vec<&'static str> = Vec::new();
    let copy_str = |clash_key: &'static str,
                        canonical: &'static str,
                        consumed: &mut Vec<&'static str>,
                        extra: &mut BTreeMap<String, Json>| {
        consumed.push(clash_key);
        if let Some(v) = get_str(map, clash_key).filter(|v| !v.is_empty()) {
            extra.insert(canonical.to_string(), Json::String(v));
        }
    };

    match protocol {
        Protocol::Vmess => {
            consumed.extend(["uuid", "alterId", "cipher"]);
            let alter_id = get_i64(map, "alterId").unwrap_or(0);
            extra.insert("alterId".to_string(), Json::from(alter_id));
            let cipher = super::vmess::fold_cipher(get_str(map, "cipher").unwrap_or_default());
            extra.insert("cipher".to_string(), Json::String(cipher));
        }
        Protocol::Vless => {
            consumed.push("uuid");
            copy_str("flow", "flow", &mut consumed, extra);
        }
        Protocol::Shadowsocks => {
            consumed.extend(["cipher", "password", "plugin", "plugin-opts"]);
            if let Some(plugin) = get_str(map, "plugin").filter(|p| !p.is_empty()) {
                // Clash already splits the plugin; fold legacy names to
                // the canonical ones so both ingest paths agree.
                let (name, _) = decompose_plugin(&plugin);
                extra.insert("plugin".to_string(), Json::String(name));
                if let Some(opts) = map.get("plugin-opts") {
                    if let Ok(Json::Object(obj)) = serde_json::to_value(opts) {
                        if !obj.is_empty() {
                            extra.insert("plugin-opts".to_string(), Json::Object(obj));
                        }
                    }
                }
            }
        }
        Protocol::ShadowsocksR => {
            consumed.extend([
                "cipher",
                "password",
                "protocol",
                "obfs",
                "obfs-param",
                "protocol-param",
            ]);
            copy_str("group", "group", &mut consumed, extra);
        }
        Protocol::Trojan | Protocol::Anytls => {
            consumed.push("password");
        }
        Protocol::Hysteria => {
            consumed.extend(["auth-str", "auth_str", "up", "down"]);
            extra.insert("up".to_string(), Json::from(get_mbps(map, "up").unwrap_or(50)));
            extra.insert(
                "down".to_string(),
                Json::from(get_mbps(map, "down").unwrap_or(100)),
            );
            copy_str("obfs", "obfs", &mut consumed, extra);
            copy_str("protocol", "protocol", &mut consumed, extra);
            copy_str("obfs-param", "obfs-param", &mut consumed, extra);
        }
        Protocol::Hysteria2 => {
            consumed.extend(["password", "up", "down"]);
            for key in ["up", "down"] {
                if let Some(mbps) = get_mbps(map, key) {
                    extra.insert(key.to_string(), Json::from(mbps));
                }
            }
            copy_str("obfs", "obfs", &mut consumed, extra);
            copy_str("obfs-password", "obfs-password", &mut consumed, extra);
            copy_str("ports", "ports", &mut consumed, extra);
            copy_str("pinSHA256", "pinSHA256", &mut consumed, extra);
        }
        Protocol::Tuic | Protocol::Juicity => {
            consumed.extend(["uuid", "password", "token"]);
            copy_str("congestion-controller", "congestion-control", &mut consumed, extra);
            copy_str("congestion-control", "congestion-control", &mut consumed, extra);
            copy_str("udp-relay-mode", "udp-relay-mode", &mut consumed, extra);
            consumed.extend(["disable-sni", "version"]);
            if let Some(v) = get_str(map, "disable-sni") {
                extra.insert("disable-sni".to_string(), Json::String(v));
            }
            if let Some(v) = get_str(map, "version") {
                extra.insert("version".to_string(), Json::String(v));
            }
        }
        Protocol::Wireguard => {
            consumed.extend(["private-key", "public-key", "reserved", "pre-shared-key"]);
            copy_str("ip", "ip", &mut consumed, extra);
            copy_str("ipv6", "ipv6", &mut consumed, extra);
            if !extra.contains_key("ip") && !extra.contains_key("ipv6") {
                return Err(Error::credential("wireguard proxy has no local address"));
            }
            for key in ["mtu", "jc", "jmin", "jmax", "s1", "s2", "h1", "h2", "h3", "h4"] {
                if let Some(n) = get_i64(map, key) {
                    extra.insert(key.to_string(), Json::from(n));
                }
            }
            consumed.extend(["mtu", "jc", "jmin", "jmax", "s1", "s2", "h1", "h2", "h3", "h4"]);
            if let Some(reserved) = map.get("reserved") {
                // string "1,2,3" or a YAML list of bytes
                let joined = match reserved {
                    Value::String(s) => Some(s.clone()),
                    Value::Sequence(seq) => Some(
                        seq.iter()
                            .filter_map(|v| v.as_i64())
                            .map(|n| n.to_string())
                            .collect::<Vec<_>>()
                            .join(","),
                    ),
                    _ => None,
                };
                if let Some(joined) = joined.filter(|j| !j.is_empty()) {
                    extra.insert("reserved".to_string(), Json::String(joined));
                }
            }
            if let Some(psk) = get_str(map, "pre-shared-key").filter(|p| !p.is_empty()) {
                extra.insert("preshared-key".to_string(), Json::String(psk));
            }
        }
        Protocol::Snell => {
            consumed.extend(["psk", "version", "obfs-opts"]);
            if let Some(v) = get_i64(map, "version") {
                extra.insert("version".to_string(), Json::from(v));
            }
            if let Some(opts) = map.get("obfs-opts").and_then(Value::as_mapping) {
                if let Some(mode) = get_str(opts, "mode").filter(|m| !m.is_empty()) {
                    extra.insert("obfs".to_string(), Json::String(mode));
                }
                if let Some(host) = get_str(opts, "host").filter(|h| !h.is_empty()) {
                    extra.insert("obfs-host".to_string(), Json::String(host));
                }
            }
        }
        Protocol::Ssh => {
            consumed.extend(["username", "password"]);
            copy_str("private-key", "private-key", &mut consumed, extra);
            copy_str("host-key", "host-key", &mut consumed, extra);
        }
        Protocol::Mieru => {
            consumed.extend(["username", "password"]);
            copy_str("transport", "transport", &mut consumed, extra);
            copy_str("multiplexing", "multiplexing", &mut consumed, extra);
        }
    }
    Ok(consumed)
}

fn security_from_map(map: &Mapping, tls_implied: bool, opts: &ParseOptions) -> Result<Security> {
    let reality = match map.get("reality-opts").and_then(Value::as_mapping) {
        Some(ro) => {
            let public_key = get_str(ro, "public-key").filter(|k| !k.is_empty());
            let short_id = get_str(ro, "short-id").filter(|s| !s.is_empty());
            match (public_key, short_id) {
                (Some(public_key), Some(short_id)) => {
                    if !short_id.chars().all(|c| c.is_ascii_hexdigit()) {
                        return Err(Error::security("reality short-id is not hex"));
                    }
                    Some(Tls::Reality {
                        public_key,
                        short_id,
                    })
                }
                _ => {
                    return Err(Error::security(
                        "reality-opts requires both public-key and short-id",
                    ))
                }
            }
        }
        None => None,
    };

    let tls = match reality {
        Some(reality) => reality,
        None if tls_implied || get_bool(map, "tls").unwrap_or(false) => Tls::Tls,
        None => Tls::None,
    };

    let sni = get_str(map, "sni")
        .or_else(|| get_str(map, "servername"))
        .filter(|s| !s.is_empty());
    let alpn = match map.get("alpn") {
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split(',').map(|p| p.trim().to_string()).collect(),
        _ => Vec::new(),
    };
    let fingerprint = get_str(map, "client-fingerprint").filter(|f| !f.is_empty());
    let skip_cert_verify = match get_bool(map, "skip-cert-verify") {
        Some(explicit) => explicit,
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

fn transport_from_map(map: &Mapping) -> Result<Transport> {
    let network = match get_str(map, "network") {
        Some(n) => Network::from_str_opt(&n)
            .ok_or_else(|| Error::config(format!("unknown network: {:?}", n)))?,
        None => Network::Tcp,
    };
    let mut transport = Transport {
        network,
        options: BTreeMap::new(),
    };

    match network {
        Network::Ws => {
            if let Some(ws) = map.get("ws-opts").and_then(Value::as_mapping) {
                if let Some(path) = get_str(ws, "path") {
                    transport.set("path", path);
                }
                if let Some(headers) = ws.get("headers").and_then(Value::as_mapping) {
                    if let Some(host) = get_str(headers, "Host").or_else(|| get_str(headers, "host"))
                    {
                        transport.set("host", host);
                    }
                }
                if let Some(ed) = get_i64(ws, "max-early-data") {
                    transport.set("early-data", ed.to_string());
                }
            }
            // legacy flat spelling
            if transport.get("path").is_none() {
                if let Some(path) = get_str(map, "ws-path") {
                    transport.set("path", path);
                }
            }
            if transport.get("host").is_none() {
                if let Some(headers) = map.get("ws-headers").and_then(Value::as_mapping) {
                    if let Some(host) = get_str(headers, "Host").or_else(|| get_str(headers, "host"))
                    {
                        transport.set("host", host);
                    }
                }
            }
        }
        Network::Grpc => {
            if let Some(grpc) = map.get("grpc-opts").and_then(Value::as_mapping) {
                if let Some(service) = get_str(grpc, "grpc-service-name") {
                    transport.set("service-name", service);
                }
            }
        }
        Network::H2 | Network::Http => {
            let key = if network == Network::H2 {
                "h2-opts"
            } else {
                "http-opts"
            };
            if let Some(opts) = map.get(key).and_then(Value::as_mapping) {
                if let Some(path) = get_str(opts, "path") {
                    transport.set("path", path);
                }
                match opts.get("host") {
                    Some(Value::Sequence(seq)) => {
                        if let Some(host) = seq.iter().filter_map(Value::as_str).next() {
                            transport.set("host", host);
                        }
                    }
                    Some(Value::String(host)) => transport.set("host", host.clone()),
                    _ => {}
                }
            }
        }
        Network::Tcp => {}
    }

    Ok(transport)
}

fn get_str(map: &Mapping, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn require_str(map: &Mapping, key: &str) -> Result<String> {
    get_str(map, key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::config(format!("proxy entry missing {:?}", key)))
}

fn get_i64(map: &Mapping, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn get_bool(map: &Mapping, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Bandwidth values appear as bare integers or as "<n> Mbps" strings.
fn get_mbps(map: &Mapping, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s
            .trim()
            .split_whitespace()
            .next()
            .and_then(|head| head.parse().ok()),
        _ => None,
    }
}
