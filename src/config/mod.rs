//! Canonical proxy-config model
//!
//! Every dialect parser converges on [`ProxyConfig`]; every serializer
//! starts from it. The model is a closed tagged union per field so the
//! codecs can match exhaustively instead of probing a string map.

use crate::common::validate;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Supported proxy protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vless,
    Vmess,
    Shadowsocks,
    ShadowsocksR,
    Trojan,
    Hysteria,
    Hysteria2,
    Tuic,
    Wireguard,
    Snell,
    Ssh,
    Mieru,
    Anytls,
    Juicity,
}

impl Protocol {
    /// Canonical short name; doubles as the Clash `type` value and the
    /// URI scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Vless => "vless",
            Protocol::Vmess => "vmess",
            Protocol::Shadowsocks => "ss",
            Protocol::ShadowsocksR => "ssr",
            Protocol::Trojan => "trojan",
            Protocol::Hysteria => "hysteria",
            Protocol::Hysteria2 => "hysteria2",
            Protocol::Tuic => "tuic",
            Protocol::Wireguard => "wireguard",
            Protocol::Snell => "snell",
            Protocol::Ssh => "ssh",
            Protocol::Mieru => "mieru",
            Protocol::Anytls => "anytls",
            Protocol::Juicity => "juicity",
        }
    }

    /// Resolve a URI scheme (including aliases) to a protocol.
    pub fn from_scheme(scheme: &str) -> Option<Protocol> {
        match scheme {
            "vless" => Some(Protocol::Vless),
            "vmess" => Some(Protocol::Vmess),
            "ss" | "shadowsocks" => Some(Protocol::Shadowsocks),
            "ssr" | "shadowsocksr" => Some(Protocol::ShadowsocksR),
            "trojan" => Some(Protocol::Trojan),
            "hysteria" | "hy" => Some(Protocol::Hysteria),
            "hysteria2" | "hy2" => Some(Protocol::Hysteria2),
            "tuic" => Some(Protocol::Tuic),
            "wireguard" | "wg" => Some(Protocol::Wireguard),
            "snell" => Some(Protocol::Snell),
            "ssh" => Some(Protocol::Ssh),
            "mieru" => Some(Protocol::Mieru),
            "anytls" => Some(Protocol::Anytls),
            "juicity" => Some(Protocol::Juicity),
            _ => None,
        }
    }

    /// Resolve a Clash proxy `type` value.
    pub fn from_clash_type(value: &str) -> Option<Protocol> {
        Protocol::from_scheme(value)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol-dependent credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Credential {
    /// RFC-4122 hex-dash UUID (vless/vmess/tuic/juicity).
    Uuid(String),
    /// Opaque password or token (trojan/hysteria/hysteria2/anytls/snell,
    /// tuic v4 token).
    Password(String),
    /// Shadowsocks cipher + password.
    CipherPassword { cipher: String, password: String },
    /// ShadowsocksR obfuscation bundle.
    SsrBundle {
        protocol: String,
        method: String,
        obfs: String,
        password: String,
        obfs_param: String,
        protocol_param: String,
    },
    /// WireGuard key pair, base64-encoded X25519 keys.
    KeyPair {
        private_key: String,
        public_key: String,
    },
    /// SSH / mieru login.
    UsernamePassword { username: String, password: String },
}

/// Transport network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Tcp,
    Ws,
    Grpc,
    H2,
    Http,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Ws => "ws",
            Network::Grpc => "grpc",
            Network::H2 => "h2",
            Network::Http => "http",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Network> {
        match s {
            "tcp" => Some(Network::Tcp),
            "ws" | "websocket" => Some(Network::Ws),
            "grpc" | "gun" => Some(Network::Grpc),
            "h2" => Some(Network::H2),
            "http" => Some(Network::Http),
            _ => None,
        }
    }
}

/// Transport layer: network plus network-specific options.
///
/// Option keys are canonical: `path`, `host`, `service-name`,
/// `early-data`. Serializers map them to the target dialect's names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Transport {
    pub network: Network,
    pub options: BTreeMap<String, String>,
}

impl Transport {
    pub fn tcp() -> Self {
        Transport::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        let value = value.into();
        if !value.is_empty() {
            self.options.insert(key.into(), value);
        }
    }
}

/// TLS layer variant. Reality carries its required fields so a
/// half-configured reality block cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Tls {
    #[default]
    None,
    Tls,
    Reality {
        public_key: String,
        short_id: String,
    },
}

impl Tls {
    pub fn enabled(&self) -> bool {
        !matches!(self, Tls::None)
    }
}

/// Security layer: TLS variant plus handshake parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Security {
    pub tls: Tls,
    pub sni: Option<String>,
    pub alpn: Vec<String>,
    pub fingerprint: Option<String>,
    pub skip_cert_verify: bool,
}

impl Security {
    pub fn none() -> Self {
        Security::default()
    }

    pub fn tls() -> Self {
        Security {
            tls: Tls::Tls,
            ..Security::default()
        }
    }
}

/// Canonical proxy configuration.
///
/// Created exclusively by a dialect parser; immutable afterwards except
/// for `name`, which the renamer may rewrite once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyConfig {
    pub protocol: Protocol,
    pub server: String,
    pub port: u16,
    pub credential: Credential,
    pub transport: Transport,
    pub security: Security,
    pub name: String,
    /// Protocol-specific fields with no dedicated slot, preserved for
    /// round-trip fidelity (obfs, congestion control, amnezia tunables).
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProxyConfig {
    /// Display label synthesized when the source carries none.
    pub fn synthesized_name(protocol: Protocol, server: &str) -> String {
        format!("{}-{}", protocol.as_str(), server)
    }

    /// Structural acceptance check, applied after parsing as defense in
    /// depth. Confirms server/port shape, credential-protocol pairing
    /// and credential formats.
    pub fn validate(&self) -> Result<()> {
        if !validate::is_valid_server(&self.server) {
            return Err(Error::server_port(format!(
                "invalid server address: {:?}",
                self.server
            )));
        }
        if self.port == 0 {
            return Err(Error::server_port("port must be 1-65535"));
        }

        match (&self.protocol, &self.credential) {
            (Protocol::Vless | Protocol::Vmess | Protocol::Juicity, Credential::Uuid(id)) => {
                if !validate::is_valid_uuid(id) {
                    return Err(Error::credential(format!("invalid uuid: {:?}", id)));
                }
            }
            (Protocol::Tuic, Credential::Uuid(id)) => {
                if !validate::is_valid_uuid(id) {
                    return Err(Error::credential(format!("invalid uuid: {:?}", id)));
                }
            }
            (Protocol::Tuic, Credential::Password(token)) => {
                if token.is_empty() {
                    return Err(Error::credential("empty tuic token"));
                }
            }
            (
                Protocol::Trojan
                | Protocol::Hysteria
                | Protocol::Hysteria2
                | Protocol::Anytls
                | Protocol::Snell,
                Credential::Password(pw),
            ) => {
                if pw.is_empty() {
                    return Err(Error::credential("empty password"));
                }
            }
            (Protocol::Shadowsocks, Credential::CipherPassword { cipher, .. }) => {
                if !validate::is_supported_cipher(cipher) {
                    return Err(Error::credential(format!("unsupported cipher: {}", cipher)));
                }
            }
            (Protocol::ShadowsocksR, Credential::SsrBundle { .. }) => {}
            (Protocol::Wireguard, Credential::KeyPair { private_key, public_key }) => {
                if private_key.is_empty() || public_key.is_empty() {
                    return Err(Error::credential("wireguard keys must be present"));
                }
            }
            (Protocol::Ssh | Protocol::Mieru, Credential::UsernamePassword { username, .. }) => {
                if username.is_empty() {
                    return Err(Error::credential("empty username"));
                }
            }
            (protocol, credential) => {
                return Err(Error::credential(format!(
                    "credential variant does not match protocol {}: {:?}",
                    protocol, credential
                )));
            }
        }

        Ok(())
    }

    /// Canonical identity, independent of the display name. Two configs
    /// with the same key are duplicates even when their raw URIs carry
    /// different name fragments.
    pub fn dedup_key(&self) -> String {
        #[derive(Serialize)]
        struct Identity<'a> {
            protocol: Protocol,
            server: &'a str,
            port: u16,
            credential: &'a Credential,
            transport: &'a Transport,
            security: &'a Security,
            extra: &'a BTreeMap<String, serde_json::Value>,
        }
        // BTreeMap fields keep the output deterministic.
        serde_json::to_string(&Identity {
            protocol: self.protocol,
            server: &self.server,
            port: self.port,
            credential: &self.credential,
            transport: &self.transport,
            security: &self.security,
            extra: &self.extra,
        })
        .unwrap_or_else(|_| format!("{}://{}:{}", self.protocol, self.server, self.port))
    }

    /// String accessor for `extra`.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }

    /// Integer accessor for `extra`, tolerating string-typed numbers.
    pub fn extra_int(&self, key: &str) -> Option<i64> {
        match self.extra.get(key)? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}
