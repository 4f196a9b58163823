//! Canonical model → sing-box outbound objects
//!
//! Snake-case field names and nested `tls`/`transport` blocks per the
//! sing-box outbound schema. Tags get a short random suffix so two
//! outbounds from identically-named sources stay addressable.

use crate::config::{Credential, Network, Protocol, ProxyConfig, Tls};
use crate::{Error, Result};
use rand::Rng;
use serde_json::{json, Map, Value};

fn outbound_type(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Shadowsocks => "shadowsocks",
        Protocol::ShadowsocksR => "shadowsocksr",
        other => other.as_str(),
    }
}

/// Render one config as a sing-box outbound. The caller supplies the
/// tag prefix (usually the display name); the RNG feeds a 4-hex-char
/// suffix that keeps identically-named outbounds addressable.
pub fn to_singbox_outbound<R: Rng>(config: &ProxyConfig, tag_prefix: &str, rng: &mut R) -> Value {
    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String(outbound_type(config.protocol).to_string()),
    );
    obj.insert(
        "tag".to_string(),
        Value::String(format!("{}-{:04x}", tag_prefix, rng.gen_range(0u32..0x1_0000))),
    );
    obj.insert("server".to_string(), Value::String(config.server.clone()));
    obj.insert("server_port".to_string(), Value::from(config.port));

    credential_fields(config, &mut obj);

    if let Some(tls) = tls_block(config) {
        obj.insert("tls".to_string(), tls);
    }
    if let Some(transport) = transport_block(config) {
        obj.insert("transport".to_string(), transport);
    }

    Value::Object(obj)
}

/// Render a whole `outbounds` document, tagging each outbound with its
/// display name.
pub fn to_singbox_document<R: Rng>(configs: &[ProxyConfig], rng: &mut R) -> Result<String> {
    let outbounds: Vec<Value> = configs
        .iter()
        .map(|c| to_singbox_outbound(c, &c.name, rng))
        .collect();
    serde_json::to_string_pretty(&json!({ "outbounds": outbounds })).map_err(Error::from)
}

fn credential_fields(config: &ProxyConfig, obj: &mut Map<String, Value>) {
    let put_str = |obj: &mut Map<String, Value>, key: &str, value: &str| {
        if !value.is_empty() {
            obj.insert(key.to_string(), Value::String(value.to_string()));
        }
    };

    match &config.credential {
        Credential::Uuid(uuid) => {
            put_str(obj, "uuid", uuid);
            match config.protocol {
                Protocol::Vmess => {
                    obj.insert(
                        "alter_id".to_string(),
                        Value::from(config.extra_int("alterId").unwrap_or(0)),
                    );
                    put_str(obj, "security", config.extra_str("cipher").unwrap_or("auto"));
                }
                Protocol::Vless => {
                    if let Some(flow) = config.extra_str("flow") {
                        put_str(obj, "flow", flow);
                    }
                }
                Protocol::Tuic | Protocol::Juicity => {
                    put_str(obj, "password", config.extra_str("password").unwrap_or(""));
                }
                _ => {}
            }
        }
        Credential::Password(password) => {
            let key = match config.protocol {
                Protocol::Hysteria => "auth_str",
                Protocol::Tuic => "token",
                _ => "password",
            };
            put_str(obj, key, password);
        }
        Credential::CipherPassword { cipher, password } => {
            put_str(obj, "method", cipher);
            put_str(obj, "password", password);
            if let Some(plugin) = config.extra_str("plugin") {
                let opts = config
                    .extra
                    .get("plugin-opts")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                // sing-box wants the SIP003 binary name and the option
                // string separately
                let full = crate::parser::shadowsocks::compose_plugin(plugin, &opts);
                match full.split_once(';') {
                    Some((head, opts_str)) => {
                        put_str(obj, "plugin", head);
                        put_str(obj, "plugin_opts", opts_str);
                    }
                    None => put_str(obj, "plugin", &full),
                }
            }
        }
        Credential::SsrBundle {
            protocol,
            method,
            obfs,
            password,
            obfs_param,
            protocol_param,
        } => {
            put_str(obj, "method", method);
            put_str(obj, "password", password);
            put_str(obj, "protocol", protocol);
            put_str(obj, "protocol_param", protocol_param);
            put_str(obj, "obfs", obfs);
            put_str(obj, "obfs_param", obfs_param);
        }
        Credential::KeyPair {
            private_key,
            public_key,
        } => {
            put_str(obj, "private_key", private_key);
            put_str(obj, "peer_public_key", public_key);
            let addresses: Vec<Value> = ["ip", "ipv6"]
                .iter()
                .filter_map(|k| config.extra_str(k))
                .map(|a| Value::String(a.to_string()))
                .collect();
            if !addresses.is_empty() {
                obj.insert("local_address".to_string(), Value::Array(addresses));
            }
            if let Some(mtu) = config.extra_int("mtu") {
                obj.insert("mtu".to_string(), Value::from(mtu));
            }
            if let Some(reserved) = config.extra_str("reserved") {
                let bytes: Vec<Value> = reserved
                    .split(',')
                    .filter_map(|b| b.trim().parse::<i64>().ok())
                    .map(Value::from)
                    .collect();
                if !bytes.is_empty() {
                    obj.insert("reserved".to_string(), Value::Array(bytes));
                }
            }
            if let Some(psk) = config.extra_str("preshared-key") {
                put_str(obj, "pre_shared_key", psk);
            }
        }
        Credential::UsernamePassword { username, password } => {
            put_str(obj, "user", username);
            put_str(obj, "password", password);
        }
    }

    match config.protocol {
        Protocol::Hysteria => {
            obj.insert(
                "up_mbps".to_string(),
                Value::from(config.extra_int("up").unwrap_or(50)),
            );
            obj.insert(
                "down_mbps".to_string(),
                Value::from(config.extra_int("down").unwrap_or(100)),
            );
            if let Some(obfs) = config.extra_str("obfs") {
                obj.insert("obfs".to_string(), Value::String(obfs.to_string()));
            }
        }
        Protocol::Hysteria2 => {
            for (key, wire) in [("up", "up_mbps"), ("down", "down_mbps")] {
                if let Some(mbps) = config.extra_int(key) {
                    obj.insert(wire.to_string(), Value::from(mbps));
                }
            }
            if let Some(obfs) = config.extra_str("obfs") {
                let mut block = Map::new();
                block.insert("type".to_string(), Value::String(obfs.to_string()));
                if let Some(password) = config.extra_str("obfs-password") {
                    block.insert(
                        "password".to_string(),
                        Value::String(password.to_string()),
                    );
                }
                obj.insert("obfs".to_string(), Value::Object(block));
            }
        }
        Protocol::Tuic | Protocol::Juicity => {
            if let Some(cc) = config.extra_str("congestion-control") {
                obj.insert(
                    "congestion_control".to_string(),
                    Value::String(cc.to_string()),
                );
            }
            if let Some(mode) = config.extra_str("udp-relay-mode") {
                obj.insert(
                    "udp_relay_mode".to_string(),
                    Value::String(mode.to_string()),
                );
            }
        }
        _ => {}
    }
}

fn tls_block(config: &ProxyConfig) -> Option<Value> {
    let security = &config.security;
    if !security.tls.enabled() {
        return None;
    }
    let mut block = Map::new();
    block.insert("enabled".to_string(), Value::Bool(true));
    if let Some(sni) = &security.sni {
        block.insert("server_name".to_string(), Value::String(sni.clone()));
    }
    if security.skip_cert_verify {
        block.insert("insecure".to_string(), Value::Bool(true));
    }
    if !security.alpn.is_empty() {
        block.insert(
            "alpn".to_string(),
            Value::Array(
                security
                    .alpn
                    .iter()
                    .map(|a| Value::String(a.clone()))
                    .collect(),
            ),
        );
    }
    if let Some(fp) = &security.fingerprint {
        block.insert(
            "utls".to_string(),
            json!({ "enabled": true, "fingerprint": fp }),
        );
    }
    if let Tls::Reality {
        public_key,
        short_id,
    } = &security.tls
    {
        block.insert(
            "reality".to_string(),
            json!({ "enabled": true, "public_key": public_key, "short_id": short_id }),
        );
    }
    Some(Value::Object(block))
}

fn transport_block(config: &ProxyConfig) -> Option<Value> {
    let transport = &config.transport;
    let mut block = Map::new();
    match transport.network {
        Network::Tcp => return None,
        Network::Ws => {
            block.insert("type".to_string(), Value::String("ws".to_string()));
            if let Some(path) = transport.get("path") {
                block.insert("path".to_string(), Value::String(path.to_string()));
            }
            if let Some(host) = transport.get("host") {
                block.insert("headers".to_string(), json!({ "Host": host }));
            }
            if let Some(ed) = transport.get("early-data").and_then(|e| e.parse::<i64>().ok()) {
                block.insert("max_early_data".to_string(), Value::from(ed));
            }
        }
        Network::Grpc => {
            block.insert("type".to_string(), Value::String("grpc".to_string()));
            if let Some(service) = transport.get("service-name") {
                block.insert(
                    "service_name".to_string(),
                    Value::String(service.to_string()),
                );
            }
        }
        Network::H2 | Network::Http => {
            block.insert("type".to_string(), Value::String("http".to_string()));
            if let Some(path) = transport.get("path") {
                block.insert("path".to_string(), Value::String(path.to_string()));
            }
            if let Some(host) = transport.get("host") {
                block.insert(
                    "host".to_string(),
                    Value::Array(vec![Value::String(host.to_string())]),
                );
            }
        }
    }
    Some(Value::Object(block))
}
