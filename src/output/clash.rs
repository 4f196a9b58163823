//! Canonical model → Clash proxy mappings
//!
//! Field spellings follow the mihomo schema: `servername` for the
//! vmess/vless SNI, `sni` elsewhere, nested `*-opts` blocks for
//! transports and reality.

use crate::config::{Credential, Network, Protocol, ProxyConfig, Tls};
use crate::{Error, Result};
use serde_yaml::{Mapping, Value};

/// Extra keys that get a dedicated Clash slot; everything else is
/// copied through verbatim.
fn claimed_keys(protocol: Protocol) -> &'static [&'static str] {
    match protocol {
        Protocol::Vmess => &["alterId", "cipher"],
        Protocol::Vless => &["flow"],
        Protocol::Shadowsocks => &["plugin", "plugin-opts"],
        Protocol::Hysteria => &["up", "down", "obfs", "obfs-param", "protocol"],
        Protocol::Hysteria2 => &["up", "down", "obfs", "obfs-password", "ports", "pinSHA256"],
        Protocol::Tuic | Protocol::Juicity => &[
            "password",
            "congestion-control",
            "udp-relay-mode",
            "disable-sni",
            "version",
        ],
        Protocol::Wireguard => &["ip", "ipv6", "reserved", "preshared-key"],
        Protocol::Snell => &["version", "obfs", "obfs-host"],
        Protocol::Ssh => &["private-key", "host-key"],
        Protocol::Mieru => &["transport", "multiplexing"],
        _ => &[],
    }
}

/// Render one config as a Clash proxy mapping.
pub fn to_clash_value(config: &ProxyConfig) -> Value {
    let mut map = Mapping::new();
    put(&mut map, "name", Value::String(config.name.clone()));
    put(
        &mut map,
        "type",
        Value::String(config.protocol.as_str().to_string()),
    );
    put(&mut map, "server", Value::String(config.server.clone()));
    put(&mut map, "port", Value::Number(config.port.into()));

    credential_fields(config, &mut map);
    transport_fields(config, &mut map);
    security_fields(config, &mut map);

    let claimed = claimed_keys(config.protocol);
    for (key, value) in &config.extra {
        if claimed.contains(&key.as_str()) {
            continue;
        }
        if let Ok(yaml) = serde_yaml::to_value(value) {
            map.entry(Value::String(key.clone())).or_insert(yaml);
        }
    }

    Value::Mapping(map)
}

/// Render a whole `proxies:` document.
pub fn to_clash_document(configs: &[ProxyConfig]) -> Result<String> {
    let proxies: Vec<Value> = configs.iter().map(to_clash_value).collect();
    let mut root = Mapping::new();
    root.insert(
        Value::String("proxies".to_string()),
        Value::Sequence(proxies),
    );
    serde_yaml::to_string(&Value::Mapping(root)).map_err(Error::from)
}

fn credential_fields(config: &ProxyConfig, map: &mut Mapping) {
    match &config.credential {
        Credential::Uuid(uuid) => {
            put(map, "uuid", Value::String(uuid.clone()));
            match config.protocol {
                Protocol::Vmess => {
                    put(
                        map,
                        "alterId",
                        Value::Number(config.extra_int("alterId").unwrap_or(0).into()),
                    );
                    put(
                        map,
                        "cipher",
                        Value::String(config.extra_str("cipher").unwrap_or("auto").to_string()),
                    );
                }
                Protocol::Vless => {
                    if let Some(flow) = config.extra_str("flow") {
                        put(map, "flow", Value::String(flow.to_string()));
                    }
                }
                Protocol::Tuic | Protocol::Juicity => {
                    if let Some(password) = config.extra_str("password") {
                        put(map, "password", Value::String(password.to_string()));
                    }
                }
                _ => {}
            }
        }
        Credential::Password(password) => {
            let key = match config.protocol {
                Protocol::Hysteria => "auth-str",
                Protocol::Snell => "psk",
                Protocol::Tuic => "token",
                _ => "password",
            };
            put(map, key, Value::String(password.clone()));
        }
        Credential::CipherPassword { cipher, password } => {
            put(map, "cipher", Value::String(cipher.clone()));
            put(map, "password", Value::String(password.clone()));
            if let Some(plugin) = config.extra_str("plugin") {
                put(map, "plugin", Value::String(plugin.to_string()));
                if let Some(opts) = config.extra.get("plugin-opts") {
                    if let Ok(yaml) = serde_yaml::to_value(opts) {
                        put(map, "plugin-opts", yaml);
                    }
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
            put(map, "cipher", Value::String(method.clone()));
            put(map, "password", Value::String(password.clone()));
            put(map, "protocol", Value::String(protocol.clone()));
            put(map, "obfs", Value::String(obfs.clone()));
            if !protocol_param.is_empty() {
                put(map, "protocol-param", Value::String(protocol_param.clone()));
            }
            if !obfs_param.is_empty() {
                put(map, "obfs-param", Value::String(obfs_param.clone()));
            }
        }
        Credential::KeyPair {
            private_key,
            public_key,
        } => {
            put(map, "private-key", Value::String(private_key.clone()));
            put(map, "public-key", Value::String(public_key.clone()));
            for key in ["ip", "ipv6", "reserved"] {
                if let Some(v) = config.extra_str(key) {
                    put(map, key, Value::String(v.to_string()));
                }
            }
            if let Some(psk) = config.extra_str("preshared-key") {
                put(map, "pre-shared-key", Value::String(psk.to_string()));
            }
        }
        Credential::UsernamePassword { username, password } => {
            put(map, "username", Value::String(username.clone()));
            if !password.is_empty() {
                put(map, "password", Value::String(password.clone()));
            }
        }
    }

    // remaining slotted extras
    match config.protocol {
        Protocol::Hysteria | Protocol::Hysteria2 => {
            for key in ["up", "down"] {
                if let Some(mbps) = config.extra_int(key) {
                    put(map, key, Value::Number(mbps.into()));
                }
            }
            for key in ["obfs", "obfs-param", "protocol", "obfs-password", "ports", "pinSHA256"] {
                if claimed_keys(config.protocol).contains(&key) {
                    if let Some(v) = config.extra_str(key) {
                        put(map, key, Value::String(v.to_string()));
                    }
                }
            }
        }
        Protocol::Tuic | Protocol::Juicity => {
            for key in ["congestion-control", "udp-relay-mode", "disable-sni", "version"] {
                if let Some(v) = config.extra_str(key) {
                    put(map, key, Value::String(v.to_string()));
                }
            }
        }
        Protocol::Snell => {
            if let Some(version) = config.extra_int("version") {
                put(map, "version", Value::Number(version.into()));
            }
            let mode = config.extra_str("obfs");
            let host = config.extra_str("obfs-host");
            if mode.is_some() || host.is_some() {
                let mut opts = Mapping::new();
                if let Some(mode) = mode {
                    put(&mut opts, "mode", Value::String(mode.to_string()));
                }
                if let Some(host) = host {
                    put(&mut opts, "host", Value::String(host.to_string()));
                }
                put(map, "obfs-opts", Value::Mapping(opts));
            }
        }
        Protocol::Ssh => {
            for key in ["private-key", "host-key"] {
                if let Some(v) = config.extra_str(key) {
                    put(map, key, Value::String(v.to_string()));
                }
            }
        }
        Protocol::Mieru => {
            for key in ["transport", "multiplexing"] {
                if let Some(v) = config.extra_str(key) {
                    put(map, key, Value::String(v.to_string()));
                }
            }
        }
        _ => {}
    }
}

fn transport_fields(config: &ProxyConfig, map: &mut Mapping) {
    let transport = &config.transport;
    if transport.network == Network::Tcp {
        return;
    }
    put(
        map,
        "network",
        Value::String(transport.network.as_str().to_string()),
    );
    match transport.network {
        Network::Ws => {
            let mut ws = Mapping::new();
            // clash always spells out the path; default is the root
            let path = transport.get("path").unwrap_or("/");
            put(&mut ws, "path", Value::String(path.to_string()));
            if let Some(host) = transport.get("host") {
                let mut headers = Mapping::new();
                put(&mut headers, "Host", Value::String(host.to_string()));
                put(&mut ws, "headers", Value::Mapping(headers));
            }
            if let Some(ed) = transport.get("early-data").and_then(|e| e.parse::<i64>().ok()) {
                put(&mut ws, "max-early-data", Value::Number(ed.into()));
            }
            put(map, "ws-opts", Value::Mapping(ws));
        }
        Network::Grpc => {
            if let Some(service) = transport.get("service-name") {
                let mut grpc = Mapping::new();
                put(
                    &mut grpc,
                    "grpc-service-name",
                    Value::String(service.to_string()),
                );
                put(map, "grpc-opts", Value::Mapping(grpc));
            }
        }
        Network::H2 | Network::Http => {
            let key = if transport.network == Network::H2 {
                "h2-opts"
            } else {
                "http-opts"
            };
            let mut opts = Mapping::new();
            if let Some(path) = transport.get("path") {
                put(&mut opts, "path", Value::String(path.to_string()));
            }
            if let Some(host) = transport.get("host") {
                put(
                    &mut opts,
                    "host",
                    Value::Sequence(vec![Value::String(host.to_string())]),
                );
            }
            if !opts.is_empty() {
                put(map, key, Value::Mapping(opts));
            }
        }
        Network::Tcp => {}
    }
}

fn security_fields(config: &ProxyConfig, map: &mut Mapping) {
    // these protocols carry no TLS layer in the clash schema
    if matches!(
        config.protocol,
        Protocol::Wireguard | Protocol::Snell | Protocol::Ssh | Protocol::Mieru
    ) {
        return;
    }
    let security = &config.security;
    let explicit_tls_flag = matches!(config.protocol, Protocol::Vless | Protocol::Vmess);

    if security.tls.enabled() && explicit_tls_flag {
        put(map, "tls", Value::Bool(true));
    }
    if let Tls::Reality {
        public_key,
        short_id,
    } = &security.tls
    {
        let mut reality = Mapping::new();
        put(&mut reality, "public-key", Value::String(public_key.clone()));
        put(&mut reality, "short-id", Value::String(short_id.clone()));
        put(map, "reality-opts", Value::Mapping(reality));
    }
    if let Some(sni) = &security.sni {
        let key = if explicit_tls_flag { "servername" } else { "sni" };
        put(map, key, Value::String(sni.clone()));
    }
    if !security.alpn.is_empty() {
        put(
            map,
            "alpn",
            Value::Sequence(
                security
                    .alpn
                    .iter()
                    .map(|a| Value::String(a.clone()))
                    .collect(),
            ),
        );
    }
    if let Some(fp) = &security.fingerprint {
        put(map, "client-fingerprint", Value::String(fp.clone()));
    }
    if security.tls.enabled() {
        put(
            map,
            "skip-cert-verify",
            Value::Bool(security.skip_cert_verify),
        );
    }
}

fn put(map: &mut Mapping, key: &str, value: Value) {
    map.insert(Value::String(key.to_string()), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_clash_proxy, parse_uri, ParseOptions};

    fn round_trip(config: &ProxyConfig) {
        let value = to_clash_value(config);
        let back = parse_clash_proxy(&value, &ParseOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(config.dedup_key(), back.dedup_key());
        assert_eq!(config.name, back.name);
    }

    #[test]
    fn test_vless_reality_round_trip() {
        let config = parse_uri(
            "vless://123e4567-e89b-12d3-a456-426614174000@example.com:443\
             ?security=reality&pbk=k&sid=ab12&fp=chrome&sni=cdn.com&type=grpc&serviceName=s#r",
        )
        .unwrap();
        let value = to_clash_value(&config);
        let map = value.as_mapping().unwrap();
        assert_eq!(map.get("tls"), Some(&Value::Bool(true)));
        assert!(map.get("reality-opts").is_some());
        round_trip(&config);
    }

    #[test]
    fn test_vmess_ws_default_path() {
        let payload = crate::common::codec::encode_base64(
            serde_json::json!({
                "add": "1.2.3.4", "port": "443",
                "id": "123e4567-e89b-12d3-a456-426614174000",
                "net": "ws", "tls": "tls"
            })
            .to_string()
            .as_bytes(),
        );
        let config = parse_uri(&format!("vmess://{}", payload)).unwrap();
        let value = to_clash_value(&config);
        let ws = value
            .as_mapping()
            .unwrap()
            .get("ws-opts")
            .and_then(Value::as_mapping)
            .unwrap();
        assert_eq!(ws.get("path"), Some(&Value::String("/".to_string())));
    }

    #[test]
    fn test_trojan_round_trip() {
        let config =
            parse_uri("trojan://pw@example.com:443?sni=t.com&allowInsecure=0#T").unwrap();
        let value = to_clash_value(&config);
        let map = value.as_mapping().unwrap();
        assert_eq!(map.get("sni"), Some(&Value::String("t.com".to_string())));
        assert_eq!(map.get("skip-cert-verify"), Some(&Value::Bool(false)));
        round_trip(&config);
    }

    #[test]
    fn test_ss_plugin_round_trip() {
        let config = parse_uri(
            "ss://YWVzLTI1Ni1nY206cHc=@example.com:8388\
             /?plugin=obfs-local%3Bobfs%3Dtls%3Bobfs-host%3Dbing.com#s",
        )
        .unwrap();
        round_trip(&config);
    }

    #[test]
    fn test_wireguard_round_trip() {
        let config = parse_uri(
            "wireguard://cHJpdmF0ZWtleQ%3D%3D@wg.example.com:51820\
             ?publickey=PK&ip=10.0.0.2&mtu=1380#wg",
        )
        .unwrap();
        round_trip(&config);
    }

    #[test]
    fn test_snell_obfs_opts_shape() {
        let config =
            parse_uri("snell://psk@example.com:6160?version=4&obfs=http&obfs-host=b.com#sn")
                .unwrap();
        let value = to_clash_value(&config);
        let opts = value
            .as_mapping()
            .unwrap()
            .get("obfs-opts")
            .and_then(Value::as_mapping)
            .unwrap();
        assert_eq!(opts.get("mode"), Some(&Value::String("http".to_string())));
        round_trip(&config);
    }

    #[test]
    fn test_document_wrapper() {
        let config = parse_uri("trojan://pw@example.com:443#d").unwrap();
        let doc = to_clash_document(&[config]).unwrap();
        assert!(doc.starts_with("proxies:"));
        assert!(doc.contains("type: trojan"));
    }
}
