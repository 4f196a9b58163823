//! VMess dialect: base64-encoded JSON payload

use super::authority::ParseOptions;
use crate::common::codec::decode_base64_text;
use crate::common::validate;
use crate::config::{
    Credential, Network, Protocol, ProxyConfig, Security, Tls, Transport,
};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ciphers the vmess dialect admits; anything else degrades to `auto`.
const VMESS_CIPHERS: &[&str] = &["auto", "aes-128-gcm", "chacha20-poly1305", "none"];

/// Fold a wire cipher value to the admitted set. Both ingest paths use
/// this so the same node gets the same dedup key either way.
pub(crate) fn fold_cipher(cipher: String) -> String {
    if VMESS_CIPHERS.contains(&cipher.as_str()) {
        cipher
    } else {
        "auto".to_string()
    }
}

/// Parse a `vmess://` payload (everything after the scheme).
pub fn parse(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    let json_text = decode_base64_text(payload)?;
    let json: Value = serde_json::from_str(&json_text)
        .map_err(|e| Error::decode(format!("vmess json: {}", e)))?;
    let obj = json
        .as_object()
        .ok_or_else(|| Error::decode("vmess payload is not a json object"))?;

    let server = get_str(obj, "add");
    if !validate::is_valid_server(&server) {
        return Err(Error::server_port(format!("invalid server: {:?}", server)));
    }
    let port = get_str(obj, "port");
    let port = validate::parse_port(&port)
        .ok_or_else(|| Error::server_port(format!("invalid port: {:?}", port)))?;

    let uuid = get_str(obj, "id");
    if !validate::is_valid_uuid(&uuid) {
        return Err(Error::credential(format!("invalid vmess uuid: {:?}", uuid)));
    }

    let mut extra = BTreeMap::new();
    let alter_id = get_str(obj, "aid").parse::<i64>().unwrap_or(0);
    extra.insert("alterId".to_string(), Value::from(alter_id));

    // `scy` is the common key; old generators used `cipher`/`security`.
    let cipher = [get_str(obj, "scy"), get_str(obj, "security"), get_str(obj, "cipher")]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    extra.insert("cipher".to_string(), Value::String(fold_cipher(cipher)));

    let network = match get_str(obj, "net").as_str() {
        "" => Network::Tcp,
        other => Network::from_str_opt(other)
            .ok_or_else(|| Error::malformed_scheme(format!("unknown vmess net: {:?}", other)))?,
    };
    let mut transport = Transport {
        network,
        ..Transport::default()
    };
    match network {
        Network::Ws | Network::H2 | Network::Http => {
            transport.set("path", get_str(obj, "path"));
            transport.set("host", get_str(obj, "host"));
        }
        Network::Grpc => {
            // grpc payloads carry the service name in `path`
            transport.set("service-name", get_str(obj, "path"));
        }
        Network::Tcp => {
            let header = get_str(obj, "type");
            if !header.is_empty() && header != "none" {
                extra.insert("header-type".to_string(), Value::String(header));
            }
        }
    }

    let tls_flag = get_str(obj, "tls");
    let tls = match tls_flag.as_str() {
        "tls" => Tls::Tls,
        "reality" => {
            let public_key = get_str(obj, "pbk");
            let short_id = get_str(obj, "sid");
            if public_key.is_empty() || short_id.is_empty() {
                return Err(Error::security("vmess reality requires pbk and sid"));
            }
            Tls::Reality {
                public_key,
                short_id,
            }
        }
        _ => Tls::None,
    };
    let sni = non_empty(get_str(obj, "sni"));
    let fingerprint = non_empty(get_str(obj, "fp"));
    let alpn: Vec<String> = get_str(obj, "alpn")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let security = Security {
        skip_cert_verify: tls.enabled() && opts.insecure_tls_default,
        tls,
        sni,
        alpn,
        fingerprint,
    };

    let name = match get_str(obj, "ps") {
        ps if ps.is_empty() => ProxyConfig::synthesized_name(Protocol::Vmess, &server),
        ps => ps,
    };

    Ok(ProxyConfig {
        protocol: Protocol::Vmess,
        server,
        port,
        credential: Credential::Uuid(uuid),
        transport,
        security,
        name,
        extra,
    })
}

/// String view of a JSON field, stringifying numbers (ports and alter
/// ids appear both quoted and bare in the wild).
fn get_str(obj: &serde_json::Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::codec::encode_base64;

    fn encode(json: serde_json::Value) -> String {
        encode_base64(json.to_string().as_bytes())
    }

    #[test]
    fn test_parse_basic_ws() {
        let payload = encode(serde_json::json!({
            "v": "2", "ps": "node-a", "add": "1.2.3.4", "port": "443",
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "aid": "0", "net": "ws", "path": "/chat", "host": "cdn.example.com",
            "tls": "tls", "sni": "cdn.example.com"
        }));
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.protocol, Protocol::Vmess);
        assert_eq!(config.server, "1.2.3.4");
        assert_eq!(config.port, 443);
        assert_eq!(config.transport.network, Network::Ws);
        assert_eq!(config.transport.get("path"), Some("/chat"));
        assert_eq!(config.security.tls, Tls::Tls);
        assert_eq!(config.name, "node-a");
    }

    #[test]
    fn test_parse_numeric_port_and_aid() {
        let payload = encode(serde_json::json!({
            "add": "example.com", "port": 8443,
            "id": "123e4567-e89b-12d3-a456-426614174000", "aid": 2
        }));
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.extra_int("alterId"), Some(2));
        // no ps field: synthesized name
        assert_eq!(config.name, "vmess-example.com");
    }

    #[test]
    fn test_unknown_cipher_degrades_to_auto() {
        let payload = encode(serde_json::json!({
            "add": "example.com", "port": "443",
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "scy": "des-ecb"
        }));
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.extra_str("cipher"), Some("auto"));
    }

    #[test]
    fn test_rejects_bad_uuid() {
        let payload = encode(serde_json::json!({
            "add": "example.com", "port": "443", "id": "short"
        }));
        assert!(matches!(
            parse(&payload, &ParseOptions::default()),
            Err(Error::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_rejects_bad_port() {
        let payload = encode(serde_json::json!({
            "add": "example.com", "port": "99999",
            "id": "123e4567-e89b-12d3-a456-426614174000"
        }));
        assert!(matches!(
            parse(&payload, &ParseOptions::default()),
            Err(Error::InvalidServerOrPort(_))
        ));
    }

    #[test]
    fn test_rejects_unrepairable_payload() {
        assert!(matches!(
            parse("!!not-base64!!", &ParseOptions::default()),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_reality_flag_requires_keys() {
        let payload = encode(serde_json::json!({
            "add": "example.com", "port": "443",
            "id": "123e4567-e89b-12d3-a456-426614174000",
            "tls": "reality"
        }));
        assert!(matches!(
            parse(&payload, &ParseOptions::default()),
            Err(Error::MissingSecurityField(_))
        ));
    }

    #[test]
    fn test_unpadded_payload_parses() {
        let padded = encode(serde_json::json!({
            "add": "1.2.3.4", "port": "443",
            "id": "123e4567-e89b-12d3-a456-426614174000", "net": "ws"
        }));
        let unpadded = padded.trim_end_matches('=').to_string();
        let config = parse(&unpadded, &ParseOptions::default()).unwrap();
        assert_eq!(config.server, "1.2.3.4");
        assert_eq!(config.transport.network, Network::Ws);
    }
}
