//! VLESS dialect: uuid authority URI

use super::authority::{
    leftover_query, security_from_query, split_authority, transport_from_query, ParseOptions,
};
use crate::common::validate;
use crate::config::{Credential, Protocol, ProxyConfig};
use crate::{Error, Result};
use std::collections::BTreeMap;

/// Parse a `vless://uuid@host:port?query#name` payload.
pub fn parse(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;
    let uuid = authority
        .userinfo
        .clone()
        .ok_or_else(|| Error::credential("vless uri has no uuid"))?;
    if !validate::is_valid_uuid(&uuid) {
        return Err(Error::credential(format!("invalid vless uuid: {:?}", uuid)));
    }

    let security = security_from_query(&authority, false, opts)?;
    let transport = transport_from_query(&authority)?;

    let mut extra = BTreeMap::new();
    if let Some(flow) = authority.query_get("flow") {
        extra.insert("flow".to_string(), serde_json::Value::String(flow.into()));
    }
    if let Some(encryption) = authority.query_get("encryption") {
        if encryption != "none" {
            extra.insert(
                "encryption".to_string(),
                serde_json::Value::String(encryption.into()),
            );
        }
    }
    extra.extend(leftover_query(&authority, &["flow", "encryption"]));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(Protocol::Vless, &authority.host));

    Ok(ProxyConfig {
        protocol: Protocol::Vless,
        server: authority.host,
        port: authority.port,
        credential: Credential::Uuid(uuid),
        transport,
        security,
        name,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Network, Tls};

    const UUID: &str = "123e4567-e89b-12d3-a456-426614174000";

    #[test]
    fn test_parse_reality_grpc() {
        let payload = format!(
            "{}@example.com:443?security=reality&pbk=PUBKEY&sid=6ba85179&fp=chrome\
             &type=grpc&serviceName=Tun&flow=xtls-rprx-vision#US%20Node",
            UUID
        );
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.protocol, Protocol::Vless);
        assert!(matches!(
            &config.security.tls,
            Tls::Reality { public_key, short_id }
                if public_key == "PUBKEY" && short_id == "6ba85179"
        ));
        assert_eq!(config.security.fingerprint.as_deref(), Some("chrome"));
        assert_eq!(config.transport.network, Network::Grpc);
        assert_eq!(config.transport.get("service-name"), Some("Tun"));
        assert_eq!(config.extra_str("flow"), Some("xtls-rprx-vision"));
        assert_eq!(config.name, "US Node");
    }

    #[test]
    fn test_parse_plain_tcp_synthesizes_name() {
        let payload = format!("{}@1.2.3.4:8443", UUID);
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.security.tls, Tls::None);
        assert_eq!(config.name, "vless-1.2.3.4");
    }

    #[test]
    fn test_rejects_missing_uuid() {
        assert!(parse("example.com:443", &ParseOptions::default()).is_err());
    }

    #[test]
    fn test_rejects_malformed_uuid() {
        let payload = "123e4567e89b12d3a456426614174000@example.com:443";
        assert!(matches!(
            parse(payload, &ParseOptions::default()),
            Err(Error::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_reality_missing_sid_rejected() {
        let payload = format!("{}@example.com:443?security=reality&pbk=PUBKEY", UUID);
        assert!(matches!(
            parse(&payload, &ParseOptions::default()),
            Err(Error::MissingSecurityField(_))
        ));
    }

    #[test]
    fn test_unknown_query_keys_preserved() {
        let payload = format!("{}@example.com:443?security=tls&headerType=none&mode=gun", UUID);
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.extra_str("headerType"), Some("none"));
        assert_eq!(config.extra_str("mode"), Some("gun"));
    }
}
