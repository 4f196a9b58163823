//! Hysteria v1 and v2 dialects (QUIC-based, always TLS)

use super::authority::{
    leftover_query, security_from_query, split_authority, ParseOptions,
};
use crate::common::codec::percent_decode;
use crate::config::{Credential, Protocol, ProxyConfig, Transport};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

const DEFAULT_UP_MBPS: i64 = 50;
const DEFAULT_DOWN_MBPS: i64 = 100;

/// Parse a `hysteria://` (v1) payload. Auth comes from the userinfo or
/// the `auth` query param; bandwidth figures fall back to 50/100.
pub fn parse_v1(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;

    let auth = authority
        .userinfo
        .as_deref()
        .map(percent_decode)
        .filter(|a| !a.is_empty())
        .or_else(|| authority.query_get("auth").map(str::to_string))
        .ok_or_else(|| Error::credential("hysteria uri has no auth"))?;

    let security = security_from_query(&authority, true, opts)?;

    let mut extra = BTreeMap::new();
    let up = authority
        .query_get("upmbps")
        .or_else(|| authority.query_get("up"))
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_UP_MBPS);
    let down = authority
        .query_get("downmbps")
        .or_else(|| authority.query_get("down"))
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(DEFAULT_DOWN_MBPS);
    extra.insert("up".to_string(), Value::from(up));
    extra.insert("down".to_string(), Value::from(down));
    if let Some(obfs) = authority.query_get("obfs") {
        extra.insert("obfs".to_string(), Value::String(obfs.into()));
    }
    if let Some(param) = authority.query_get("obfsParam") {
        extra.insert("obfs-param".to_string(), Value::String(param.into()));
    }
    if let Some(protocol) = authority.query_get("protocol") {
        extra.insert("protocol".to_string(), Value::String(protocol.into()));
    }
    extra.extend(leftover_query(
        &authority,
        &["auth", "upmbps", "downmbps", "up", "down", "obfs", "obfsParam", "protocol"],
    ));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(Protocol::Hysteria, &authority.host));

    Ok(ProxyConfig {
        protocol: Protocol::Hysteria,
        server: authority.host,
        port: authority.port,
        credential: Credential::Password(auth),
        transport: Transport::tcp(),
        security,
        name,
        extra,
    })
}

/// Parse a `hysteria2://`/`hy2://` payload.
pub fn parse_v2(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;

    let password = authority
        .userinfo
        .as_deref()
        .map(percent_decode)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::credential("hysteria2 uri has no password"))?;

    let security = security_from_query(&authority, true, opts)?;

    let mut extra = BTreeMap::new();
    for key in ["obfs", "obfs-password", "ports", "pinSHA256"] {
        if let Some(value) = authority.query_get(key) {
            extra.insert(key.to_string(), Value::String(value.into()));
        }
    }
    for key in ["up", "down"] {
        if let Some(value) = authority.query_get(key) {
            if let Ok(mbps) = value.parse::<i64>() {
                extra.insert(key.to_string(), Value::from(mbps));
            }
        }
    }
    extra.extend(leftover_query(
        &authority,
        &["obfs", "obfs-password", "ports", "pinSHA256", "up", "down"],
    ));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(Protocol::Hysteria2, &authority.host));

    Ok(ProxyConfig {
        protocol: Protocol::Hysteria2,
        server: authority.host,
        port: authority.port,
        credential: Credential::Password(password),
        transport: Transport::tcp(),
        security,
        name,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tls;

    #[test]
    fn test_v1_auth_from_userinfo() {
        let config = parse_v1(
            "s3cret@example.com:443?upmbps=80&downmbps=200&obfs=xplus#hy1",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(config.credential, Credential::Password("s3cret".into()));
        assert_eq!(config.extra_int("up"), Some(80));
        assert_eq!(config.extra_int("down"), Some(200));
        assert_eq!(config.extra_str("obfs"), Some("xplus"));
        assert_eq!(config.security.tls, Tls::Tls);
    }

    #[test]
    fn test_v1_auth_from_query() {
        let config =
            parse_v1("example.com:443?auth=tok&peer=sni.com", &ParseOptions::default()).unwrap();
        assert_eq!(config.credential, Credential::Password("tok".into()));
        assert_eq!(config.security.sni.as_deref(), Some("sni.com"));
    }

    #[test]
    fn test_v1_missing_auth_rejected() {
        assert!(matches!(
            parse_v1("example.com:443?upmbps=10", &ParseOptions::default()),
            Err(Error::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_v1_bandwidth_defaults_on_parse_failure() {
        let config = parse_v1(
            "tok@example.com:443?upmbps=fast&downmbps=",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(config.extra_int("up"), Some(50));
        assert_eq!(config.extra_int("down"), Some(100));
    }

    #[test]
    fn test_v2_basic() {
        let config = parse_v2(
            "pw@example.com:443?sni=example.com&obfs=salamander&obfs-password=ob#hy2",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(config.protocol, Protocol::Hysteria2);
        assert_eq!(config.extra_str("obfs"), Some("salamander"));
        assert_eq!(config.extra_str("obfs-password"), Some("ob"));
        assert_eq!(config.security.tls, Tls::Tls);
    }

    #[test]
    fn test_v2_missing_password_rejected() {
        assert!(parse_v2("example.com:443", &ParseOptions::default()).is_err());
    }
}
