//! Trojan and AnyTLS dialects: password authority URIs
//!
//! Both carry a percent-encoded password in the userinfo and imply TLS
//! unless the query says otherwise.

use super::authority::{
    leftover_query, security_from_query, split_authority, transport_from_query, ParseOptions,
};
use crate::common::codec::percent_decode;
use crate::config::{Credential, Protocol, ProxyConfig, Transport};
use crate::{Error, Result};
use std::collections::BTreeMap;

pub fn parse_trojan(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    parse_password_uri(Protocol::Trojan, payload, opts)
}

pub fn parse_anytls(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    parse_password_uri(Protocol::Anytls, payload, opts)
}

fn parse_password_uri(
    protocol: Protocol,
    payload: &str,
    opts: &ParseOptions,
) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;
    let password = authority
        .userinfo
        .as_deref()
        .map(percent_decode)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::credential(format!("{} uri has no password", protocol)))?;

    let security = security_from_query(&authority, true, opts)?;
    let transport = if protocol == Protocol::Trojan {
        transport_from_query(&authority)?
    } else {
        // anytls is its own session layer; no inner transport options
        Transport::tcp()
    };

    let mut extra = BTreeMap::new();
    extra.extend(leftover_query(&authority, &[]));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(protocol, &authority.host));

    Ok(ProxyConfig {
        protocol,
        server: authority.host,
        port: authority.port,
        credential: Credential::Password(password),
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

    #[test]
    fn test_trojan_defaults_to_tls() {
        let config =
            parse_trojan("pass123@example.com:443#Trojan", &ParseOptions::default()).unwrap();
        assert_eq!(config.security.tls, Tls::Tls);
        assert_eq!(config.credential, Credential::Password("pass123".into()));
        assert_eq!(config.name, "Trojan");
    }

    #[test]
    fn test_trojan_percent_encoded_password() {
        let config =
            parse_trojan("p%40ss%2Fword@example.com:443", &ParseOptions::default()).unwrap();
        assert_eq!(config.credential, Credential::Password("p@ss/word".into()));
    }

    #[test]
    fn test_trojan_ws_transport() {
        let config = parse_trojan(
            "pw@example.com:443?type=ws&path=/t&host=cdn.com&sni=cdn.com",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(config.transport.network, Network::Ws);
        assert_eq!(config.security.sni.as_deref(), Some("cdn.com"));
    }

    #[test]
    fn test_trojan_missing_password_rejected() {
        assert!(matches!(
            parse_trojan("example.com:443", &ParseOptions::default()),
            Err(Error::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_anytls_basic() {
        let config = parse_anytls(
            "secret@example.com:8443?sni=example.com&insecure=1#any",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(config.protocol, Protocol::Anytls);
        assert_eq!(config.security.tls, Tls::Tls);
        assert!(config.security.skip_cert_verify);
        assert_eq!(config.transport.network, Network::Tcp);
    }
}
