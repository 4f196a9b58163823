//! SSH and mieru dialects: `user:password@host:port` authority URIs

use super::authority::{leftover_query_verbatim, split_authority, ParseOptions};
use crate::common::codec::percent_decode;
use crate::config::{Credential, Protocol, ProxyConfig, Security, Transport};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn parse_ssh(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    parse_login(Protocol::Ssh, payload, opts)
}

pub fn parse_mieru(payload: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    parse_login(Protocol::Mieru, payload, opts)
}

fn parse_login(protocol: Protocol, payload: &str, _opts: &ParseOptions) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;
    let userinfo = authority
        .userinfo
        .as_deref()
        .ok_or_else(|| Error::credential(format!("{} uri has no login", protocol)))?;

    let (username, password) = match userinfo.split_once(':') {
        Some((user, pass)) => (percent_decode(user), percent_decode(pass)),
        None => (percent_decode(userinfo), String::new()),
    };
    if username.is_empty() {
        return Err(Error::credential(format!("{} uri has empty username", protocol)));
    }

    let mut extra = BTreeMap::new();
    let consumed: &[&str] = match protocol {
        Protocol::Mieru => {
            // mieru rides over TCP or UDP and may multiplex
            for key in ["transport", "multiplexing"] {
                if let Some(value) = authority.query_get(key) {
                    extra.insert(key.to_string(), Value::String(value.into()));
                }
            }
            &["transport", "multiplexing"]
        }
        _ => {
            for key in ["private-key", "host-key"] {
                if let Some(value) = authority.query_get(key) {
                    extra.insert(key.to_string(), Value::String(value.into()));
                }
            }
            &["private-key", "host-key"]
        }
    };
    extra.extend(leftover_query_verbatim(&authority, consumed));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(protocol, &authority.host));

    Ok(ProxyConfig {
        protocol,
        server: authority.host,
        port: authority.port,
        credential: Credential::UsernamePassword { username, password },
        transport: Transport::tcp(),
        security: Security::none(),
        name,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_basic() {
        let config =
            parse_ssh("root:hunter2@example.com:22#box", &ParseOptions::default()).unwrap();
        assert_eq!(config.protocol, Protocol::Ssh);
        assert_eq!(
            config.credential,
            Credential::UsernamePassword {
                username: "root".into(),
                password: "hunter2".into()
            }
        );
        assert_eq!(config.port, 22);
    }

    #[test]
    fn test_ssh_username_only() {
        let config = parse_ssh("deploy@example.com:22", &ParseOptions::default()).unwrap();
        assert!(matches!(
            config.credential,
            Credential::UsernamePassword { ref username, ref password }
                if username == "deploy" && password.is_empty()
        ));
    }

    #[test]
    fn test_mieru_transport_extra() {
        let config = parse_mieru(
            "user:pw@example.com:2027?transport=TCP&multiplexing=MULTIPLEXING_LOW",
            &ParseOptions::default(),
        )
        .unwrap();
        assert_eq!(config.protocol, Protocol::Mieru);
        assert_eq!(config.extra_str("transport"), Some("TCP"));
    }

    #[test]
    fn test_missing_login_rejected() {
        assert!(matches!(
            parse_ssh("example.com:22", &ParseOptions::default()),
            Err(Error::InvalidCredential(_))
        ));
    }
}
