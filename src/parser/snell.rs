//! Snell dialect: psk authority URI with obfs options

use super::authority::{leftover_query_verbatim, split_authority, ParseOptions};
use crate::common::codec::percent_decode;
use crate::config::{Credential, Protocol, ProxyConfig, Security, Transport};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;

pub fn parse(payload: &str, _opts: &ParseOptions) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;
    let psk = authority
        .userinfo
        .as_deref()
        .map(percent_decode)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::credential("snell uri has no psk"))?;

    let mut extra = BTreeMap::new();
    if let Some(version) = authority.query_get("version") {
        if let Ok(v) = version.parse::<i64>() {
            extra.insert("version".to_string(), Value::from(v));
        }
    }
    if let Some(obfs) = authority.query_get("obfs") {
        extra.insert("obfs".to_string(), Value::String(obfs.into()));
    }
    if let Some(host) = authority.query_get("obfs-host") {
        extra.insert("obfs-host".to_string(), Value::String(host.into()));
    }
    extra.extend(leftover_query_verbatim(
        &authority,
        &["version", "obfs", "obfs-host"],
    ));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(Protocol::Snell, &authority.host));

    Ok(ProxyConfig {
        protocol: Protocol::Snell,
        server: authority.host,
        port: authority.port,
        credential: Credential::Password(psk),
        transport: Transport::tcp(),
        security: Security::none(),
        name,
        extra,
    })
}
