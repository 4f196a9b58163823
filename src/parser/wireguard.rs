//! WireGuard dialect, including amnezia-wg tunables
//!
//! The private key rides in the userinfo; the public key comes from a
//! query parameter or, failing that, is derived from the private key by
//! X25519 scalar multiplication. At least one local address (`ip` /
//! `ipv6`) is required.

use super::authority::{leftover_query_verbatim, split_authority, ParseOptions};
use crate::common::codec::{decode_base64, encode_base64, percent_decode};
use crate::config::{Credential, Protocol, ProxyConfig, Security, Transport};
use crate::{Error, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use x25519_dalek::{PublicKey, StaticSecret};

/// Integer tunables that degrade to "omitted" on parse failure.
const NUMERIC_TUNABLES: &[&str] = &[
    "mtu", "jc", "jmin", "jmax", "s1", "s2", "h1", "h2", "h3", "h4",
];

pub fn parse(payload: &str, _opts: &ParseOptions) -> Result<ProxyConfig> {
    let authority = split_authority(payload)?;
    let private_key = authority
        .userinfo
        .as_deref()
        .map(percent_decode)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| Error::credential("wireguard uri has no private key"))?;

    let public_key = match authority
        .query_get("publickey")
        .or_else(|| authority.query_get("public_key"))
        .or_else(|| authority.query_get("pubkey"))
    {
        Some(pk) => pk.to_string(),
        None => derive_public_key(&private_key)?,
    };

    let mut extra = BTreeMap::new();

    let (ip, ipv6) = local_addresses(&authority);
    if ip.is_none() && ipv6.is_none() {
        return Err(Error::credential("wireguard uri has no local address"));
    }
    if let Some(ip) = ip {
        extra.insert("ip".to_string(), Value::String(ip));
    }
    if let Some(ipv6) = ipv6 {
        extra.insert("ipv6".to_string(), Value::String(ipv6));
    }

    for key in NUMERIC_TUNABLES {
        if let Some(raw) = authority.query_get(key) {
            if let Ok(n) = raw.parse::<i64>() {
                extra.insert(key.to_string(), Value::from(n));
            }
        }
    }
    if let Some(reserved) = authority.query_get("reserved") {
        extra.insert("reserved".to_string(), Value::String(reserved.into()));
    }
    if let Some(psk) = authority
        .query_get("presharedkey")
        .or_else(|| authority.query_get("preshared-key"))
    {
        extra.insert(
            "preshared-key".to_string(),
            Value::String(percent_decode(psk)),
        );
    }

    let mut consumed = vec![
        "publickey",
        "public_key",
        "pubkey",
        "ip",
        "ipv6",
        "address",
        "reserved",
        "presharedkey",
        "preshared-key",
    ];
    consumed.extend(NUMERIC_TUNABLES);
    extra.extend(leftover_query_verbatim(&authority, &consumed));

    let name = authority
        .fragment
        .clone()
        .unwrap_or_else(|| ProxyConfig::synthesized_name(Protocol::Wireguard, &authority.host));

    Ok(ProxyConfig {
        protocol: Protocol::Wireguard,
        server: authority.host,
        port: authority.port,
        credential: Credential::KeyPair {
            private_key,
            public_key,
        },
        transport: Transport::tcp(),
        security: Security::none(),
        name,
        extra,
    })
}

/// X25519 public key from a base64 private key. Failure to decode or a
/// wrong key length rejects the record.
pub fn derive_public_key(private_key: &str) -> Result<String> {
    let bytes = decode_base64(private_key)
        .map_err(|_| Error::credential("wireguard private key is not valid base64"))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::credential("wireguard private key must be 32 bytes"))?;
    let secret = StaticSecret::from(bytes);
    Ok(encode_base64(PublicKey::from(&secret).as_bytes()))
}

/// Local tunnel addresses from `ip`/`ipv6`, falling back to a combined
/// `address` list split by family.
fn local_addresses(authority: &super::authority::Authority) -> (Option<String>, Option<String>) {
    let mut ip = authority.query_get("ip").map(str::to_string);
    let mut ipv6 = authority.query_get("ipv6").map(str::to_string);

    if ip.is_none() && ipv6.is_none() {
        if let Some(addresses) = authority.query_get("address") {
            for addr in addresses.split(',').map(str::trim) {
                let bare = addr.split('/').next().unwrap_or(addr);
                if ip.is_none() && bare.parse::<Ipv4Addr>().is_ok() {
                    ip = Some(addr.to_string());
                } else if ipv6.is_none() && bare.parse::<Ipv6Addr>().is_ok() {
                    ipv6 = Some(addr.to_string());
                }
            }
        }
    }

    (ip, ipv6)
}
