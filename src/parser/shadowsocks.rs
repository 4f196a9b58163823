//! Shadowsocks dialect (SIP002 and the legacy fully-encoded form)
//!
//! Two layouts must both be attempted:
//! - `ss://userinfo@host:port[/?plugin=...]#name` where the userinfo is
//!   either plain `cipher:password` or base64 of it,
//! - `ss://base64(cipher:password@host:port)#name` with the whole
//!   netloc encoded.

use super::authority::{split_authority, split_host_port, ParseOptions};
use crate::common::codec::{decode_base64_text, percent_decode};
use crate::common::validate::{is_supported_cipher, normalize_cipher};
use crate::config::{Credential, Protocol, ProxyConfig, Security, Transport};
use crate::{Error, Result};
use std::collections::BTreeMap;

pub fn parse(payload: &str, _opts: &ParseOptions) -> Result<ProxyConfig> {
    // Fragment applies to either layout.
    let (body, fragment) = match payload.rfind('#') {
        Some(idx) => {
            let name = percent_decode(&payload[idx + 1..]).trim().to_string();
            (
                &payload[..idx],
                if name.is_empty() { None } else { Some(name) },
            )
        }
        None => (payload, None),
    };

    let (server, port, cipher, password, plugin) = if body.contains('@') {
        parse_sip002(body)?
    } else {
        parse_legacy(body)?
    };

    let cipher = normalize_cipher(&cipher);
    if !is_supported_cipher(&cipher) {
        return Err(Error::credential(format!("unsupported cipher: {:?}", cipher)));
    }

    let mut extra = BTreeMap::new();
    if let Some(plugin) = plugin {
        let (name, opts) = decompose_plugin(&plugin);
        extra.insert("plugin".to_string(), serde_json::Value::String(name));
        if !opts.is_empty() {
            extra.insert(
                "plugin-opts".to_string(),
                serde_json::Value::Object(opts.into_iter().collect()),
            );
        }
    }

    let name =
        fragment.unwrap_or_else(|| ProxyConfig::synthesized_name(Protocol::Shadowsocks, &server));

    Ok(ProxyConfig {
        protocol: Protocol::Shadowsocks,
        server,
        port,
        credential: Credential::CipherPassword { cipher, password },
        transport: Transport::tcp(),
        security: Security::none(),
        name,
        extra,
    })
}

/// Splits a SIP003 plugin string (`name;k=v;flag;...`) into the Clash
/// plugin name plus an options object. `obfs-local` and `v2ray-plugin`
/// get their well-known key spellings folded to the Clash ones.
pub(crate) fn decompose_plugin(raw: &str) -> (String, serde_json::Map<String, serde_json::Value>) {
    let mut parts = raw.split(';');
    let head = parts.next().unwrap_or_default().trim().to_string();
    let mut opts = serde_json::Map::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.split_once('=') {
            Some((k, v)) => {
                let key = match (head.as_str(), k) {
                    ("obfs-local" | "simple-obfs", "obfs") => "mode",
                    ("obfs-local" | "simple-obfs", "obfs-host") => "host",
                    _ => k,
                };
                opts.insert(key.to_string(), serde_json::Value::String(v.to_string()));
            }
            None => {
                opts.insert(part.to_string(), serde_json::Value::Bool(true));
            }
        }
    }
    let name = match head.as_str() {
        "obfs-local" | "simple-obfs" => "obfs".to_string(),
        other => other.to_string(),
    };
    (name, opts)
}

/// Inverse of [`decompose_plugin`]: rebuilds the SIP003 plugin string.
pub(crate) fn compose_plugin(
    name: &str,
    opts: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let as_str = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut out = match name {
        "obfs" => "obfs-local".to_string(),
        other => other.to_string(),
    };
    if name == "obfs" {
        if let Some(mode) = opts.get("mode") {
            out.push_str(";obfs=");
            out.push_str(&as_str(mode));
        }
        if let Some(host) = opts.get("host") {
            out.push_str(";obfs-host=");
            out.push_str(&as_str(host));
        }
        return out;
    }
    // Bare flags first, then key=value pairs; iteration order is the
    // map's sorted-key order either way.
    for (k, v) in opts {
        if matches!(v, serde_json::Value::Bool(true)) {
            out.push(';');
            out.push_str(k);
        }
    }
    for (k, v) in opts {
        if v.is_boolean() {
            continue;
        }
        out.push(';');
        out.push_str(k);
        out.push('=');
        out.push_str(&as_str(v));
    }
    out
}

type SsParts = (String, u16, String, String, Option<String>);

fn parse_sip002(body: &str) -> Result<SsParts> {
    let authority = split_authority(body)?;
    let userinfo = authority
        .userinfo
        .as_deref()
        .ok_or_else(|| Error::credential("ss uri has no userinfo"))?;

    // Plain `cipher:password` (both halves percent-encoded), otherwise
    // the whole userinfo is base64.
    let decoded = if userinfo.contains(':') {
        percent_decode(userinfo)
    } else {
        decode_base64_text(userinfo)?
    };
    let (cipher, password) = decoded
        .split_once(':')
        .ok_or_else(|| Error::credential("ss userinfo missing cipher separator"))?;

    let plugin = authority.query_get("plugin").map(str::to_string);
    Ok((
        authority.host,
        authority.port,
        cipher.to_string(),
        password.to_string(),
        plugin,
    ))
}

fn parse_legacy(body: &str) -> Result<SsParts> {
    let decoded = decode_base64_text(body)?;
    let (userinfo, host_port) = decoded
        .rsplit_once('@')
        .ok_or_else(|| Error::malformed_scheme("legacy ss payload missing '@'"))?;
    let (cipher, password) = userinfo
        .split_once(':')
        .ok_or_else(|| Error::credential("ss userinfo missing cipher separator"))?;
    let (host, port) = split_host_port(host_port)?;
    Ok((host, port, cipher.to_string(), password.to_string(), None))
}
