//! Dialect parsers: share URIs and Clash dictionaries in, canonical
//! [`ProxyConfig`](crate::config::ProxyConfig) out.
//!
//! `parse_uri` dispatches on the scheme; each dialect module owns the
//! quirks of its wire format. Every config returned here has already
//! passed [`ProxyConfig::validate`](crate::config::ProxyConfig::validate).

pub mod authority;
pub mod clash;
mod hysteria;
pub(crate) mod shadowsocks;
mod shadowsocksr;
mod snell;
mod ssh;
mod trojan;
mod tuic;
mod vless;
mod vmess;
mod wireguard;

pub use authority::ParseOptions;

use crate::config::{Protocol, ProxyConfig};
use crate::{Error, Result};

/// Parse a single share URI with default options.
pub fn parse_uri(raw: &str) -> Result<ProxyConfig> {
    parse_uri_with(raw, &ParseOptions::default())
}

/// Parse a single share URI, dispatching on the scheme.
pub fn parse_uri_with(raw: &str, opts: &ParseOptions) -> Result<ProxyConfig> {
    let raw = raw.trim();
    let (scheme, payload) = raw
        .split_once("://")
        .ok_or_else(|| Error::malformed_scheme("missing '://' separator"))?;
    if payload.is_empty() {
        return Err(Error::malformed_scheme("empty payload"));
    }

    let scheme = scheme.to_ascii_lowercase();
    let protocol = Protocol::from_scheme(&scheme)
        .ok_or_else(|| Error::unsupported_scheme(scheme.clone()))?;

    let config = match protocol {
        Protocol::Vless => vless::parse(payload, opts)?,
        Protocol::Vmess => vmess::parse(payload, opts)?,
        Protocol::Shadowsocks => shadowsocks::parse(payload, opts)?,
        Protocol::ShadowsocksR => shadowsocksr::parse(payload, opts)?,
        Protocol::Trojan => trojan::parse_trojan(payload, opts)?,
        Protocol::Anytls => trojan::parse_anytls(payload, opts)?,
        Protocol::Hysteria => hysteria::parse_v1(payload, opts)?,
        Protocol::Hysteria2 => hysteria::parse_v2(payload, opts)?,
        Protocol::Tuic => tuic::parse_tuic(payload, opts)?,
        Protocol::Juicity => tuic::parse_juicity(payload, opts)?,
        Protocol::Wireguard => wireguard::parse(payload, opts)?,
        Protocol::Snell => snell::parse(payload, opts)?,
        Protocol::Ssh => ssh::parse_ssh(payload, opts)?,
        Protocol::Mieru => ssh::parse_mieru(payload, opts)?,
    };

    config.validate()?;
    Ok(config)
}

/// Parse one Clash proxy mapping. `Ok(None)` means the entry's `type`
/// is outside the supported set and should be skipped.
pub fn parse_clash_proxy(
    value: &serde_yaml::Value,
    opts: &ParseOptions,
) -> Result<Option<ProxyConfig>> {
    match clash::parse_proxy(value, opts)? {
        Some(config) => {
            config.validate()?;
            Ok(Some(config))
        }
        None => Ok(None),
    }
}
