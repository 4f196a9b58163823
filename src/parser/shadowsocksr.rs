//! ShadowsocksR dialect: fully base64-encoded colon payload
//!
//! `ssr://base64(server:port:protocol:method:obfs:base64(password)/?params)`
//! where the query params (`remarks`, `obfsparam`, `protoparam`) are
//! themselves base64 and decode leniently to empty strings on failure.

use super::authority::ParseOptions;
use crate::common::codec::{decode_base64_or_empty, decode_base64_text};
use crate::common::validate;
use crate::config::{Credential, Protocol, ProxyConfig, Security, Transport};
use crate::{Error, Result};
use std::collections::BTreeMap;

pub fn parse(payload: &str, _opts: &ParseOptions) -> Result<ProxyConfig> {
    let decoded = decode_base64_text(payload)?;

    let (main, params) = match decoded.find("/?") {
        Some(idx) => (&decoded[..idx], &decoded[idx + 2..]),
        None => (decoded.as_str(), ""),
    };
    let main = main.trim_end_matches('/');

    // The last five colon fields are fixed; the remainder is the server
    // (which may itself contain colons for IPv6).
    let mut fields: Vec<&str> = main.rsplitn(6, ':').collect();
    if fields.len() < 6 {
        return Err(Error::malformed_scheme(format!(
            "ssr payload has {} fields, expected 6",
            fields.len()
        )));
    }
    fields.reverse();
    let (server, port_str, protocol, method, obfs, password_b64) =
        (fields[0], fields[1], fields[2], fields[3], fields[4], fields[5]);

    let server = server.trim_matches(|c| c == '[' || c == ']').to_string();
    if !validate::is_valid_server(&server) {
        return Err(Error::server_port(format!("invalid server: {:?}", server)));
    }
    let port = validate::parse_port(port_str)
        .ok_or_else(|| Error::server_port(format!("invalid port: {:?}", port_str)))?;

    // The password is a primary field; failure to decode rejects.
    let password = decode_base64_text(password_b64)
        .map_err(|_| Error::credential("ssr password is not valid base64"))?;

    let mut remarks = String::new();
    let mut obfs_param = String::new();
    let mut protocol_param = String::new();
    let mut extra = BTreeMap::new();
    for pair in params.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "remarks" => remarks = decode_base64_or_empty(value),
            "obfsparam" => obfs_param = decode_base64_or_empty(value),
            "protoparam" => protocol_param = decode_base64_or_empty(value),
            "group" => {
                let group = decode_base64_or_empty(value);
                if !group.is_empty() {
                    extra.insert("group".to_string(), serde_json::Value::String(group));
                }
            }
            _ => {}
        }
    }

    let name = if remarks.trim().is_empty() {
        ProxyConfig::synthesized_name(Protocol::ShadowsocksR, &server)
    } else {
        remarks.trim().to_string()
    };

    Ok(ProxyConfig {
        protocol: Protocol::ShadowsocksR,
        server,
        port,
        credential: Credential::SsrBundle {
            protocol: protocol.to_string(),
            method: method.to_string(),
            obfs: obfs.to_string(),
            password,
            obfs_param,
            protocol_param,
        },
        transport: Transport::tcp(),
        security: Security::none(),
        name,
        extra,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::codec::{encode_base64_url, encode_base64};

    fn make_payload(main: &str, params: &str) -> String {
        let full = if params.is_empty() {
            main.to_string()
        } else {
            format!("{}/?{}", main, params)
        };
        encode_base64_url(full.as_bytes())
    }

    #[test]
    fn test_parse_basic() {
        let password = encode_base64_url(b"pass123");
        let remarks = encode_base64(b"HK Node");
        let payload = make_payload(
            &format!("1.2.3.4:8388:origin:aes-256-cfb:plain:{}", password),
            &format!("remarks={}", remarks),
        );
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.server, "1.2.3.4");
        assert_eq!(config.port, 8388);
        assert_eq!(config.name, "HK Node");
        assert!(matches!(
            config.credential,
            Credential::SsrBundle { ref protocol, ref method, ref obfs, ref password, .. }
                if protocol == "origin" && method == "aes-256-cfb"
                    && obfs == "plain" && password == "pass123"
        ));
    }

    #[test]
    fn test_lenient_param_decode() {
        let password = encode_base64_url(b"pw");
        let payload = make_payload(
            &format!("example.com:443:auth_aes128_md5:rc4-md5:http_simple:{}", password),
            "obfsparam=%%%garbage&protoparam=",
        );
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert!(matches!(
            config.credential,
            Credential::SsrBundle { ref obfs_param, ref protocol_param, .. }
                if obfs_param.is_empty() && protocol_param.is_empty()
        ));
    }

    #[test]
    fn test_too_few_fields_rejected() {
        let payload = encode_base64_url(b"example.com:443:origin:aes-256-cfb");
        assert!(matches!(
            parse(&payload, &ParseOptions::default()),
            Err(Error::MalformedScheme(_))
        ));
    }

    #[test]
    fn test_ipv6_server() {
        let password = encode_base64_url(b"pw");
        let payload = make_payload(
            &format!("[2001:db8::1]:443:origin:aes-256-cfb:plain:{}", password),
            "",
        );
        let config = parse(&payload, &ParseOptions::default()).unwrap();
        assert_eq!(config.server, "2001:db8::1");
    }

    #[test]
    fn test_bad_password_base64_rejected() {
        let payload = make_payload("1.2.3.4:443:origin:aes-256-cfb:plain:@@@@@", "");
        assert!(matches!(
            parse(&payload, &ParseOptions::default()),
            Err(Error::InvalidCredential(_))
        ));
    }
}
