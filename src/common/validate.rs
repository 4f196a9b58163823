//! Structural validators: UUIDs, ciphers, server addresses, ports

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::net::IpAddr;
use uuid::Uuid;

/// Shadowsocks ciphers accepted by the canonical model.
pub static SUPPORTED_CIPHERS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "aes-128-gcm",
        "aes-192-gcm",
        "aes-256-gcm",
        "aes-128-cfb",
        "aes-192-cfb",
        "aes-256-cfb",
        "aes-128-ctr",
        "aes-192-ctr",
        "aes-256-ctr",
        "rc4-md5",
        "chacha20-ietf",
        "xchacha20",
        "chacha20-ietf-poly1305",
        "xchacha20-ietf-poly1305",
        "2022-blake3-aes-128-gcm",
        "2022-blake3-aes-256-gcm",
        "2022-blake3-chacha20-poly1305",
        "none",
    ])
});

/// Normalize cipher aliases to their canonical names.
pub fn normalize_cipher(cipher: &str) -> String {
    match cipher {
        "chacha20-poly1305" => "chacha20-ietf-poly1305".to_string(),
        "xchacha20-poly1305" => "xchacha20-ietf-poly1305".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

pub fn is_supported_cipher(cipher: &str) -> bool {
    SUPPORTED_CIPHERS.contains(cipher)
}

/// Strict RFC-4122 hex-dash form: 8-4-4-4-12. `Uuid::try_parse` also
/// accepts simple and braced forms, so the length pins it to hyphenated.
pub fn is_valid_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}

/// Accept an IPv4/IPv6 literal or a hostname-shaped label sequence.
pub fn is_valid_server(server: &str) -> bool {
    if server.is_empty() || server.len() > 253 {
        return false;
    }
    if server.parse::<IpAddr>().is_ok() {
        return true;
    }
    server.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// Parse a port string, enforcing the 1-65535 range.
pub fn parse_port(s: &str) -> Option<u16> {
    match s.trim().parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => Some(p as u16),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_forms() {
        assert!(is_valid_uuid("123e4567-e89b-12d3-a456-426614174000"));
        // simple (no dashes) and braced forms are not canonical
        assert!(!is_valid_uuid("123e4567e89b12d3a456426614174000"));
        assert!(!is_valid_uuid("{123e4567-e89b-12d3-a456-426614174000}"));
        assert!(!is_valid_uuid("not-a-uuid"));
        assert!(!is_valid_uuid(""));
    }

    #[test]
    fn test_cipher_normalization() {
        assert_eq!(normalize_cipher("chacha20-poly1305"), "chacha20-ietf-poly1305");
        assert_eq!(normalize_cipher("AES-256-GCM"), "aes-256-gcm");
        assert!(is_supported_cipher("aes-128-gcm"));
        assert!(is_supported_cipher("2022-blake3-aes-256-gcm"));
        assert!(!is_supported_cipher("rot13"));
    }

    #[test]
    fn test_server_shapes() {
        assert!(is_valid_server("1.2.3.4"));
        assert!(is_valid_server("2001:db8::1"));
        assert!(is_valid_server("example.com"));
        assert!(is_valid_server("my_host.example-1.net"));
        assert!(!is_valid_server(""));
        assert!(!is_valid_server("bad host"));
        assert!(!is_valid_server("-leading.example.com"));
        assert!(!is_valid_server("double..dot"));
    }

    #[test]
    fn test_port_range() {
        assert_eq!(parse_port("443"), Some(443));
        assert_eq!(parse_port("1"), Some(1));
        assert_eq!(parse_port("65535"), Some(65535));
        assert_eq!(parse_port("0"), None);
        assert_eq!(parse_port("65536"), None);
        assert_eq!(parse_port("-1"), None);
        assert_eq!(parse_port("http"), None);
    }
}
