//! Serializers: canonical model out to share URIs, Clash YAML, and
//! sing-box JSON.
//!
//! Each serializer is the inverse of its parser: feeding its output
//! back through `parse_uri` / `parse_clash_proxy` yields a config with
//! the same dedup key.

pub mod clash;
pub mod singbox;
pub mod uri;
