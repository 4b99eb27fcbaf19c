//! ICE server configuration parsing.
//!
//! `stt.ice_servers_json` carries a JSON array whose entries are either a
//! bare URL string or `{urls, username?, credential?}`. An absent or empty
//! configuration falls back to the single default STUN server.

use serde::{Deserialize, Serialize};

use crate::webrtc::DEFAULT_STUN_SERVER;
use crate::TransportError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum IceServerEntry {
    Url(String),
    Full {
        urls: IceUrls,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        credential: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum IceUrls {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct IceServer {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl Default for IceServer {
    fn default() -> Self {
        Self {
            urls: vec![DEFAULT_STUN_SERVER.to_string()],
            username: None,
            credential: None,
        }
    }
}

/// Parses `stt.ice_servers_json`, falling back to the default STUN server
/// when the configuration is absent or empty.
pub fn parse_ice_servers(json: Option<&str>) -> Result<Vec<IceServer>, TransportError> {
    let Some(json) = json.filter(|s| !s.trim().is_empty()) else {
        return Ok(vec![IceServer::default()]);
    };

    let entries: Vec<IceServerEntry> = serde_json::from_str(json)
        .map_err(|e| TransportError::ConnectionFailed(format!("invalid ice_servers_json: {e}")))?;

    if entries.is_empty() {
        return Ok(vec![IceServer::default()]);
    }

    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            IceServerEntry::Url(url) => IceServer {
                urls: vec![url],
                username: None,
                credential: None,
            },
            IceServerEntry::Full { urls, username, credential } => IceServer {
                urls: match urls {
                    IceUrls::One(u) => vec![u],
                    IceUrls::Many(u) => u,
                },
                username,
                credential,
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_falls_back_to_default_stun() {
        let servers = parse_ice_servers(None).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].urls[0], DEFAULT_STUN_SERVER);
    }

    #[test]
    fn parses_mixed_url_and_object_entries() {
        let json = r#"["stun:stun.example.com:3478", {"urls":"turn:turn.example.com:3478","username":"u","credential":"p"}]"#;
        let servers = parse_ice_servers(Some(json)).unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].urls[0], "stun:stun.example.com:3478");
        assert_eq!(servers[1].username.as_deref(), Some("u"));
    }

    #[test]
    fn empty_array_falls_back_to_default() {
        let servers = parse_ice_servers(Some("[]")).unwrap();
        assert_eq!(servers.len(), 1);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(parse_ice_servers(Some("not json")).is_err());
    }
}
