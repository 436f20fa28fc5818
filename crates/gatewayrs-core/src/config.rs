//! Top-level configuration (§6): transport mode, bind address, and the
//! static upstream peer map. Loading this from YAML/env is ambient
//! infrastructure owned by the CLI crate; this module only owns the shape
//! and the validation rules.

use crate::error::GatewayError;
use crate::model::{PeerName, UpstreamPeerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Stream,
    Framed,
}

impl Default for TransportMode {
    fn default() -> Self {
        TransportMode::Framed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub transport: TransportMode,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, rename = "mcpClients")]
    pub mcp_clients: HashMap<PeerName, UpstreamPeerConfig>,
}

impl GatewayConfig {
    /// `transport ∈ {stream, framed}`; framed additionally requires `port`
    /// and `host`. Stream mode ignores them if present.
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.transport == TransportMode::Framed {
            if self.port.is_none() {
                return Err(GatewayError::ConfigInvalid(
                    "transport \"framed\" requires \"port\"".to_string(),
                ));
            }
            if self.host.is_none() {
                return Err(GatewayError::ConfigInvalid(
                    "transport \"framed\" requires \"host\"".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framed_without_port_is_invalid() {
        let cfg = GatewayConfig {
            transport: TransportMode::Framed,
            port: None,
            host: Some("0.0.0.0".to_string()),
            mcp_clients: HashMap::new(),
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn stream_mode_ignores_missing_port_and_host() {
        let cfg = GatewayConfig {
            transport: TransportMode::Stream,
            port: None,
            host: None,
            mcp_clients: HashMap::new(),
        };
        assert!(cfg.validate().is_ok());
    }
}
