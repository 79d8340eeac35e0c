use serde::{Deserialize, Serialize};

/// JWT claims shared between the gateway (WebSocket handshake) and any
/// token-issuing tooling. Canonical definition lives here in scrawl-types
/// to eliminate duplication.
///
/// `sub` is optional on purpose: a structurally valid, correctly signed
/// token that carries no identity claim must be distinguishable from a
/// token that fails signature or expiry checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: usize,
}
