//! Resource-URI codec (component B).
//!
//! Encodes/decodes the `agg://{peer}/{original}` namespacing scheme for
//! resources, and the `{peer}/{original}` scheme for prompts.

use crate::error::GatewayError;

const RESOURCE_PREFIX: &str = "agg://";

/// Build a namespaced resource URI from a peer name and the peer's own URI.
pub fn encode_resource_uri(peer: &str, original: &str) -> String {
    format!("{RESOURCE_PREFIX}{peer}/{original}")
}

/// Parse a namespaced resource URI back into `(peer, original)`.
///
/// Fails with `BadIdentifier` if the `agg://` prefix is missing, there is no
/// `/` separator, or either half is empty.
pub fn decode_resource_uri(namespaced: &str) -> Result<(String, String), GatewayError> {
    let rest = namespaced.strip_prefix(RESOURCE_PREFIX).ok_or_else(|| {
        GatewayError::BadIdentifier(format!("missing '{RESOURCE_PREFIX}' prefix: {namespaced}"))
    })?;

    let (peer, original) = rest.split_once('/').ok_or_else(|| {
        GatewayError::BadIdentifier(format!("missing separator in resource uri: {namespaced}"))
    })?;

    if peer.is_empty() || original.is_empty() {
        return Err(GatewayError::BadIdentifier(format!(
            "empty peer or resource uri half: {namespaced}"
        )));
    }

    Ok((peer.to_string(), original.to_string()))
}

/// Build a namespaced prompt name. The original name may itself contain `/`.
pub fn encode_prompt_name(peer: &str, original: &str) -> String {
    format!("{peer}/{original}")
}

/// Parse a namespaced prompt name back into `(peer, original)`, splitting on
/// the *first* `/` only (the original half may contain further slashes).
pub fn decode_prompt_name(namespaced: &str) -> Result<(String, String), GatewayError> {
    let (peer, original) = namespaced.split_once('/').ok_or_else(|| {
        GatewayError::BadIdentifier(format!("missing separator in prompt name: {namespaced}"))
    })?;

    if peer.is_empty() || original.is_empty() {
        return Err(GatewayError::BadIdentifier(format!(
            "empty peer or prompt name half: {namespaced}"
        )));
    }

    Ok((peer.to_string(), original.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_round_trip() {
        let encoded = encode_resource_uri("data", "file:///test.json");
        assert_eq!(encoded, "agg://data/file:///test.json");
        let (peer, original) = decode_resource_uri(&encoded).unwrap();
        assert_eq!(peer, "data");
        assert_eq!(original, "file:///test.json");
    }

    #[test]
    fn resource_rejects_missing_prefix() {
        assert!(decode_resource_uri("data/file:///test.json").is_err());
    }

    #[test]
    fn resource_rejects_missing_separator() {
        assert!(decode_resource_uri("agg://onlypeer").is_err());
    }

    #[test]
    fn resource_rejects_empty_halves() {
        assert!(decode_resource_uri("agg:///original").is_err());
        assert!(decode_resource_uri("agg://peer/").is_err());
    }

    #[test]
    fn prompt_round_trip_with_nested_slash() {
        let encoded = encode_prompt_name("github", "team/summary");
        assert_eq!(encoded, "github/team/summary");
        let (peer, original) = decode_prompt_name(&encoded).unwrap();
        assert_eq!(peer, "github");
        assert_eq!(original, "team/summary");
    }

    #[test]
    fn prompt_rejects_missing_separator() {
        assert!(decode_prompt_name("noseparator").is_err());
    }
}
