//! Topic keys: `<namespace>.<host id>`, one per monitored host.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::host::HostId;

pub const DEFAULT_NAMESPACE: &str = "host.stats";

/// Maps a host identity to the topic its collector publishes on.
///
/// The directory owns the scheme and hands the resulting topic out with each
/// host entry; collectors and viewers only fall back to it when no directory
/// is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicScheme {
    namespace: String,
}

impl TopicScheme {
    pub fn new(namespace: impl Into<String>) -> Result<Self, ValidationError> {
        let namespace = namespace.into();
        let invalid = namespace.is_empty()
            || namespace.ends_with('.')
            || namespace
                .chars()
                .any(|c| c == '+' || c == '#' || c.is_whitespace());
        if invalid {
            return Err(ValidationError::InvalidNamespace(namespace));
        }
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn topic_for(&self, id: HostId) -> String {
        format!("{}.{}", self.namespace, id)
    }
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl TryFrom<String> for TopicScheme {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TopicScheme> for String {
    fn from(scheme: TopicScheme) -> Self {
        scheme.namespace
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scheme() {
        assert_eq!(TopicScheme::default().topic_for(1), "host.stats.1");
    }

    #[test]
    fn test_custom_namespace() {
        let scheme = TopicScheme::new("lab.metrics").unwrap();
        assert_eq!(scheme.topic_for(42), "lab.metrics.42");
    }

    #[test]
    fn test_rejects_wildcards_and_blanks() {
        for bad in ["", "host.#", "host.+.stats", "host stats", "host."] {
            assert!(TopicScheme::new(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: TopicScheme = serde_json::from_str("\"edge\"").unwrap();
        assert_eq!(ok.namespace(), "edge");
        assert!(serde_json::from_str::<TopicScheme>("\"a#b\"").is_err());
    }
}
