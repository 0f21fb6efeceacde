use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Unique provider identifier used as registry key, cache-key prefix and
/// aggregate slot name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(Arc<str>);

impl ProviderId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyProviderName);
        }

        if trimmed.chars().any(char::is_control) {
            return Err(ValidationError::InvalidProviderName {
                value: trimmed.to_owned(),
            });
        }

        Ok(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.as_str().to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_keep_their_case() {
        let id = ProviderId::parse(" the-guardian_v2 ").expect("valid provider");
        assert_eq!(id.as_str(), "the-guardian_v2");

        for name in ["A", "NewsAPI", "New York Times"] {
            assert_eq!(ProviderId::parse(name).expect("valid provider").as_str(), name);
        }
    }

    #[test]
    fn rejects_blank_names_and_control_characters() {
        assert_eq!(ProviderId::parse("  "), Err(ValidationError::EmptyProviderName));
        assert!(matches!(
            ProviderId::parse("news\napi"),
            Err(ValidationError::InvalidProviderName { .. })
        ));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ProviderId::parse("nytimes").expect("valid provider");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"nytimes\"");

        let decoded: ProviderId = serde_json::from_str("\"newsapi\"").expect("deserialize");
        assert_eq!(decoded.as_str(), "newsapi");
    }
}
