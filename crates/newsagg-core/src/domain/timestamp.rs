use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Wall-clock instant in UTC, rendered as RFC3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    pub fn to_rfc3339(self) -> String {
        // Years outside 0..=9999 cannot be rendered as RFC3339.
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetched_at_serializes_as_rfc3339() {
        let epoch = UtcDateTime(OffsetDateTime::UNIX_EPOCH);
        assert_eq!(
            serde_json::to_value(epoch).expect("serialize"),
            serde_json::json!("1970-01-01T00:00:00Z")
        );
    }

    #[test]
    fn now_is_in_utc() {
        assert!(UtcDateTime::now().to_string().ends_with('Z'));
    }
}
