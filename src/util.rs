//! Small serde helpers shared across config and monitoring types.

/// Serializes a [`std::time::Duration`] as whole milliseconds. `serde`
/// has no blanket impl for `Duration`, so every config/monitoring struct
/// that carries one names this module via `#[serde(with = "...")]`.
pub mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (value.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
