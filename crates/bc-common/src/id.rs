//! Session identity types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Session ID for tracking capture sessions.
///
/// Format: `cap-<date>-<time>-<random>`
/// Example: `cap-20260115-143022-abc123`
///
/// Used as the per-session directory name by file sinks, so it only
/// contains characters that are safe in a path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new session ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let random: String = uuid::Uuid::new_v4()
            .to_string()
            .chars()
            .take(6)
            .collect();
        SessionId(format!("cap-{}-{}", now.format("%Y%m%d-%H%M%S"), random))
    }

    /// Parse an existing session ID string.
    pub fn parse(s: &str) -> Option<Self> {
        let safe = s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if s.starts_with("cap-") && s.len() > 20 && safe {
            Some(SessionId(s.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_format() {
        let sid = SessionId::new();
        assert!(sid.0.starts_with("cap-"));
        assert!(sid.0.len() > 20);
        assert!(SessionId::parse(sid.as_str()).is_some());
    }

    #[test]
    fn test_parse_rejects_path_separators() {
        assert!(SessionId::parse("cap-20260115-143022-../../x").is_none());
        assert!(SessionId::parse("sess-20260115-143022-abc123").is_none());
    }
}
