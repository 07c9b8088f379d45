//! Revision value type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded revision found in the remote directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    #[serde(rename = "revision")]
    pub identifier: String,
    /// Modification time of the revision's remote file.
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "active")]
    pub is_active: bool,
}
