use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored login: the site it belongs to plus the username/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub website: String,
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(
        website: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            website: website.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.website.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

/// Identifies a single retrieve cycle so the rendering view never shows a batch
/// staged by an earlier attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CycleId(pub Uuid);

impl CycleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for CycleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Value written into the staging slot between the initiating and rendering views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedBatch {
    pub cycle_id: CycleId,
    pub staged_at: DateTime<Utc>,
    pub credentials: Vec<Credential>,
}

impl StagedBatch {
    pub fn new(cycle_id: CycleId, credentials: Vec<Credential>) -> Self {
        Self {
            cycle_id,
            staged_at: Utc::now(),
            credentials,
        }
    }
}
