use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type HostId = u64;

/// A monitorable host as registered in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub id: HostId,
    pub name: String,
    pub ip: String,
    #[serde(default)]
    pub desc: String,
}

impl HostRecord {
    pub fn new(
        id: HostId,
        name: impl Into<String>,
        ip: impl Into<String>,
        desc: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            ip: ip.into(),
            desc: desc.into(),
        }
    }

    /// `name` and `ip` are required; `desc` is free text and may be empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField("name"));
        }
        if self.ip.trim().is_empty() {
            return Err(ValidationError::EmptyField("ip"));
        }
        Ok(())
    }
}

/// A directory entry as served to clients: the record plus its topic key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostView {
    #[serde(flatten)]
    pub record: HostRecord,
    pub topic: String,
}

impl HostView {
    pub fn id(&self) -> HostId {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }
}
