//! Local field mutations that are propagated to the server

use serde::{Deserialize, Serialize};

use super::{PendingFields, ReadProgress};

/// A single user edit to one bookmark field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FieldChange {
    /// Favorite ("marked") flag
    Favorite(bool),
    /// Archived flag
    Archived(bool),
    /// Read progress percentage
    ReadProgress(ReadProgress),
}

impl FieldChange {
    /// Pending-edit flag this change sets on the local row.
    pub const fn pending_flag(self) -> PendingFields {
        match self {
            Self::Favorite(_) => PendingFields::FAVORITE,
            Self::Archived(_) => PendingFields::ARCHIVED,
            Self::ReadProgress(_) => PendingFields::READ_PROGRESS,
        }
    }

    /// Field name as used in log lines and CLI output.
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Favorite(_) => "is_favorite",
            Self::Archived(_) => "is_archived",
            Self::ReadProgress(_) => "read_progress",
        }
    }
}
