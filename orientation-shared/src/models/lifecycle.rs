/// Program and template lifecycle
///
/// ```text
/// draft → published → deprecated → archived
///   ↑__________________________________|  (restore)
/// ```
///
/// Transitions are unconditional status writes: any lifecycle action may be
/// applied from any state, and the only gate is the RBAC check on the action
/// name. `restore` returns a row to `draft` and clears its soft delete.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::auth::policy::Action;

/// Status shared by programs and task templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lifecycle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    Draft,
    Published,
    Deprecated,
    Archived,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Draft => "draft",
            LifecycleStatus::Published => "published",
            LifecycleStatus::Deprecated => "deprecated",
            LifecycleStatus::Archived => "archived",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(LifecycleStatus::Draft),
            "published" => Ok(LifecycleStatus::Published),
            "deprecated" => Ok(LifecycleStatus::Deprecated),
            "archived" => Ok(LifecycleStatus::Archived),
            other => Err(format!("Unknown status: {}", other)),
        }
    }
}

/// Lifecycle actions exposed as `POST /api/{programs,templates}/:id/<action>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleAction {
    Publish,
    Deprecate,
    Archive,
    Restore,
}

impl LifecycleAction {
    /// Status written by the action
    pub fn target_status(&self) -> LifecycleStatus {
        match self {
            LifecycleAction::Publish => LifecycleStatus::Published,
            LifecycleAction::Deprecate => LifecycleStatus::Deprecated,
            LifecycleAction::Archive => LifecycleStatus::Archived,
            LifecycleAction::Restore => LifecycleStatus::Draft,
        }
    }

    /// Policy action that gates this lifecycle action
    pub fn policy_action(&self) -> Action {
        match self {
            LifecycleAction::Publish => Action::Publish,
            LifecycleAction::Deprecate => Action::Deprecate,
            LifecycleAction::Archive => Action::Archive,
            LifecycleAction::Restore => Action::Restore,
        }
    }

    /// Whether the action also clears `deleted_at`
    pub fn clears_soft_delete(&self) -> bool {
        matches!(self, LifecycleAction::Restore)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Publish => "publish",
            LifecycleAction::Deprecate => "deprecate",
            LifecycleAction::Archive => "archive",
            LifecycleAction::Restore => "restore",
        }
    }
}

impl FromStr for LifecycleAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "publish" => Ok(LifecycleAction::Publish),
            "deprecate" => Ok(LifecycleAction::Deprecate),
            "archive" => Ok(LifecycleAction::Archive),
            "restore" => Ok(LifecycleAction::Restore),
            other => Err(format!("Unknown lifecycle action: {}", other)),
        }
    }
}
