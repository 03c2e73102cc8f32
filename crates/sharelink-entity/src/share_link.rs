//! Share link row model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A row of `public.share_links`.
///
/// Columns with a database default are `Option` because the table does not
/// declare them `NOT NULL`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ShareLink {
    /// Unique link identifier.
    pub id: Uuid,
    /// Prompt being shared.
    pub prompt_id: Uuid,
    /// Workspace owning the prompt.
    pub workspace_id: Uuid,
    /// Public URL slug, unique across all links.
    pub slug: String,
    /// Password hash for protected links.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    /// When the link stops resolving.
    pub expires_at: Option<DateTime<Utc>>,
    /// View cap.
    pub max_views: Option<i32>,
    /// Views so far.
    pub current_views: Option<i32>,
    /// Whether viewers may copy the prompt.
    pub allow_copying: Option<bool>,
    /// Whether prompt variables are shown.
    pub show_variables: Option<bool>,
    /// User who created the link.
    pub created_by: Option<Uuid>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last time the link was opened.
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// Whether the link is enabled.
    pub is_active: Option<bool>,
}

impl ShareLink {
    /// Whether anonymous readers may see this row at `now`.
    ///
    /// Mirrors the `anyone_view_active_share_links` policy predicate: the link
    /// is active and either never expires or expires after `now`. A `NULL`
    /// `is_active` is not visible, as in SQL.
    pub fn is_viewable_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_active != Some(true) {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}
