use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::media::{Resolution, Visibility};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "creator_type", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CreatorType {
    User,
    Admin,
    Artist,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_by: Uuid,
    pub creator_type: CreatorType,
    pub visibility: Visibility,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    /// Only playlists a user created for themselves can be edited through the library.
    pub fn is_modifiable_by(&self, user_id: Uuid) -> bool {
        self.is_active && self.creator_type == CreatorType::User && self.created_by == user_id
    }

    /// Owners always see their playlists; others only see public curated ones.
    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        if !self.is_active {
            return false;
        }
        self.created_by == user_id
            || (self.visibility == Visibility::Public && self.creator_type != CreatorType::User)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PlaylistItem {
    pub media_id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub position: i32,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaylistWithItems {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePlaylistRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    #[serde(default)]
    pub media_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePlaylistRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaylistMediaRequest {
    pub media_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WatchHistoryEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub last_watched_position_seconds: i32,
    pub is_completed: bool,
    pub last_watched_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordWatchRequest {
    pub media_id: Uuid,
    #[validate(range(min = 0))]
    pub last_watched_position_seconds: i32,
    #[serde(default)]
    pub is_completed: bool,
}

/// A favourite or watch-later bookmark joined with its media title.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Bookmark {
    pub media_id: Uuid,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookmarkRequest {
    pub media_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Download {
    pub id: Uuid,
    pub user_id: Uuid,
    pub media_id: Uuid,
    pub variant_id: Uuid,
    pub signed_url: String,
    pub expires_at: DateTime<Utc>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DownloadRequest {
    pub media_id: Uuid,
    pub resolution: Resolution,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist(created_by: Uuid, creator_type: CreatorType, visibility: Visibility) -> Playlist {
        Playlist {
            id: Uuid::new_v4(),
            name: "Road trip".to_string(),
            description: None,
            created_by,
            creator_type,
            visibility,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn only_owner_modifies_user_playlists() {
        let owner = Uuid::new_v4();
        let p = playlist(owner, CreatorType::User, Visibility::Private);
        assert!(p.is_modifiable_by(owner));
        assert!(!p.is_modifiable_by(Uuid::new_v4()));

        let curated = playlist(owner, CreatorType::Artist, Visibility::Public);
        assert!(!curated.is_modifiable_by(owner));
    }

    #[test]
    fn public_curated_playlists_are_visible_to_everyone() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        assert!(playlist(owner, CreatorType::Admin, Visibility::Public).is_visible_to(stranger));
        assert!(!playlist(owner, CreatorType::User, Visibility::Public).is_visible_to(stranger));
        assert!(!playlist(owner, CreatorType::Artist, Visibility::Private).is_visible_to(stranger));
    }
}
