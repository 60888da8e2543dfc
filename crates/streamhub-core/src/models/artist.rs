use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Artist {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    #[schema(value_type = Object)]
    pub social_links: serde_json::Value,
    pub genres: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Artist listing row with follow information for the caller.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ArtistSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub genres: Vec<String>,
    pub follower_count: i64,
    pub is_followed: bool,
}

/// Followed artists first, then alphabetical by name.
pub fn sort_for_listing(artists: &mut [ArtistSummary]) {
    artists.sort_by(|a, b| {
        b.is_followed
            .cmp(&a.is_followed)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateArtistRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(url)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub social_links: HashMap<String, String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateArtistRequest {
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(url)]
    pub profile_picture: Option<String>,
    pub social_links: Option<HashMap<String, String>>,
    pub genres: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str, is_followed: bool) -> ArtistSummary {
        ArtistSummary {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            bio: None,
            profile_picture: None,
            genres: vec![],
            follower_count: 0,
            is_followed,
        }
    }

    #[test]
    fn followed_artists_sort_first_then_by_name() {
        let mut artists = vec![
            summary("zed", false),
            summary("Mia", true),
            summary("amy", false),
            summary("Bob", true),
        ];
        sort_for_listing(&mut artists);
        let names: Vec<&str> = artists.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Bob", "Mia", "amy", "zed"]);
    }
}
