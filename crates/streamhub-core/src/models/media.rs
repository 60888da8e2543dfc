use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "media_type", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Music,
    Podcast,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "visibility", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Unlisted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "uploader_type", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum UploaderType {
    Admin,
    Artist,
}

/// Lifecycle of a media record: pending -> processing -> completed | failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "transcoding_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum TranscodingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl Display for TranscodingStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TranscodingStatus::Pending => write!(f, "pending"),
            TranscodingStatus::Processing => write!(f, "processing"),
            TranscodingStatus::Completed => write!(f, "completed"),
            TranscodingStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "resolution"))]
pub enum Resolution {
    #[serde(rename = "240p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "240p"))]
    P240,
    #[serde(rename = "480p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "480p"))]
    P480,
    #[serde(rename = "720p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "720p"))]
    P720,
    #[serde(rename = "1080p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "1080p"))]
    P1080,
    #[serde(rename = "1440p")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "1440p"))]
    P1440,
    #[serde(rename = "4K")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "4K"))]
    P2160,
}

impl Resolution {
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::P240 => "240p",
            Resolution::P480 => "480p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
            Resolution::P1440 => "1440p",
            Resolution::P2160 => "4K",
        }
    }
}

impl Display for Resolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "240p" => Ok(Resolution::P240),
            "480p" => Ok(Resolution::P480),
            "720p" => Ok(Resolution::P720),
            "1080p" => Ok(Resolution::P1080),
            "1440p" => Ok(Resolution::P1440),
            "4K" | "4k" | "2160p" => Ok(Resolution::P2160),
            other => Err(format!("unsupported resolution: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "stream_format", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum StreamFormat {
    Hls,
    Dash,
    Mp4,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Media {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub media_type: MediaType,
    pub visibility: Visibility,
    pub uploaded_by: Uuid,
    pub uploader_type: UploaderType,
    pub s3_key_original: String,
    pub upload_id: Option<String>,
    pub transcode_job_id: Option<String>,
    pub transcoding_status: TranscodingStatus,
    /// Master playlist URL; present iff transcoding completed.
    pub media_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub captions_url: Option<String>,
    pub duration_seconds: Option<i32>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub age_rating: Option<String>,
    pub is_active: bool,
    pub is_published: bool,
    pub is_premium: bool,
    pub views: i64,
    pub like_count: i64,
    pub dislike_count: i64,
    pub shares_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Media {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.uploaded_by == user_id
    }

    /// Public media is readable by anyone; everything else only by its owner.
    pub fn is_accessible_by(&self, user_id: Uuid) -> bool {
        self.visibility == Visibility::Public || self.is_owned_by(user_id)
    }

    /// File name of the original object without its extension.
    pub fn original_stem(&self) -> &str {
        file_stem(&self.s3_key_original)
    }
}

/// `uploads/u/x/clip.final.mp4` -> `clip.final`
pub fn file_stem(key: &str) -> &str {
    let name = key.rsplit('/').next().unwrap_or(key);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MediaVariant {
    pub id: Uuid,
    pub media_id: Uuid,
    pub resolution: Resolution,
    pub stream_url: String,
    pub bitrate_kbps: i32,
    pub file_size: Option<i64>,
    pub format: StreamFormat,
    pub created_at: DateTime<Utc>,
}

/// A variant about to be written by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVariant {
    pub resolution: Resolution,
    pub stream_url: String,
    pub bitrate_kbps: i32,
    pub format: StreamFormat,
}

/// One output rendition of the transcoding ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rung {
    pub resolution: Resolution,
    pub width: i32,
    pub height: i32,
    pub max_bitrate_kbps: i32,
    pub name_modifier: &'static str,
}

/// The fixed HLS ladder every upload is transcoded into.
pub struct RenditionLadder;

impl RenditionLadder {
    pub const SEGMENT_SECONDS: i32 = 6;
    pub const AUDIO_BITRATE: i32 = 96_000;
    pub const AUDIO_SAMPLE_RATE: i32 = 48_000;

    pub const RUNGS: [Rung; 6] = [
        Rung {
            resolution: Resolution::P240,
            width: 426,
            height: 240,
            max_bitrate_kbps: 500,
            name_modifier: "_240p",
        },
        Rung {
            resolution: Resolution::P480,
            width: 854,
            height: 480,
            max_bitrate_kbps: 1000,
            name_modifier: "_480p",
        },
        Rung {
            resolution: Resolution::P720,
            width: 1280,
            height: 720,
            max_bitrate_kbps: 2500,
            name_modifier: "_720p",
        },
        Rung {
            resolution: Resolution::P1080,
            width: 1920,
            height: 1080,
            max_bitrate_kbps: 5000,
            name_modifier: "_1080p",
        },
        Rung {
            resolution: Resolution::P1440,
            width: 2560,
            height: 1440,
            max_bitrate_kbps: 8000,
            name_modifier: "_1440p",
        },
        Rung {
            resolution: Resolution::P2160,
            width: 3840,
            height: 2160,
            max_bitrate_kbps: 15000,
            name_modifier: "_2160p",
        },
    ];

    /// Storage prefix the transcoder writes into for one media record.
    pub fn output_prefix(media_id: Uuid) -> String {
        format!("transcoded/{}/", media_id)
    }

    pub fn master_playlist_url(bucket_url: &str, media_id: Uuid, stem: &str) -> String {
        format!(
            "{}/{}{}.m3u8",
            bucket_url.trim_end_matches('/'),
            Self::output_prefix(media_id),
            stem
        )
    }

    pub fn variants_for(bucket_url: &str, media_id: Uuid, stem: &str) -> Vec<NewVariant> {
        let base = format!(
            "{}/{}",
            bucket_url.trim_end_matches('/'),
            Self::output_prefix(media_id)
        );
        Self::RUNGS
            .iter()
            .map(|rung| NewVariant {
                resolution: rung.resolution,
                stream_url: format!("{}{}{}.m3u8", base, stem, rung.name_modifier),
                bitrate_kbps: rung.max_bitrate_kbps,
                format: StreamFormat::Hls,
            })
            .collect()
    }
}

/// Accepts either a JSON array or a comma-separated string.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum StringList {
    List(Vec<String>),
    Csv(String),
}

impl StringList {
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            StringList::List(items) => items,
            StringList::Csv(s) => s.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitiateUploadRequest {
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(min = 1, max = 255))]
    pub content_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiateUploadResponse {
    pub upload_id: String,
    pub key: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PartUrlsRequest {
    #[validate(length(min = 1))]
    pub upload_id: String,
    #[validate(length(min = 1))]
    pub key: String,
    #[validate(range(min = 1, max = 10000))]
    pub parts: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartUrl {
    pub part_number: i32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Catalog metadata supplied when an upload completes.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MediaMetadata {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub visibility: Visibility,
    pub genres: Option<StringList>,
    pub tags: Option<StringList>,
    pub duration_seconds: Option<i32>,
    pub release_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub age_rating: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompleteUploadRequest {
    #[validate(length(min = 1))]
    pub upload_id: String,
    #[validate(length(min = 1))]
    pub key: String,
    #[validate(length(min = 1))]
    pub parts: Vec<CompletedPart>,
    #[validate(nested)]
    #[serde(flatten)]
    pub metadata: MediaMetadata,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AbortUploadRequest {
    #[validate(length(min = 1))]
    pub upload_id: String,
    #[validate(length(min = 1))]
    pub key: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccessUrlRequest {
    pub media_id: Uuid,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignedAccess {
    pub url: String,
    pub expires_in: u64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MediaListQuery {
    pub visibility: Option<Visibility>,
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    /// Comma-separated genre filter
    pub genres: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMediaRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
    pub genres: Option<StringList>,
    pub tags: Option<StringList>,
    pub release_date: Option<NaiveDate>,
    pub language: Option<String>,
    pub age_rating: Option<String>,
    pub is_published: Option<bool>,
    pub is_premium: Option<bool>,
    pub captions_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ThumbnailUploadRequest {
    pub media_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(min = 1, max = 255))]
    pub content_type: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThumbnailUploadResponse {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmThumbnailRequest {
    #[validate(length(min = 1))]
    pub key: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MediaWithVariants {
    pub media: Media,
    pub variants: Vec<MediaVariant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_has_six_rungs_in_ascending_order() {
        let heights: Vec<i32> = RenditionLadder::RUNGS.iter().map(|r| r.height).collect();
        assert_eq!(heights, vec![240, 480, 720, 1080, 1440, 2160]);
    }

    #[test]
    fn variant_urls_follow_the_stem_naming() {
        let id = Uuid::nil();
        let variants = RenditionLadder::variants_for("https://cdn.example.com/", id, "clip");
        assert_eq!(variants.len(), 6);
        assert_eq!(
            variants[0].stream_url,
            format!("https://cdn.example.com/transcoded/{}/clip_240p.m3u8", id)
        );
        let top = variants.last().unwrap();
        assert_eq!(top.resolution, Resolution::P2160);
        assert!(top.stream_url.ends_with("clip_2160p.m3u8"));
        assert_eq!(top.bitrate_kbps, 15000);
        assert!(variants.iter().all(|v| v.format == StreamFormat::Hls));
    }

    #[test]
    fn master_playlist_sits_next_to_variants() {
        let id = Uuid::nil();
        assert_eq!(
            RenditionLadder::master_playlist_url("https://cdn.example.com", id, "clip"),
            format!("https://cdn.example.com/transcoded/{}/clip.m3u8", id)
        );
    }

    #[test]
    fn file_stem_strips_only_the_last_extension() {
        assert_eq!(file_stem("uploads/u/x/clip.mp4"), "clip");
        assert_eq!(file_stem("uploads/u/x/clip.final.mov"), "clip.final");
        assert_eq!(file_stem("noext"), "noext");
        assert_eq!(file_stem("uploads/.hidden"), ".hidden");
    }

    #[test]
    fn string_list_accepts_csv_and_arrays() {
        let csv: StringList = serde_json::from_str(r#""rock, jazz,,pop""#).unwrap();
        assert_eq!(csv.into_vec(), vec!["rock", "jazz", "pop"]);

        let list: StringList = serde_json::from_str(r#"["rock", " jazz "]"#).unwrap();
        assert_eq!(list.into_vec(), vec!["rock", "jazz"]);
    }

    #[test]
    fn resolution_round_trips_its_wire_names() {
        assert_eq!("4K".parse::<Resolution>(), Ok(Resolution::P2160));
        assert_eq!(
            serde_json::to_string(&Resolution::P720).unwrap(),
            r#""720p""#
        );
    }
}
