//! User roles and the capability table.
//!
//! Every role-dependent decision in the API goes through [`Role::can`] or one of
//! the role mappings below; handlers never compare role strings.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use super::library::CreatorType;
use super::media::UploaderType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Artist,
}

/// Actions whose availability depends on the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    UploadMedia,
    ManageProducts,
    ViewAnySubscription,
    CreateArtistProfile,
    PublishPublicPlaylist,
}

impl Role {
    pub fn can(self, capability: Capability) -> bool {
        use Capability::*;
        match (self, capability) {
            (_, UploadMedia) => true,
            (Role::Admin, ManageProducts | ViewAnySubscription) => true,
            (Role::User, CreateArtistProfile) => true,
            (Role::Admin | Role::Artist, PublishPublicPlaylist) => true,
            _ => false,
        }
    }

    /// Uploader tag recorded on media. Anything that is not an admin uploads as an artist.
    pub fn uploader_type(self) -> UploaderType {
        match self {
            Role::Admin => UploaderType::Admin,
            Role::Artist | Role::User => UploaderType::Artist,
        }
    }

    pub fn creator_type(self) -> CreatorType {
        match self {
            Role::User => CreatorType::User,
            Role::Admin => CreatorType::Admin,
            Role::Artist => CreatorType::Artist,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Artist => "artist",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            "artist" => Ok(Role::Artist),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Capability::UploadMedia => "upload media",
            Capability::ManageProducts => "manage products",
            Capability::ViewAnySubscription => "view other users' subscriptions",
            Capability::CreateArtistProfile => "create an artist profile",
            Capability::PublishPublicPlaylist => "publish public playlists",
        };
        f.write_str(name)
    }
}
