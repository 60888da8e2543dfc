use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub street: String,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAddressRequest {
    #[validate(length(min = 1, max = 255))]
    pub street: String,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
    #[validate(length(max = 120))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 120))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAddressRequest {
    #[validate(length(min = 1, max = 255))]
    pub street: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub city: Option<String>,
    #[validate(length(max = 120))]
    pub state: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: Option<String>,
    #[validate(length(min = 2, max = 120))]
    pub country: Option<String>,
    pub is_default: Option<bool>,
}
