//! External clients and application state construction

use crate::state::{AppState, AuthServices, CommerceState, DbState, MediaState};
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;
use streamhub_core::Config;
use streamhub_services::{
    JwksIdentityVerifier, MediaConvertTranscoder, NotificationService, StripeGateway,
};
use streamhub_storage::S3Storage;

const DEFAULT_REGION: &str = "us-east-1";

/// Builds the AWS, Stripe, SMTP/SMS and JWKS clients once and wraps them in
/// the shared application state.
pub async fn initialize_services(config: &Config, pool: PgPool) -> Result<Arc<AppState>> {
    let media_config = config.media();
    let region = media_config
        .aws_region
        .clone()
        .unwrap_or_else(|| DEFAULT_REGION.to_string());

    let storage = S3Storage::new(
        media_config.s3_bucket.clone(),
        region.clone(),
        media_config.s3_bucket_url.clone(),
        media_config.s3_endpoint.clone(),
    )
    .await
    .context("Failed to initialize S3 storage")?;
    tracing::info!(bucket = %media_config.s3_bucket, region = %region, "S3 storage initialized");

    let transcoder = MediaConvertTranscoder::new(
        region,
        media_config.mediaconvert_endpoint.clone(),
        media_config.s3_bucket.clone(),
        media_config.mediaconvert_role.clone(),
        media_config.mediaconvert_queue.clone(),
    )
    .await
    .context("Failed to initialize MediaConvert client")?;

    let payment_config = config.payment();
    let gateway = StripeGateway::new(
        payment_config.stripe_api_base.clone(),
        payment_config.stripe_secret_key.clone(),
    )
    .context("Failed to initialize payment gateway")?;

    let notification_config = config.notification();
    let notifier = NotificationService::from_config(notification_config);
    let identity = JwksIdentityVerifier::new(
        notification_config.google_client_ids.clone(),
        notification_config.apple_client_ids.clone(),
    );
    if notification_config.google_client_ids.is_empty()
        && notification_config.apple_client_ids.is_empty()
    {
        tracing::warn!("No OAuth client ids configured, social sign-in is disabled");
    }

    let state = AppState {
        db: DbState::new(pool),
        media: MediaState {
            storage: Arc::new(storage),
            transcoder: Arc::new(transcoder),
            bucket_url: media_config.s3_bucket_url.trim_end_matches('/').to_string(),
        },
        commerce: CommerceState {
            gateway: Arc::new(gateway),
            webhook_secret: payment_config.stripe_webhook_secret.clone(),
            currency: payment_config.currency.clone(),
        },
        auth: AuthServices {
            jwt_secret: config.jwt_secret().to_string(),
            jwt_expiry_days: config.jwt_expiry_days(),
            notifier: Arc::new(notifier),
            identity: Arc::new(identity),
        },
        is_production: config.is_production(),
        config: config.clone(),
    };

    Ok(Arc::new(state))
}
