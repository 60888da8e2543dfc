//! Application state and sub-state extractors.
//!
//! External clients live here as `Arc<dyn Trait>` so the binary wires the
//! real AWS/Stripe/SMTP implementations and tests inject fakes.

use sqlx::PgPool;
use std::sync::Arc;
use streamhub_core::Config;
use streamhub_db::{
    AddressRepository, ArtistRepository, LibraryRepository, MediaRepository, PaymentRepository,
    SessionRepository, StoreRepository, SubscriptionRepository, UserRepository,
    VariantRepository, VerificationCodeRepository,
};
use streamhub_services::{IdentityVerifier, Notifier, PaymentGateway, TranscodeService};
use streamhub_storage::ObjectStorage;

// ----- Sub-state types -----

/// Database pool and one repository per aggregate.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub verification_codes: VerificationCodeRepository,
    pub media: MediaRepository,
    pub variants: VariantRepository,
    pub library: LibraryRepository,
    pub artists: ArtistRepository,
    pub store: StoreRepository,
    pub addresses: AddressRepository,
    pub subscriptions: SubscriptionRepository,
    pub payments: PaymentRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            sessions: SessionRepository::new(pool.clone()),
            verification_codes: VerificationCodeRepository::new(pool.clone()),
            media: MediaRepository::new(pool.clone()),
            variants: VariantRepository::new(pool.clone()),
            library: LibraryRepository::new(pool.clone()),
            artists: ArtistRepository::new(pool.clone()),
            store: StoreRepository::new(pool.clone()),
            addresses: AddressRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Object storage and the transcoding backend.
#[derive(Clone)]
pub struct MediaState {
    pub storage: Arc<dyn ObjectStorage>,
    pub transcoder: Arc<dyn TranscodeService>,
    /// Public base URL of the bucket, without a trailing slash.
    pub bucket_url: String,
}

/// Payment gateway and webhook settings.
#[derive(Clone)]
pub struct CommerceState {
    pub gateway: Arc<dyn PaymentGateway>,
    pub webhook_secret: String,
    pub currency: String,
}

/// Token signing, outbound notifications and third-party sign-in.
#[derive(Clone)]
pub struct AuthServices {
    pub jwt_secret: String,
    pub jwt_expiry_days: i64,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Arc<dyn IdentityVerifier>,
}

// ----- AppState -----

/// Main application state: aggregates sub-states for dependency injection.
#[derive(Clone)]
pub struct AppState {
    pub db: DbState,
    pub media: MediaState,
    pub commerce: CommerceState,
    pub auth: AuthServices,
    pub config: Config,
    pub is_production: bool,
}

// ----- FromRef for sub-state extraction -----

impl axum::extract::FromRef<Arc<AppState>> for DbState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.db.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for MediaState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.media.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for CommerceState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.commerce.clone()
    }
}

impl axum::extract::FromRef<Arc<AppState>> for AuthServices {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.auth.clone()
    }
}
