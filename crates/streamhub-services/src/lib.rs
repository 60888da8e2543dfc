//! StreamHub Services Layer
//!
//! Clients for the external systems the backend delegates to: managed
//! transcoding, the payment gateway, email/SMS delivery and third-party
//! identity providers. Each sits behind a trait so the API crate holds them
//! as `Arc<dyn Trait>` and tests can inject fakes.

pub mod identity;
pub mod notify;
pub mod payment;
pub mod transcode;

// Re-export commonly used types
#[cfg(feature = "oauth")]
pub use identity::jwks::JwksIdentityVerifier;
pub use identity::{IdentityError, IdentityProvider, IdentityVerifier, VerifiedIdentity};
pub use notify::{templates, NotificationService, Notifier, NotifyError, NotifyResult};
#[cfg(feature = "stripe")]
pub use payment::stripe::StripeGateway;
#[cfg(feature = "stripe")]
pub use payment::webhook::{verify_signature, WebhookEvent};
pub use payment::{
    GatewayError, GatewayResult, GatewaySubscription, PaymentGateway, PaymentIntent,
    PaymentIntentRequest, Refund,
};
#[cfg(feature = "mediaconvert")]
pub use transcode::mediaconvert::MediaConvertTranscoder;
pub use transcode::{JobStatus, TranscodeError, TranscodeRequest, TranscodeResult, TranscodeService};
