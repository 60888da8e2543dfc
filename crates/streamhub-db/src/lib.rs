//! StreamHub Database Layer
//!
//! Postgres repositories, one per aggregate, plus the transaction helper used
//! by every multi-row write.

// Module declarations
pub mod db;

// Re-exports: account repositories
pub use db::account::{NewUser, SessionRepository, UserRepository, VerificationCodeRepository};

// Re-exports: catalog and library repositories
pub use db::media::{
    ArtistPatch, ArtistRepository, BookmarkList, LibraryRepository, MediaFilter, MediaPatch,
    MediaRepository, NewArtist, NewMedia, VariantRepository,
};

// Re-exports: commerce repositories
pub use db::commerce::{
    AddressRepository, NewPayment, NewProduct, PaymentRepository, ProductPatch, StoreRepository,
    SubscriptionRepository,
};

// Re-exports: Transaction utilities
pub use db::transaction::with_transaction;
