pub mod artist;
pub mod library;
#[allow(clippy::module_inception)]
pub mod media;
pub mod variant;

pub use artist::{ArtistPatch, ArtistRepository, NewArtist};
pub use library::{BookmarkList, LibraryRepository};
pub use media::{MediaFilter, MediaPatch, MediaRepository, NewMedia};
pub use variant::VariantRepository;
