pub mod address;
pub mod artist;
pub mod library;
pub mod media;
pub mod payment;
pub mod role;
pub mod store;
pub mod subscription;
pub mod user;

pub use address::*;
pub use artist::*;
pub use library::*;
pub use media::*;
pub use payment::*;
pub use role::*;
pub use store::*;
pub use subscription::*;
pub use user::*;
