pub mod session;
pub mod user;
pub mod verification;

pub use session::SessionRepository;
pub use user::{NewUser, UserRepository};
pub use verification::VerificationCodeRepository;
