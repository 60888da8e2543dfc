pub mod address;
pub mod payment;
pub mod store;
pub mod subscription;

pub use address::AddressRepository;
pub use payment::{NewPayment, PaymentRepository};
pub use store::{NewProduct, ProductPatch, StoreRepository};
pub use subscription::SubscriptionRepository;
