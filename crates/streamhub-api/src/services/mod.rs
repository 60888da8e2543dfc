//! Orchestration that spans storage, the transcoder, the payment gateway and
//! the database. Handlers stay thin and call into these.

pub mod catalog;
pub mod payment;
pub mod upload;
