pub mod engine;
pub mod error;

pub use engine::{Direction, TransferDescriptor, TransferEngine};
pub use error::TransferError;
