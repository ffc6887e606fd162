pub mod client;
pub mod error;
pub mod types;

pub use client::{JobClient, TlsOptions};
pub use error::ClientError;
pub use types::{ErrorResponse, StartRequest, StopResponse};
