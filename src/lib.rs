pub mod app;
pub mod error;
pub mod pipeline;
pub mod worker;

pub use error::{DetectorError, Result};
