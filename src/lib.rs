//! Convenience client for Tencent Cloud Object Storage (COS)

pub mod config;
pub mod cos;
pub mod error;

pub use config::CosConfig;
pub use cos::*;
pub use error::{CosError, Result};
