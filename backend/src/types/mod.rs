mod environment;
mod error;

pub use environment::Environment;
pub use error::{pipeline_status, AppError};
