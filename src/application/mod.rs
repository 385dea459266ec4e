// Application layer - use cases and orchestration over the domain and storage

pub mod error;
mod locks;
pub mod reporting;
mod service;

pub use error::*;
pub use locks::OfficeLocks;
pub use reporting::*;
pub use service::*;
