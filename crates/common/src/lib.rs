//! Common types, protocol definitions, and errors shared across `idseal` crates.

pub mod error;
pub mod protocol;

pub use error::ServiceError;
