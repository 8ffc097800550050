//! Protection layer for national ID numbers and similar identifiers.
//!
//! - [`codec`]: seal a plaintext into `<fingerprint>:<payload>` and open it
//!   back with tamper and substitution detection.
//! - [`index`]: answer "is this identifier already registered?" from
//!   fingerprints alone, without decrypting stored rows.
//! - [`redact`]: open or seal every protected field of the record shapes the
//!   rest of the platform returns.
//! - [`server`]: the HTTP surface over all three.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod index;
pub mod redact;
pub mod server;
pub mod telemetry;

pub use codec::{IdentifierCodec, OpenError, Opened, ValueOrigin};
pub use index::{IdentifierStore, InMemoryIdentifierStore, Uniqueness, UniquenessIndex};
