//! Limits applied to every route by the router.

use std::time::Duration;

/// Default per-request timeout applied to all routes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest accepted request body. Record payloads are small JSON documents.
pub const MAX_BODY_BYTES: usize = 256 * 1024;
