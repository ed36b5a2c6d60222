//! AT Protocol session management
//!
//! Owns the access/refresh token pair for one login identity. The flow:
//!
//! 1. `connect` — POST `createSession` with handle + password, decode the
//!    returned JWTs' `exp` claims.
//! 2. `check_refresh` — called before every authenticated write; refreshes
//!    when the access token is within its buffer of expiring.
//! 3. On a server-reported invalid refresh token, reconnect from the
//!    stored credentials rather than propagating the failure.
//! 4. `access_token` / `refresh_token` — accessors for the transport layer.

mod error;
mod jwt;
mod manager;

pub use error::{Error, Result};
pub use manager::{Credentials, SessionManager};
