//! Rotating pool of DENUE API access tokens
//!
//! Workers borrow a token for each request and hand it back with the outcome
//! of that request. Tokens rotate first-in first-out. Authorization failures
//! (401/403) count against the token; once a token reaches the retirement
//! threshold it leaves circulation for good.
//!
//! Token lifecycle:
//! 1. Caller supplies tokens at startup → all idle, zero failures
//! 2. `borrow()` waits for an idle token and hands out a `Lease`
//! 3. `Lease::release(Outcome::Success | Outcome::Transient)` → back to idle unchanged
//! 4. `Lease::release(Outcome::Unauthorized)` → failure count + 1, back to idle
//! 5. Failure count reaches threshold → retired, never handed out again
//! 6. A lease dropped without release (cancelled task) → back to idle unchanged

pub mod error;
pub mod outcome;
pub mod pool;

pub use error::{Error, Result};
pub use outcome::Outcome;
pub use pool::{CredentialPool, DEFAULT_RETIREMENT_THRESHOLD, Lease, PoolStatus};
