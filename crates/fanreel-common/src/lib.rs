//! FanReel shared kernel
//!
//! Cross-cutting pieces used by every FanReel service crate: the
//! service-boundary error taxonomy, storage error classification,
//! input precondition helpers, and the bounded retry helper for
//! transient external-call failures.

#![warn(missing_docs)]

pub mod error;
pub mod validation;

pub use error::{MarketError, MarketResult, StoreError, StoreResult};
pub use validation::{
    require_email, require_non_empty, require_positive_amount, require_uuid, with_retry,
    RetryPolicy,
};
