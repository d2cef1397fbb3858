//! # Resilience Module
//!
//! Bounded waiting on external state that converges on its own schedule
//! (device scan tables, child workflow records).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tag_provisioning::resilience::RetryConverger;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), String> {
//! let converger = RetryConverger::default();
//!
//! let finished = converger
//!     .retry(|| async { Ok::<_, String>(true) }, Duration::from_secs(300))
//!     .await?;
//! assert!(finished);
//! # Ok(())
//! # }
//! ```

pub mod retry;

pub use retry::{Convergence, ProbeOutcome, RetryConverger};
