//! # Interview Core
//!
//! The conversation state and the per-turn pipeline for a single AI-led interview.
//!
//! ## Key Components:
//! - **Session**: persona turn plus alternating candidate/interviewer turns
//! - **Turn Processor**: transcript → generated reply → synthesized audio on disk
//! - **Naming**: timestamp-keyed file names that tie one exchange's artifacts together
//!
//! ## One Interview At A Time:
//! There is exactly one session in the running service and it is not isolated
//! per user. Two interviews at once would interleave their turns into the same
//! transcript. The HTTP layer serializes turns; the core does not try to.

pub mod naming;
pub mod processor;
pub mod session;

pub use processor::{TurnError, TurnProcessor};
pub use session::Session;
