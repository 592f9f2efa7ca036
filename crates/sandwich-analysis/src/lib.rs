//! sandwich-analysis crate
//!
//! Sandwich (frontrun/backrun) detection over the ordered transactions of a
//! single block: eligibility classification, greedy pair matching with gain
//! computation, victim inference and report aggregation. Synchronous and
//! free of I/O.

pub mod classify;
pub mod error;
pub mod gain;
pub mod matcher;
pub mod report;
pub mod victim;

pub use error::DetectError;
pub use matcher::{BlockDetection, DetectorConfig, FrontrunPair, SandwichDetector};
