//! API Controller modules
//!
//! Route handlers mounted under `/api`.

pub mod chain_stats;
pub mod explorer;
pub mod misc;
