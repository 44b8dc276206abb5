//! claimscreen - peer-grouped IQR outlier screening for healthcare claims
//!
//! Streams claim rows sorted by `(HCPCS code, claim month)`, segments them
//! into peer groups, and flags billing providers whose total paid, paid per
//! beneficiary, paid per claim, or unique beneficiary count sits strictly
//! above the group's `Q3 + k * IQR` fence.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod emitter;
pub mod error;
pub mod flag;
pub mod metrics;
pub mod pipeline;
pub mod quantile;
pub mod record;
pub mod segmenter;
pub mod source;
pub mod summary;
