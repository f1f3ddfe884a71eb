pub mod builder;
pub mod extract;
pub mod session;

pub use builder::{BuildOutcome, FetchPolicy, SnapshotBuilder};
