//! Convenient re-exports for downstream crates.

pub use crate::clock::{Clock, SimulatedClock, SystemClock};
pub use crate::config::StagingConfig;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::stat::StatResult;
pub use crate::store::{BackingStore, StoreFactory};
