#![forbid(unsafe_code)]
//! stagebuf-core: interfaces and plain types shared by the stagebuf crates.
//!
//! Nothing here touches disk. The backing store and clock are traits so that
//! the staging buffer can be driven by a real anonymous file and wall clock in
//! production, and by in-memory fakes in tests. Concrete stores live in
//! `stagebuf-io`; the buffer itself lives in `stagebuf-staging`.

pub mod clock;
pub mod config;
pub mod error;
pub mod prelude;
pub mod stat;
pub mod store;

pub use clock::{Clock, SimulatedClock, SystemClock};
pub use config::StagingConfig;
pub use error::{Error, ErrorKind, Result};
pub use stat::StatResult;
pub use store::{BackingStore, StoreFactory};
