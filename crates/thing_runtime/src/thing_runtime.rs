//! Thing Runtime
//!
//! Services operating on the thing data model:
//!
//! - `store` - time-series store abstraction with in-memory and redb backends
//! - `things` - thing/property lifecycle and validated value appends
//! - `liveness` - online/offline classification from the status property
//! - `menu` - ordered navigation list over things and their properties
//! - `single_flight` - at-most-one execution per key for expensive jobs
//! - `takeout` - full-account data export, guarded by `single_flight`

mod error;
pub mod liveness;
pub mod menu;
pub mod relative_time;
pub mod single_flight;
pub mod store;
pub mod takeout;
pub mod things;

pub use error::{ThingError, ThingResult};
pub use liveness::{LivenessEngine, LivenessState, LivenessStatus};
pub use menu::{EntryKind, MenuEntry, build_menu, update_entry};
pub use single_flight::{JobError, JobInfo, SingleFlight};
pub use store::{InMemoryTimeSeriesStore, RedbTimeSeriesStore, StoreError, TimeSeriesStore};
pub use takeout::{SessionKey, Takeout, TakeoutService};
pub use things::ThingService;
