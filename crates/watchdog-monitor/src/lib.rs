//! watchdog-monitor — the check cycle.
//!
//! # Architecture
//!
//! ```text
//! CheckScheduler::run()
//!   ├── run_cycle()        HTTP probes spawned with stagger,
//!   │                      other categories sequential, joined in order
//!   ├── difference()       previous vs. current snapshot by message
//!   ├── notify::plan()     → Dispatcher (detached, fire-and-forget)
//!   └── StatusBoard        publish-by-replacement; StatusReader for the
//!                          status page
//! ```
//!
//! Cycles never overlap: the interval timer starts after a cycle has
//! completed. A cycle interrupted by cancellation is discarded.

pub mod diff;
pub mod error;
pub mod scheduler;
pub mod state;

pub use diff::{Difference, difference};
pub use error::{MonitorError, MonitorResult};
pub use scheduler::{CheckScheduler, CycleState};
pub use state::{StatusBoard, StatusReader, StatusReport};
