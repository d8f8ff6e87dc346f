//! Per-container cache occupancy and memory bandwidth monitoring through the kernel resctrl
//! filesystem.
//!
//! A [`Manager`] is created once from a [`ResctrlSupport`] probe. It hands out one [`Collector`]
//! per container, each owning a monitoring group below `mon_groups/`. Hosts without resctrl get a
//! no-op manager whose collectors record nothing:
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//! use creo_hostinfo::error::ResultOkLogExt;
//! use creo_hostinfo::resctrl::{self, Collector, ContainerStats, Manager};
//!
//! let manager = Manager::new(Duration::from_secs(10), || {
//!     resctrl::detect_support("/proc/self/mountinfo", Path::new("/"))
//! })
//! .ok_log("resctrl monitoring disabled")
//! .unwrap_or_default();
//!
//! let mut collector = manager
//!     .get_collector("/docker/0123abcd", || Ok(vec![4242]))
//!     .ok_log("container is not monitored")
//!     .unwrap_or_default();
//!
//! let mut stats = ContainerStats::default();
//! collector.collect(&mut stats).unwrap();
//! collector.destroy();
//! ```

mod collector;
mod error;
mod group;
mod manager;
mod stats;
mod support;

pub use collector::{Collector, GroupCollector};
pub use error::{Error, Result};
pub use group::{ROOT_CONTAINER, group_name};
pub use manager::{ActiveManager, Manager};
pub use stats::{CacheStats, ContainerStats, MemoryBandwidthStats, ResctrlStats};
pub use support::{ResctrlSupport, detect_support};
