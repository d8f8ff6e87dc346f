use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::Result;
use super::group::MonitoringGroup;
use super::manager::ActiveManager;
use super::stats::ContainerStats;

/// Lists the current processes of a container.
pub(crate) type PidLister = Box<dyn Fn() -> std::io::Result<Vec<u32>> + Send + Sync>;

/// Samples the monitoring group of one container.
///
/// Obtained from [`super::Manager::get_collector`]. The no-op variant adds nothing to the stats
/// record, which lets callers treat containers without monitoring like any other.
#[derive(Debug, Default)]
pub enum Collector {
    Group(GroupCollector),
    #[default]
    Noop,
}

impl Collector {
    pub fn noop() -> Self {
        Collector::Noop
    }

    /// Path of the sampled monitoring group, `None` for the no-op collector.
    pub fn group_path(&self) -> Option<&Path> {
        match self {
            Collector::Group(collector) => Some(collector.group.path()),
            Collector::Noop => None,
        }
    }

    /// Samples cache occupancy and memory bandwidth into `stats.resctrl`.
    ///
    /// Once the manager has removed the group, the collector turns into a no-op.
    ///
    /// # Errors
    ///
    /// Fails if the process list cannot be refreshed or a counter cannot be read. `stats` is left
    /// untouched in that case.
    pub fn collect(&mut self, stats: &mut ContainerStats) -> Result<()> {
        let Collector::Group(collector) = self else {
            return Ok(());
        };
        if collector
            .manager
            .is_registered(&collector.container, collector.registration)
        {
            return collector.collect(stats);
        }

        log::debug!(
            "Monitoring group of `{}` was removed, collector disabled",
            collector.container
        );
        *self = Collector::Noop;
        Ok(())
    }

    /// Removes the monitoring group. Calling it again, or on a no-op collector, does nothing.
    pub fn destroy(&mut self) {
        if let Collector::Group(collector) = self {
            collector
                .manager
                .release(&collector.container, collector.registration);
        }
        *self = Collector::Noop;
    }
}

pub struct GroupCollector {
    container: String,
    /// Identifies this collector's entry in the manager's registry.
    registration: u64,
    group: MonitoringGroup,
    pids: PidLister,
    last_sync: Instant,
    manager: Arc<ActiveManager>,
}

impl std::fmt::Debug for GroupCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupCollector")
            .field("container", &self.container)
            .field("registration", &self.registration)
            .field("group", &self.group)
            .field("last_sync", &self.last_sync)
            .finish_non_exhaustive()
    }
}

impl GroupCollector {
    pub(super) fn new(
        container: String,
        registration: u64,
        group: MonitoringGroup,
        pids: PidLister,
        manager: Arc<ActiveManager>,
    ) -> Self {
        Self {
            container,
            registration,
            group,
            pids,
            last_sync: Instant::now(),
            manager,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    fn collect(&mut self, stats: &mut ContainerStats) -> Result<()> {
        if self.last_sync.elapsed() >= self.manager.interval() {
            let pids = (self.pids)().map_err(|source| super::Error::ListPids {
                container: self.container.clone(),
                source,
            })?;
            self.group.add_pids(&pids)?;
            self.last_sync = Instant::now();
        }

        stats.resctrl = Some(self.group.read_stats(self.manager.support())?);
        Ok(())
    }
}
