use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::collector::{Collector, GroupCollector, PidLister};
use super::group::MonitoringGroup;
use super::support::ResctrlSupport;
use super::{Error, Result};

/// Hands out per-container collectors and owns the registry of their monitoring groups.
///
/// A manager is either active or a no-op stand-in used when the host cannot monitor. Both
/// variants offer the same operations, so callers never branch on availability.
#[derive(Debug, Clone, Default)]
pub enum Manager {
    Active(Arc<ActiveManager>),
    #[default]
    Noop,
}

/// State of a manager backed by a working resctrl filesystem.
#[derive(Debug)]
pub struct ActiveManager {
    interval: Duration,
    support: ResctrlSupport,
    /// Registration of every container with a live collector.
    groups: DashMap<String, Registration>,
    next_registration: AtomicU64,
}

/// Registry entry of one container. `group` is `None` while the group is being set up.
#[derive(Debug)]
struct Registration {
    id: u64,
    group: Option<MonitoringGroup>,
}

impl Manager {
    /// Runs `setup` and returns an active manager if the probed filesystem can monitor.
    ///
    /// `interval` bounds how often collectors re-read the process list of their container.
    ///
    /// # Errors
    ///
    /// Returns the error of `setup`, [`Error::NotInitialized`] or
    /// [`Error::NoMonitoringFeatures`]. Callers continue with [`Manager::noop`].
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use std::time::Duration;
    /// use creo_hostinfo::error::ResultOkLogExt;
    /// use creo_hostinfo::resctrl::{self, Manager};
    ///
    /// let manager = Manager::new(Duration::from_secs(10), || {
    ///     resctrl::detect_support("/proc/self/mountinfo", Path::new("/"))
    /// })
    /// .ok_log("resctrl monitoring disabled")
    /// .unwrap_or_default();
    /// ```
    pub fn new(
        interval: Duration,
        setup: impl FnOnce() -> Result<ResctrlSupport>,
    ) -> Result<Self> {
        let support = setup()?;
        if !support.is_initialized() {
            return Err(Error::NotInitialized {
                root: support.root().to_path_buf(),
            });
        }
        if !support.has_monitoring() {
            return Err(Error::NoMonitoringFeatures {
                root: support.root().to_path_buf(),
            });
        }

        log::info!(
            "Monitoring resctrl groups at `{}`",
            support.root().display()
        );
        Ok(Manager::Active(Arc::new(ActiveManager {
            interval,
            support,
            groups: DashMap::new(),
            next_registration: AtomicU64::new(0),
        })))
    }

    pub fn noop() -> Self {
        Manager::Noop
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Manager::Active(_))
    }

    /// Creates the monitoring group of `container`, moves the processes returned by `pids`
    /// into it, and returns the collector sampling it.
    ///
    /// `pids` is called again at most once per interval while collecting. A no-op manager
    /// returns [`Collector::Noop`].
    ///
    /// # Errors
    ///
    /// Fails if `container` already has a collector or one is being set up, if the group cannot
    /// be set up, or if [`Manager::destroy`] ran during setup. Callers continue with
    /// [`Collector::noop`] for that container.
    ///
    /// `pids` runs without any registry lock held, so it may call back into the manager.
    pub fn get_collector<F>(&self, container: &str, pids: F) -> Result<Collector>
    where
        F: Fn() -> std::io::Result<Vec<u32>> + Send + Sync + 'static,
    {
        match self {
            Manager::Noop => Ok(Collector::Noop),
            Manager::Active(manager) => manager.collector(container, Box::new(pids)),
        }
    }

    /// Removes the monitoring group of every container. Their collectors turn into no-ops.
    pub fn destroy(&self) {
        if let Manager::Active(manager) = self {
            manager.destroy();
        }
    }
}

impl ActiveManager {
    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn support(&self) -> &ResctrlSupport {
        &self.support
    }

    fn collector(self: &Arc<Self>, container: &str, pids: PidLister) -> Result<Collector> {
        let id = self.next_registration.fetch_add(1, Ordering::Relaxed);
        match self.groups.entry(container.to_owned()) {
            Entry::Occupied(_) => {
                return Err(Error::GroupExists {
                    container: container.to_owned(),
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(Registration { id, group: None });
            }
        }

        // The reservation keeps other callers off this container while the setup runs unlocked.
        let group = match self.create_group(container, &pids) {
            Ok(group) => group,
            Err(err) => {
                self.groups.remove_if(container, |_, registration| registration.id == id);
                return Err(err);
            }
        };

        let published = self
            .groups
            .get_mut(container)
            .is_some_and(|mut registration| {
                if registration.id != id {
                    return false;
                }
                registration.group = Some(group.clone());
                true
            });
        if !published {
            self.discard(container, &group);
            return Err(Error::SetupCancelled {
                container: container.to_owned(),
            });
        }

        Ok(Collector::Group(GroupCollector::new(
            container.to_owned(),
            id,
            group,
            pids,
            Arc::clone(self),
        )))
    }

    fn create_group(&self, container: &str, pids: &PidLister) -> Result<MonitoringGroup> {
        let initial = pids().map_err(|source| Error::ListPids {
            container: container.to_owned(),
            source,
        })?;
        MonitoringGroup::create(&self.support, container, &initial)
    }

    /// Removes a group whose reservation was dropped by [`ActiveManager::destroy`] during setup.
    fn discard(&self, container: &str, group: &MonitoringGroup) {
        // A newer registration of the same container shares the group directory.
        if let Entry::Vacant(_vacant) = self.groups.entry(container.to_owned()) {
            if let Err(err) = group.remove() {
                log::warn!("Failed to remove monitoring group of `{container}`: {err}");
            }
        }
    }

    /// Whether registration `id` still holds the group of `container`.
    pub(super) fn is_registered(&self, container: &str, id: u64) -> bool {
        self.groups
            .get(container)
            .is_some_and(|registration| registration.id == id)
    }

    /// Unregisters `container` and removes its group, unless registration `id` was already
    /// released.
    pub(super) fn release(&self, container: &str, id: u64) {
        let released = self
            .groups
            .remove_if(container, |_, registration| registration.id == id);
        if let Some((_, registration)) = released {
            remove_group(container, registration);
        }
    }

    fn destroy(&self) {
        let containers: Vec<String> = self
            .groups
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for container in containers {
            if let Some((_, registration)) = self.groups.remove(&container) {
                remove_group(&container, registration);
            }
        }
    }
}

fn remove_group(container: &str, registration: Registration) {
    let Some(group) = registration.group else {
        return;
    };
    if let Err(err) = group.remove() {
        log::warn!("Failed to release monitoring group of `{container}`: {err}");
    }
}
