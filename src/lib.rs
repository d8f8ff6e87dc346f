//! Creo Hostinfo: hardware topology, memory counters and resctrl monitoring for a host.
//!
//! The library reads the kernel pseudo-filesystems through [`sysfs::SysFs`], so the same code runs
//! against the live host or a fabricated tree. The `creo-hostinfo` binary wires it into an agent
//! that prints [`host::Snapshot`]s as JSON.

use std::pin::{Pin, pin};
use std::sync::Arc;

use error::ResultOkLogExt;
use tokio::time::Interval;

pub mod config;
pub mod error;
pub mod fsutil;
pub mod host;
pub mod mountinfo;
pub mod resctrl;
pub mod sysfs;
pub mod sysinfo;
pub mod vmstat;

/// Runs the Creo Hostinfo agent.
///
/// Prints one snapshot, or one per `COLLECT_INTERVAL_SECS` until Ctrl-C. Monitoring groups are
/// removed before returning.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid configuration (see [`config::Config::from_env`]).
/// - A failed single-shot collection.
/// - Failure to serialize a snapshot or to listen for Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(config::Config::from_env()?);
    let fs = Arc::new(sysfs::HostSysFs::new(config.rootfs.clone()));

    let manager = resctrl::Manager::new(config.resctrl_interval, || {
        resctrl::detect_support(config.mountinfo_path(), &config.rootfs)
    })
    .ok_log("resctrl monitoring disabled")
    .unwrap_or_default();
    let mut collector = manager
        .get_collector(resctrl::ROOT_CONTAINER, || Ok(Vec::new()))
        .ok_log("host is not monitored by resctrl")
        .unwrap_or_default();

    let collect_interval = config.collect_interval;
    let result = match collect_interval {
        None => match host::Snapshot::collect(fs.as_ref(), &config, &mut collector) {
            Ok(snapshot) => print_snapshot(snapshot),
            Err(err) => Err(err.into()),
        },
        Some(period) => poll(period, fs, config, &mut collector).await,
    };

    collector.destroy();
    manager.destroy();
    result
}

/// Collects and prints a snapshot every `period` until Ctrl-C.
async fn poll(
    period: std::time::Duration,
    fs: Arc<sysfs::HostSysFs>,
    config: Arc<config::Config>,
    collector: &mut resctrl::Collector,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut interval = tokio::time::interval(period);
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    loop {
        if !next_tick(&mut interval, ctrl_c.as_mut()).await? {
            log::info!("Received Ctrl-C, shutting down");
            return Ok(());
        }

        let fs = Arc::clone(&fs);
        let config = Arc::clone(&config);
        // The collector moves into the blocking task and comes back with the snapshot.
        let mut current = std::mem::take(collector);
        let (current, snapshot) = tokio::task::spawn_blocking(move || {
            let before = std::time::Instant::now();
            let snapshot = host::Snapshot::collect(fs.as_ref(), &config, &mut current);
            log::trace!(
                "Snapshot::collect() took {} nanoseconds",
                before.elapsed().as_nanos()
            );
            (current, snapshot)
        })
        .await?;
        *collector = current;

        match snapshot {
            Ok(snapshot) => print_snapshot(snapshot)?,
            Err(err) => log::error!("failed to collect host snapshot: {err}"),
        }
    }
}

/// Waits for the next tick of `interval`. Returns `false` once `shutdown` has completed.
///
/// `shutdown` must outlive the loop, so a signal delivered while a cycle runs is seen on the
/// next call.
async fn next_tick<S>(interval: &mut Interval, shutdown: Pin<&mut S>) -> std::io::Result<bool>
where
    S: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        biased;
        signal = shutdown => {
            signal?;
            Ok(false)
        }
        _ = interval.tick() => Ok(true),
    }
}

fn print_snapshot(snapshot: host::Snapshot) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(&snapshot)?);
    Ok(())
}
