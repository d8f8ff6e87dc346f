/// Entry point for the Creo Hostinfo agent.
///
/// Prints the hardware topology, memory counters, devices and resctrl samples of the host as
/// JSON. Configuration comes from environment variables, see `creo_hostinfo::config`.
///
/// # Examples
///
/// ```bash
/// ROOTFS_MOUNT_PATH=/rootfs COLLECT_INTERVAL_SECS=5 RUST_LOG=debug cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    creo_hostinfo::run().await
}
