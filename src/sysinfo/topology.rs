//! Reconstructs the node → core → thread tree of the host.
//!
//! The kernel spreads the topology over many small files, any of which may be missing for a
//! given CPU. Discovery therefore handles every read on its own:
//!
//! | Read                         | Failure policy                                  |
//! |------------------------------|-------------------------------------------------|
//! | `cpu<N>/online`              | missing = online, `0` = CPU skipped              |
//! | `topology/core_id`           | CPU skipped (not counted)                        |
//! | `topology/physical_package_id` | NUMA: socket unknown, synthetic: CPU unplaced  |
//! | `cache/index<M>/*`           | cache ignored                                    |
//! | `hugepages/*`                | missing tree = empty, malformed = fatal          |
//! | `meminfo`                    | unreadable = 0 bytes, no `MemTotal` = fatal      |
//!
//! Two strategies partition CPUs into nodes: [`NumaNodes`] when `/sys/devices/system/node`
//! holds node directories, and [`PhysicalPackages`], which builds one synthetic node per
//! socket, otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::sysfs::{self, SysFs};

use super::Result;
use super::cache::cpu_caches;
use super::hugepages::huge_pages;
use super::memory::node_memory;
use super::model::{Core, Node, Topology};

/// Topology facts of one online logical CPU.
#[derive(Debug, Clone, Copy)]
struct CpuProbe {
    id: u32,
    core_id: u32,
    package_id: Option<u32>,
}

/// CPUs grouped into a node, before caches, memory and huge pages are resolved.
#[derive(Debug)]
struct NodeDraft {
    id: u32,
    /// Node directory; synthetic nodes have none.
    dir: Option<PathBuf>,
    cpus: Vec<CpuProbe>,
}

/// Set of CPUs that passed the online and core id checks.
///
/// Every admitted CPU counts towards [`Topology::num_cores`], whether or not it ends up in a
/// node. A CPU is admitted at most once.
#[derive(Debug, Default)]
struct CpuCensus {
    admitted: BTreeSet<u32>,
}

impl CpuCensus {
    fn admit(&mut self, cpu: &CpuProbe) -> bool {
        self.admitted.insert(cpu.id)
    }

    fn len(&self) -> usize {
        self.admitted.len()
    }
}

/// A way of partitioning the online CPUs of the host into nodes.
trait NodeStrategy {
    fn partition<F: SysFs + ?Sized>(&self, fs: &F, census: &mut CpuCensus) -> Vec<NodeDraft>;
}

/// Nodes are the NUMA node directories; a node's CPUs are the ones linked below it.
#[derive(Debug)]
struct NumaNodes {
    nodes: Vec<(u32, PathBuf)>,
}

impl NodeStrategy for NumaNodes {
    fn partition<F: SysFs + ?Sized>(&self, fs: &F, census: &mut CpuCensus) -> Vec<NodeDraft> {
        self.nodes
            .iter()
            .map(|(id, dir)| {
                let cpus = list_cpus(fs, dir)
                    .into_iter()
                    .filter_map(|(cpu_id, cpu_path)| probe_cpu(fs, cpu_id, &cpu_path))
                    .filter(|cpu| {
                        let fresh = census.admit(cpu);
                        if !fresh {
                            log::warn!("cpu{} is listed by more than one node", cpu.id);
                        }
                        fresh
                    })
                    .collect();
                NodeDraft {
                    id: *id,
                    dir: Some(dir.clone()),
                    cpus,
                }
            })
            .collect()
    }
}

/// One synthetic node per physical package, used when the kernel exposes no NUMA nodes.
#[derive(Debug)]
struct PhysicalPackages;

impl NodeStrategy for PhysicalPackages {
    fn partition<F: SysFs + ?Sized>(&self, fs: &F, census: &mut CpuCensus) -> Vec<NodeDraft> {
        let mut packages: BTreeMap<u32, Vec<CpuProbe>> = BTreeMap::new();
        for (cpu_id, cpu_path) in list_cpus(fs, Path::new(sysfs::CPU_DIR)) {
            let Some(cpu) = probe_cpu(fs, cpu_id, &cpu_path) else {
                continue;
            };
            if !census.admit(&cpu) {
                continue;
            }
            match cpu.package_id {
                Some(package_id) => packages.entry(package_id).or_default().push(cpu),
                None => log::debug!("cpu{} has no physical package and is not placed", cpu.id),
            }
        }

        packages
            .into_iter()
            .map(|(id, cpus)| NodeDraft {
                id,
                dir: None,
                cpus,
            })
            .collect()
    }
}

#[derive(Debug)]
enum Strategy {
    Numa(NumaNodes),
    Packages(PhysicalPackages),
}

impl Strategy {
    fn select(fs: &(impl SysFs + ?Sized)) -> Self {
        let nodes: Vec<_> = match fs.list_entries(Path::new(sysfs::NODE_DIR)) {
            Ok(entries) => entries
                .iter()
                .filter_map(|entry| {
                    let id = sysfs::parse_indexed_name(entry.name(), "node")?;
                    Some((id, entry.path().to_path_buf()))
                })
                .collect(),
            Err(err) => {
                log::debug!("No NUMA node information: {err}");
                Vec::new()
            }
        };

        if nodes.is_empty() {
            log::debug!("Falling back to one node per physical package");
            Strategy::Packages(PhysicalPackages)
        } else {
            Strategy::Numa(NumaNodes { nodes })
        }
    }

    fn partition<F: SysFs + ?Sized>(&self, fs: &F, census: &mut CpuCensus) -> Vec<NodeDraft> {
        match self {
            Strategy::Numa(strategy) => strategy.partition(fs, census),
            Strategy::Packages(strategy) => strategy.partition(fs, census),
        }
    }
}

/// Discovers the hardware topology of the host.
///
/// Returns the nodes sorted by id, each with its cores sorted by core id, together with the
/// number of online logical CPUs whose topology could be read.
///
/// # Errors
///
/// Fails only on malformed huge page or memory information of a node, see
/// [`super::Error`]. No partial result is returned in that case.
///
/// # Example
///
/// ```no_run
/// use creo_hostinfo::sysfs::HostSysFs;
/// use creo_hostinfo::sysinfo::discover_topology;
///
/// let topology = discover_topology(&HostSysFs::default()).unwrap();
/// println!("{} nodes, {} cpus", topology.nodes.len(), topology.num_cores);
/// ```
pub fn discover_topology(fs: &(impl SysFs + ?Sized)) -> Result<Topology> {
    let strategy = Strategy::select(fs);
    let mut census = CpuCensus::default();
    let drafts = strategy.partition(fs, &mut census);

    let mut nodes = drafts
        .into_iter()
        .map(|draft| build_node(fs, draft))
        .collect::<Result<Vec<_>>>()?;
    nodes.sort_by_key(|node| node.id);

    log::debug!(
        "Discovered {} nodes with {} cpus",
        nodes.len(),
        census.len()
    );

    Ok(Topology {
        nodes,
        num_cores: census.len(),
    })
}

/// Returns the socket of the core that runs logical CPU `cpu`, or `None` if no core has it.
pub fn locate_socket(nodes: &[Node], cpu: u32) -> Option<u32> {
    nodes
        .iter()
        .flat_map(|node| &node.cores)
        .find(|core| core.thread_ids.contains(&cpu))
        .map(|core| core.socket_id)
}

fn list_cpus(fs: &(impl SysFs + ?Sized), dir: &Path) -> Vec<(u32, PathBuf)> {
    match fs.list_entries(dir) {
        Ok(entries) => entries
            .iter()
            .filter_map(|entry| {
                let id = sysfs::parse_indexed_name(entry.name(), "cpu")?;
                Some((id, entry.path().to_path_buf()))
            })
            .collect(),
        Err(err) => {
            log::warn!("Failed to list cpus in `{}`: {err}", dir.display());
            Vec::new()
        }
    }
}

fn probe_cpu(fs: &(impl SysFs + ?Sized), id: u32, cpu_path: &Path) -> Option<CpuProbe> {
    if !fs.is_online(cpu_path) {
        log::debug!("Skipping offline cpu{id}");
        return None;
    }

    let core_id = match read_id(fs, &cpu_path.join("topology/core_id")) {
        Some(core_id) => core_id,
        None => {
            log::warn!("Skipping cpu{id}: core id unavailable");
            return None;
        }
    };
    let package_id = read_id(fs, &cpu_path.join("topology/physical_package_id"));

    Some(CpuProbe {
        id,
        core_id,
        package_id,
    })
}

fn read_id(fs: &(impl SysFs + ?Sized), path: &Path) -> Option<u32> {
    let content = fs.read_file(path).ok()?;
    let value = content.trim();
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

#[derive(Debug, Default)]
struct CoreDraft {
    threads: BTreeSet<u32>,
    socket_id: Option<u32>,
}

fn build_node(fs: &(impl SysFs + ?Sized), draft: NodeDraft) -> Result<Node> {
    let mut core_drafts: BTreeMap<u32, CoreDraft> = BTreeMap::new();
    for cpu in &draft.cpus {
        let core = core_drafts.entry(cpu.core_id).or_default();
        core.threads.insert(cpu.id);
        if core.socket_id.is_none() {
            core.socket_id = cpu.package_id;
        }
    }

    let cores = core_drafts
        .into_iter()
        .map(|(id, core)| {
            let caches = core
                .threads
                .first()
                .map(|&cpu| {
                    cpu_caches(fs, cpu)
                        .into_iter()
                        .filter(|cache| !cache.is_shared())
                        .collect()
                })
                .unwrap_or_default();
            Core {
                id,
                thread_ids: core.threads.into_iter().collect(),
                caches,
                socket_id: core.socket_id.unwrap_or_default(),
            }
        })
        .collect();

    let caches = draft
        .cpus
        .iter()
        .map(|cpu| cpu.id)
        .min()
        .map(|cpu| {
            cpu_caches(fs, cpu)
                .into_iter()
                .filter(|cache| cache.is_shared())
                .collect()
        })
        .unwrap_or_default();

    let (memory_bytes, huge_pages) = match &draft.dir {
        Some(dir) => (
            node_memory(fs, dir)?,
            huge_pages(fs, &dir.join("hugepages"))?,
        ),
        None => (0, Vec::new()),
    };

    Ok(Node {
        id: draft.id,
        memory_bytes,
        huge_pages,
        cores,
        caches,
    })
}
