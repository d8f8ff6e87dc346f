use std::path::{Path, PathBuf};

use crate::sysfs::{self, SysFs};

use super::model::{CacheInfo, CacheType};

fn cache_dir(cpu_id: u32) -> PathBuf {
    Path::new(sysfs::CPU_DIR).join(format!("cpu{cpu_id}/cache"))
}

/// Reads every cache level visible to a logical CPU from `cpu<N>/cache/index<M>`.
///
/// Hosts without cache information yield an empty list. An index whose attributes cannot be
/// read or parsed is skipped.
pub fn cpu_caches(fs: &(impl SysFs + ?Sized), cpu_id: u32) -> Vec<CacheInfo> {
    let dir = cache_dir(cpu_id);
    let entries = match fs.list_entries(&dir) {
        Ok(entries) => entries,
        Err(err) => {
            log::debug!("No cache information for cpu{cpu_id}: {err}");
            return Vec::new();
        }
    };

    entries
        .iter()
        .filter(|entry| entry.name().starts_with("index"))
        .filter_map(|entry| match read_cache_index(fs, entry.path()) {
            Some(cache) => Some(cache),
            None => {
                log::warn!(
                    "Ignoring unreadable cache description `{}`",
                    entry.path().display()
                );
                None
            }
        })
        .collect()
}

fn read_cache_index(fs: &(impl SysFs + ?Sized), index_dir: &Path) -> Option<CacheInfo> {
    let size = fs.read_file(&index_dir.join("size")).ok()?;
    let level = fs.read_file(&index_dir.join("level")).ok()?;
    let cache_type = fs.read_file(&index_dir.join("type")).ok()?;

    Some(CacheInfo {
        size_bytes: parse_cache_size(&size)?,
        cache_type: CacheType::from_sysfs(&cache_type)?,
        level: level.trim().parse().ok()?,
    })
}

/// Parses a sysfs cache size such as `32K`, `1M` or `512` into bytes.
fn parse_cache_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.as_bytes().last()? {
        b'K' => (&value[..value.len() - 1], 1 << 10),
        b'M' => (&value[..value.len() - 1], 1 << 20),
        b'G' => (&value[..value.len() - 1], 1 << 30),
        _ => (value, 1),
    };
    digits.parse::<u64>().ok()?.checked_mul(multiplier)
}
