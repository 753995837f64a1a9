//! Host facts used to pin axis bounds.

use std::fs;
use std::path::{Path, PathBuf};

/// Installed-capacity facts about the reporting host.
pub trait SystemFacts: Send + Sync {
    fn total_memory_bytes(&self) -> Option<u64>;
    fn total_swap_bytes(&self) -> Option<u64>;
    fn cpu_count(&self) -> Option<u16>;
    /// Fastest non-loopback link speed in Mb/s.
    fn max_link_speed_mbps(&self) -> Option<u64>;
}

/// Reads facts from procfs and sysfs.
#[derive(Debug, Clone)]
pub struct ProcSystemFacts {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for ProcSystemFacts {
    fn default() -> Self {
        Self::with_roots("/proc", "/sys")
    }
}

impl ProcSystemFacts {
    /// Facts read below alternate roots (containers, tests).
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    fn meminfo(&self) -> Option<String> {
        read_text_file(&self.proc_root.join("meminfo"))
    }
}

impl SystemFacts for ProcSystemFacts {
    fn total_memory_bytes(&self) -> Option<u64> {
        parse_meminfo_bytes(&self.meminfo()?, "MemTotal:")
    }

    fn total_swap_bytes(&self) -> Option<u64> {
        parse_meminfo_bytes(&self.meminfo()?, "SwapTotal:")
    }

    fn cpu_count(&self) -> Option<u16> {
        let text = read_text_file(&self.sys_root.join("devices/system/cpu/online"))?;
        let online = parse_cpu_online_text(&text)?;
        Some(online.min(u32::from(u16::MAX)) as u16)
    }

    fn max_link_speed_mbps(&self) -> Option<u64> {
        let entries = fs::read_dir(self.sys_root.join("class/net")).ok()?;
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_str() != Some("lo"))
            .filter_map(|entry| read_text_file(&entry.path().join("speed")))
            // Virtual and down links report -1.
            .filter_map(|text| text.parse::<i64>().ok())
            .filter_map(|speed| u64::try_from(speed).ok())
            .filter(|speed| *speed > 0)
            .max()
    }
}

/// Fixed facts, for tests and hosts where probing is not wanted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticFacts {
    pub total_memory_bytes: Option<u64>,
    pub total_swap_bytes: Option<u64>,
    pub cpu_count: Option<u16>,
    pub max_link_speed_mbps: Option<u64>,
}

impl SystemFacts for StaticFacts {
    fn total_memory_bytes(&self) -> Option<u64> {
        self.total_memory_bytes
    }

    fn total_swap_bytes(&self) -> Option<u64> {
        self.total_swap_bytes
    }

    fn cpu_count(&self) -> Option<u16> {
        self.cpu_count
    }

    fn max_link_speed_mbps(&self) -> Option<u64> {
        self.max_link_speed_mbps
    }
}

fn read_text_file(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    Some(text.trim().to_string())
}

fn parse_meminfo_bytes(meminfo: &str, key: &str) -> Option<u64> {
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix(key) {
            let kb = rest.split_whitespace().next()?.parse::<u64>().ok()?;
            return Some(kb.saturating_mul(1024));
        }
    }
    None
}

fn parse_cpu_online_text(text: &str) -> Option<u32> {
    if text.is_empty() {
        return None;
    }

    let mut total = 0u32;
    for part in text.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start = start.trim().parse::<u32>().ok()?;
            let end = end.trim().parse::<u32>().ok()?;
            if end < start {
                return None;
            }
            total = total.saturating_add(end - start + 1);
        } else {
            part.parse::<u32>().ok()?;
            total = total.saturating_add(1);
        }
    }

    (total > 0).then_some(total)
}
