pub mod dimension;
pub mod sample;

use std::fmt;

use serde::{Serialize, Serializer};

pub use dimension::{CpuMode, Direction, IoDirection, IpFamily, LoadSpan, MemoryClass};
pub use sample::{Sample, SampleValue};

/// How raw samples falling in one bucket collapse into a single point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    /// Arithmetic mean, component-wise for vectors.
    Mean,
    /// Maximum observed, component-wise for vectors.
    Max,
    /// Every sample is kept as its own point.
    Passthrough,
}

/// Family of metrics that share an accounting activity and a graph panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricGroup {
    Load,
    Cpu,
    Memory,
    Swap,
    Network,
    Disk,
    Sockets,
    Tcp,
    Filesystem,
    Reboot,
}

impl MetricGroup {
    /// Returns the canonical name used in config and on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Cpu => "cpu",
            Self::Memory => "mem",
            Self::Swap => "swap",
            Self::Network => "net",
            Self::Disk => "disk",
            Self::Sockets => "sock",
            Self::Tcp => "tcp",
            Self::Filesystem => "fs",
            Self::Reboot => "reboot",
        }
    }

    /// Convert from a canonical name. `io` is accepted for disk activity.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "load" => Some(Self::Load),
            "cpu" => Some(Self::Cpu),
            "mem" => Some(Self::Memory),
            "swap" => Some(Self::Swap),
            "net" => Some(Self::Network),
            "disk" | "io" => Some(Self::Disk),
            "sock" => Some(Self::Sockets),
            "tcp" => Some(Self::Tcp),
            "fs" => Some(Self::Filesystem),
            "reboot" => Some(Self::Reboot),
            _ => None,
        }
    }

    /// Return all groups in panel order.
    pub fn all() -> &'static [Self] {
        &[
            Self::Load,
            Self::Cpu,
            Self::Memory,
            Self::Swap,
            Self::Network,
            Self::Disk,
            Self::Sockets,
            Self::Tcp,
            Self::Filesystem,
            Self::Reboot,
        ]
    }

    /// Activity selection passed to `sadf` after `--`.
    ///
    /// Reboot records are present in every activity dump, so the reboot group
    /// borrows the cheapest one.
    pub const fn sadf_args(self) -> &'static [&'static str] {
        match self {
            Self::Load | Self::Reboot => &["-q"],
            Self::Cpu => &["-u"],
            Self::Memory => &["-r"],
            Self::Swap => &["-S"],
            Self::Network => &["-n", "DEV"],
            Self::Disk => &["-d", "-p"],
            Self::Sockets => &["-n", "SOCK,SOCK6"],
            Self::Tcp => &["-n", "TCP"],
            Self::Filesystem => &["-F", "MOUNT"],
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Load => "Load",
            Self::Cpu => "CPU",
            Self::Memory => "Memory",
            Self::Swap => "Swap",
            Self::Network => "Network",
            Self::Disk => "IO",
            Self::Sockets => "Sockets",
            Self::Tcp => "TCP",
            Self::Filesystem => "Filesystems",
            Self::Reboot => "Reboots",
        }
    }

    pub const fn y_label(self) -> &'static str {
        match self {
            Self::Load => "Load average",
            Self::Cpu => "CPU usage (%)",
            Self::Memory => "Memory used (MiB)",
            Self::Swap => "Swap used (MiB)",
            Self::Network => "Bandwidth (Mb/s)",
            Self::Disk => "Activity (MB/s)",
            Self::Sockets => "Sockets in use",
            Self::Tcp => "Connections opened (/s)",
            Self::Filesystem => "Space used (%)",
            Self::Reboot => "",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Cpu | Self::Filesystem => "%",
            Self::Memory | Self::Swap => "MiB",
            Self::Network => "Mb/s",
            Self::Disk => "MB/s",
            Self::Sockets => "sockets",
            Self::Tcp => "conn/s",
            Self::Reboot => "",
        }
    }
}

impl fmt::Display for MetricGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MetricGroup {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Closed set of metric kinds the pipeline knows how to reduce, scale and label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricKind {
    LoadAverage(LoadSpan),
    CpuUsage(CpuMode),
    MemoryUsed(MemoryClass),
    SwapUsed,
    NetworkIo {
        interface: String,
        direction: Direction,
    },
    DiskIo {
        device: String,
        direction: IoDirection,
    },
    /// Vector: `[tcp, udp, raw]`.
    SocketCount(IpFamily),
    /// Vector: `[active opens/s, passive opens/s]`.
    TcpStateTransition,
    FilesystemUsage {
        mount: String,
    },
    RebootEvent,
}

const SOCKET_COMPONENTS: &[&str] = &["tcp", "udp", "raw"];
const TCP_COMPONENTS: &[&str] = &["active", "passive"];

impl MetricKind {
    pub fn group(&self) -> MetricGroup {
        match self {
            Self::LoadAverage(_) => MetricGroup::Load,
            Self::CpuUsage(_) => MetricGroup::Cpu,
            Self::MemoryUsed(_) => MetricGroup::Memory,
            Self::SwapUsed => MetricGroup::Swap,
            Self::NetworkIo { .. } => MetricGroup::Network,
            Self::DiskIo { .. } => MetricGroup::Disk,
            Self::SocketCount(_) => MetricGroup::Sockets,
            Self::TcpStateTransition => MetricGroup::Tcp,
            Self::FilesystemUsage { .. } => MetricGroup::Filesystem,
            Self::RebootEvent => MetricGroup::Reboot,
        }
    }

    /// Reduction applied when several samples share a bucket.
    ///
    /// Capacity kinds use the mean to show sustained pressure. Counter-like
    /// kinds keep the peak, which a mean would hide.
    pub fn reduction(&self) -> Reduction {
        match self {
            Self::LoadAverage(_)
            | Self::CpuUsage(_)
            | Self::NetworkIo { .. }
            | Self::DiskIo { .. } => Reduction::Mean,
            Self::MemoryUsed(_) | Self::SwapUsed | Self::FilesystemUsage { .. } => {
                Reduction::Mean
            }
            Self::SocketCount(_) | Self::TcpStateTransition => Reduction::Max,
            Self::RebootEvent => Reduction::Passthrough,
        }
    }

    pub fn unit(&self) -> &'static str {
        self.group().unit()
    }

    /// Whether the smoothing engine may average this kind over neighbouring buckets.
    pub fn is_smoothable(&self) -> bool {
        self.reduction() == Reduction::Mean
    }

    /// Labels of the vector components, empty for scalar kinds.
    pub fn components(&self) -> &'static [&'static str] {
        match self {
            Self::SocketCount(_) => SOCKET_COMPONENTS,
            Self::TcpStateTransition => TCP_COMPONENTS,
            _ => &[],
        }
    }

    /// Stable identifier, unique per kind.
    pub fn key(&self) -> String {
        match self {
            Self::LoadAverage(span) => format!("load/{}", span.as_str()),
            Self::CpuUsage(mode) => format!("cpu/{}", mode.as_str()),
            Self::MemoryUsed(class) => format!("mem/{}", class.as_str()),
            Self::SwapUsed => "swap/used".to_string(),
            Self::NetworkIo {
                interface,
                direction,
            } => format!("net/{interface}/{}", direction.as_str()),
            Self::DiskIo { device, direction } => {
                format!("disk/{device}/{}", direction.as_str())
            }
            Self::SocketCount(family) => format!("sock/{}", family.as_str()),
            Self::TcpStateTransition => "tcp/opens".to_string(),
            Self::FilesystemUsage { mount } => format!("fs/{mount}"),
            Self::RebootEvent => "reboot".to_string(),
        }
    }

    /// Human-readable legend label.
    pub fn label(&self) -> String {
        match self {
            Self::LoadAverage(span) => span.as_str().to_string(),
            Self::CpuUsage(mode) => mode.as_str().to_string(),
            Self::MemoryUsed(class) => class.as_str().to_string(),
            Self::SwapUsed => "swpused".to_string(),
            Self::NetworkIo {
                interface,
                direction,
            } => format!("{interface}_{}", direction.as_str()),
            Self::DiskIo { device, direction } => format!("{device}_{}", direction.as_str()),
            Self::SocketCount(family) => family.as_str().to_string(),
            Self::TcpStateTransition => "opens".to_string(),
            Self::FilesystemUsage { mount } => mount.clone(),
            Self::RebootEvent => "reboot".to_string(),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Serialize for MetricKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}
