//! Dimension enums that qualify a [`super::MetricKind`].

/// Load average averaging span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadSpan {
    One,
    Five,
    Fifteen,
}

impl LoadSpan {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::One => "ldavg-1",
            Self::Five => "ldavg-5",
            Self::Fifteen => "ldavg-15",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::One, Self::Five, Self::Fifteen]
    }
}

/// CPU accounting mode, as reported by `sar -u`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CpuMode {
    User,
    Nice,
    System,
    Iowait,
    Steal,
    Idle,
}

impl CpuMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Nice => "nice",
            Self::System => "system",
            Self::Iowait => "iowait",
            Self::Steal => "steal",
            Self::Idle => "idle",
        }
    }

    /// Column holding this mode in `sadf -d` output.
    pub const fn column(self) -> &'static str {
        match self {
            Self::User => "%user",
            Self::Nice => "%nice",
            Self::System => "%system",
            Self::Iowait => "%iowait",
            Self::Steal => "%steal",
            Self::Idle => "%idle",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::User,
            Self::Nice,
            Self::System,
            Self::Iowait,
            Self::Steal,
            Self::Idle,
        ]
    }
}

/// Memory accounting class, as reported by `sar -r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemoryClass {
    Used,
    Buffers,
    Cached,
    Commit,
    Active,
    Dirty,
}

impl MemoryClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Used => "used",
            Self::Buffers => "buffers",
            Self::Cached => "cached",
            Self::Commit => "commit",
            Self::Active => "active",
            Self::Dirty => "dirty",
        }
    }

    /// Column holding this class (in kB) in `sadf -d` output.
    pub const fn column(self) -> &'static str {
        match self {
            Self::Used => "kbmemused",
            Self::Buffers => "kbbuffers",
            Self::Cached => "kbcached",
            Self::Commit => "kbcommit",
            Self::Active => "kbactive",
            Self::Dirty => "kbdirty",
        }
    }

    pub fn all() -> &'static [Self] {
        &[
            Self::Used,
            Self::Buffers,
            Self::Cached,
            Self::Commit,
            Self::Active,
            Self::Dirty,
        ]
    }
}

/// Network traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    Rx,
    Tx,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rx => "rx",
            Self::Tx => "tx",
        }
    }
}

/// Block device transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IoDirection {
    Read,
    Write,
}

impl IoDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// IP family for socket counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V4 => "ipv4",
            Self::V6 => "ipv6",
        }
    }
}
