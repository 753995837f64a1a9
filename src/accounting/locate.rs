use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

/// On-disk encoding of an accounting file, in lookup precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Encoding {
    /// File-name suffix, empty for plain files.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Plain => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
            Self::Xz => ".xz",
            Self::Zstd => ".zst",
        }
    }

    pub fn all() -> &'static [Self] {
        &[Self::Plain, Self::Gzip, Self::Bzip2, Self::Xz, Self::Zstd]
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("plain"),
            other => f.write_str(&other.suffix()[1..]),
        }
    }
}

/// An accounting file found for a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSource {
    pub path: PathBuf,
    pub encoding: Encoding,
}

/// Candidate base paths for `day`, most specific first.
///
/// sysstat writes either `<dir>/YYYYMM/saDD` (HISTORY-enabled layouts) or the
/// flat `<dir>/saDD`.
pub fn candidate_bases(data_dir: &Path, day: NaiveDate) -> [PathBuf; 2] {
    let file = format!("sa{:02}", day.day());
    let month = format!("{:04}{:02}", day.year(), day.month());
    [data_dir.join(month).join(&file), data_dir.join(file)]
}

/// Find the accounting file for `day`, or `None` if no candidate exists.
pub fn locate(data_dir: &Path, day: NaiveDate) -> Option<LocatedSource> {
    for base in candidate_bases(data_dir, day) {
        for encoding in Encoding::all() {
            let mut name = base.clone().into_os_string();
            name.push(encoding.suffix());
            let path = PathBuf::from(name);
            if path.is_file() {
                return Some(LocatedSource {
                    path,
                    encoding: *encoding,
                });
            }
        }
    }
    None
}
