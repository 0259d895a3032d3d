//! RAR volume naming and volume sets
//!
//! Two naming schemes are in use:
//! - numbered: `name.part01.rar`, `name.part02.rar`, ... (any digit width)
//! - legacy: `name.rar` followed by `name.r00`, `name.r01`, ...
//!
//! Only the first volume of a set is handed to the extractor; `unrar` walks the
//! remaining volumes on its own. Events for later volumes are mapped back to the
//! first one so that a set whose tail arrives late is picked up again.

use std::path::{Path, PathBuf};

/// Naming scheme and position of one volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeScheme {
    /// `name.partN.rar`; `width` is the digit count used in the file name
    Numbered {
        /// 1-based volume number
        number: u32,
        /// Zero-padded width of the number
        width: usize,
    },
    /// `name.rar` (`index` is `None`) or `name.rNN`
    Legacy {
        /// Continuation index from the `.rNN` extension
        index: Option<u32>,
    },
}

/// A file name recognized as part of a RAR archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RarVolume {
    path: PathBuf,
    /// Byte length of the set's base name in the file name
    base_len: usize,
    scheme: VolumeScheme,
}

impl RarVolume {
    /// Recognize `path` as a RAR volume; `None` for anything else
    pub fn parse(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let name = path.file_name()?.to_str()?;
        // ASCII lowering keeps byte offsets valid for the original name
        let lower = name.to_ascii_lowercase();

        let (base_len, scheme) = if let Some(stem) = lower.strip_suffix(".rar") {
            match numbered_part(stem) {
                Some((base_len, number, width)) => {
                    (base_len, VolumeScheme::Numbered { number, width })
                }
                None => (stem.len(), VolumeScheme::Legacy { index: None }),
            }
        } else {
            let (stem, ext) = lower.rsplit_once('.')?;
            let digits = ext.strip_prefix('r')?;
            if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (
                stem.len(),
                VolumeScheme::Legacy {
                    index: digits.parse().ok(),
                },
            )
        };

        if base_len == 0 {
            return None;
        }
        Some(Self {
            path,
            base_len,
            scheme,
        })
    }

    /// Path this volume was parsed from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Naming scheme and position
    pub fn scheme(&self) -> VolumeScheme {
        self.scheme
    }

    /// Whether this is the volume the extractor should be given
    pub fn is_first(&self) -> bool {
        match self.scheme {
            VolumeScheme::Numbered { number, .. } => number == 1,
            VolumeScheme::Legacy { index } => index.is_none(),
        }
    }

    /// Path of the first volume of this set, next to this one
    ///
    /// The case of the original extension is kept (`MOVIE.R03` maps to `MOVIE.RAR`).
    pub fn first_volume(&self) -> PathBuf {
        if self.is_first() {
            return self.path.clone();
        }
        let name = self.file_name();
        let base = &name[..self.base_len];
        let first = match self.scheme {
            VolumeScheme::Numbered { width, .. } => {
                // ".part" keeps its original case, so does the trailing ".rar"
                let part = &name[self.base_len..self.base_len + 5];
                let rar = &name[name.len() - 4..];
                format!("{base}{part}{:0width$}{rar}", 1)
            }
            VolumeScheme::Legacy { .. } => {
                let upper = name[self.base_len + 1..].starts_with('R');
                format!("{base}.{}", if upper { "RAR" } else { "rar" })
            }
        };
        self.path.with_file_name(first)
    }

    /// Whether `other` belongs to the same set as this volume
    pub fn same_set(&self, other: &RarVolume) -> bool {
        let same_scheme = matches!(
            (self.scheme, other.scheme),
            (VolumeScheme::Numbered { .. }, VolumeScheme::Numbered { .. })
                | (VolumeScheme::Legacy { .. }, VolumeScheme::Legacy { .. })
        );
        same_scheme
            && self.path.parent() == other.path.parent()
            && self.file_name()[..self.base_len]
                .eq_ignore_ascii_case(&other.file_name()[..other.base_len])
    }

    fn file_name(&self) -> &str {
        // `parse` only accepts UTF-8 file names
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }
}

/// `stem` ends in `.partN`; returns (base length, number, digit width)
fn numbered_part(stem: &str) -> Option<(usize, u32, usize)> {
    let idx = stem.rfind(".part")?;
    let digits = &stem[idx + 5..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = digits.parse().ok()?;
    Some((idx, number, digits.len()))
}

/// Check if a path is any volume of a RAR archive.
pub fn is_rar_file(path: &Path) -> bool {
    RarVolume::parse(path).is_some()
}

/// Every volume of the set `path` belongs to that currently exists next to it
///
/// `path` itself is always included, even when the directory cannot be read.
/// The result is sorted.
pub fn volume_set(path: &Path) -> Vec<PathBuf> {
    let mut members = vec![path.to_path_buf()];
    let Some(volume) = RarVolume::parse(path) else {
        return members;
    };
    let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return members;
    };

    if let Ok(entries) = std::fs::read_dir(dir) {
        members.extend(
            entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|candidate| candidate != path)
                .filter_map(RarVolume::parse)
                .filter(|candidate| volume.same_set(candidate))
                .map(|candidate| candidate.path),
        );
    }
    members.sort();
    members
}
