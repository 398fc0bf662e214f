//! Backup-chain rotation.
//!
//! A rotation retires the active file at `path` into a numbered chain of
//! siblings (`path.1` newest, `path.<keep>` oldest) and creates a fresh,
//! empty active file in its place.
//!
//! # Order of operations
//!
//! ```text
//! 1. list the parent directory
//! 2. for i in keep..=1: delete path.i if i == keep, else rename path.i -> path.(i+1)
//! 3. rename path -> path.1 (missing active file is fine)
//! 4. create path (truncating)
//! ```
//!
//! Every step is a single OS call and the first failure aborts the rotation.
//! Nothing is rolled back, so callers should treat an error as fatal.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::{Error, Result};

/// Produces a fresh output handle on every call, retiring the previous one.
pub trait Rotate {
    type Handle: Write;

    fn rotate(&mut self) -> Result<Self::Handle>;
}

/// Rotates a file on disk with a fixed retention count.
#[derive(Debug, Clone)]
pub struct FileRotator {
    path: PathBuf,
    keep: usize,
}

impl FileRotator {
    pub fn new(path: impl Into<PathBuf>, keep: usize) -> Self {
        Self {
            path: path.into(),
            keep,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keep(&self) -> usize {
        self.keep
    }
}

impl Rotate for FileRotator {
    type Handle = File;

    fn rotate(&mut self) -> Result<File> {
        rotate(&self.path, self.keep)
    }
}

/// Path of backup `index` for the active file at `path`.
pub fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{index}"));
    path.with_file_name(name)
}

/// Indices of the backups of `path` currently present on disk.
pub fn list_backups(path: &Path) -> Result<BTreeSet<usize>> {
    let file_name = path
        .file_name()
        .ok_or(Error::InvalidConfig("output path has no file name"))?;
    let dir = parent_dir(path);

    let list_err = |source| Error::ListDir {
        dir: dir.to_path_buf(),
        source,
    };

    let mut backups = BTreeSet::new();
    for entry in fs::read_dir(dir).map_err(list_err)? {
        let entry = entry.map_err(list_err)?;
        let candidate = entry.file_name();
        if let Some(index) =
            parse_backup_index(file_name.as_encoded_bytes(), candidate.as_encoded_bytes())
        {
            backups.insert(index);
        }
    }
    Ok(backups)
}

/// Performs one rotation and returns the new, empty active file.
pub fn rotate(path: &Path, keep: usize) -> Result<File> {
    let backups = list_backups(path)?;

    // Leftovers from a run with a larger retention count.
    for &index in backups.range(keep.saturating_add(1)..).rev() {
        remove_backup(&backup_path(path, index))?;
    }

    for &index in backups.iter().rev().filter(|&&index| index <= keep) {
        let from = backup_path(path, index);
        if index == keep {
            remove_backup(&from)?;
            continue;
        }
        let to = backup_path(path, index + 1);
        fs::rename(&from, &to).map_err(|source| Error::RenameBackup {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        debug!("renamed {} -> {}", from.display(), to.display());
    }

    retire_active(path, keep)?;

    File::create(path).map_err(|source| Error::CreateActive {
        path: path.to_path_buf(),
        source,
    })
}

fn retire_active(path: &Path, keep: usize) -> Result<()> {
    if keep == 0 {
        return match fs::remove_file(path) {
            Ok(()) => {
                debug!("discarded {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::RemoveActive {
                path: path.to_path_buf(),
                source,
            }),
        };
    }

    let to = backup_path(path, 1);
    match fs::rename(path, &to) {
        Ok(()) => {
            debug!("renamed {} -> {}", path.display(), to.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::RenameActive {
            from: path.to_path_buf(),
            to,
            source,
        }),
    }
}

fn remove_backup(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|source| Error::RemoveBackup {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("evicted {}", path.display());
    Ok(())
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn parse_backup_index(file_name: &[u8], candidate: &[u8]) -> Option<usize> {
    let suffix = candidate.strip_prefix(file_name)?.strip_prefix(b".")?;
    if suffix.is_empty() || !suffix.iter().all(u8::is_ascii_digit) {
        return None;
    }
    // Reject zero-padded names; backup_path never produces them.
    if suffix.len() > 1 && suffix[0] == b'0' {
        return None;
    }
    match std::str::from_utf8(suffix).ok()?.parse::<usize>() {
        Ok(0) | Err(_) => None,
        Ok(index) => Some(index),
    }
}
