//! Watched-directory listing for the file list view
//!
//! Lists regular files directly inside one directory (no recursion) and
//! tags each with a [`FileKind`] from its extension.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};

use organizer_core::prelude::*;
use organizer_core::{FileEntry, FileKind, SortDirection, SortKey};

/// List the regular files directly inside `dir`.
///
/// Subdirectories are skipped, as are entries whose metadata cannot be read.
/// Symlinks to files are followed. The result is in directory order; use
/// [`sort_entries`] to order it.
pub fn scan_directory(dir: &Path) -> Result<Vec<FileEntry>> {
    let read_dir = fs::read_dir(dir).map_err(|e| Error::scan(dir, e.to_string()))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry in {:?}: {}", dir, e);
                continue;
            }
        };

        let path = entry.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {:?}: {}", path, e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind: FileKind::from_path(&path),
            size: metadata.len(),
            created: metadata.created().ok().map(DateTime::<Local>::from),
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
            path,
        });
    }

    debug!("Scanned {:?}: {} files", dir, entries.len());
    Ok(entries)
}

/// Sort a listing in place. The sort is stable, so equal keys keep their order.
///
/// `Date` sorts by modification time; entries without one sort first.
/// `Type` sorts by category, then by name.
pub fn sort_entries(entries: &mut [FileEntry], key: SortKey, direction: SortDirection) {
    entries.sort_by(|a, b| {
        let ordering = compare(a, b, key);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

fn compare(a: &FileEntry, b: &FileEntry, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => compare_names(a, b),
        SortKey::Size => a.size.cmp(&b.size),
        SortKey::Date => a.modified.cmp(&b.modified),
        SortKey::Type => a
            .kind
            .as_str()
            .cmp(b.kind.as_str())
            .then_with(|| compare_names(a, b)),
    }
}

fn compare_names(a: &FileEntry, b: &FileEntry) -> Ordering {
    a.name.to_lowercase().cmp(&b.name.to_lowercase())
}

/// Human-readable size: `0 B`, `512 B`, `1.5 KB`, `2 MB`.
///
/// Uses 1024 steps and one decimal place; a trailing `.0` is dropped.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.1}", value);
    let rounded = rounded.strip_suffix(".0").unwrap_or(&rounded);
    format!("{} {}", rounded, UNITS[unit])
}
