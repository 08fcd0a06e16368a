//! Core domain types

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────
// Worker status
// ─────────────────────────────────────────────────────────

/// Last-known state of the supervised worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerStatus {
    Running {
        pid: u32,
    },
    #[default]
    Stopped,
}

impl WorkerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, WorkerStatus::Running { .. })
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            WorkerStatus::Running { pid } => Some(*pid),
            WorkerStatus::Stopped => None,
        }
    }

    /// Lowercase label used on the bridge
    pub fn label(&self) -> &'static str {
        match self {
            WorkerStatus::Running { .. } => "running",
            WorkerStatus::Stopped => "stopped",
        }
    }
}

// ─────────────────────────────────────────────────────────
// Files
// ─────────────────────────────────────────────────────────

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "heic"];

const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "hwp", "hwpx", "xls", "xlsx", "ppt", "pptx", "txt", "md", "csv", "rtf",
];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "webm", "flv"];

/// Category of a file, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Document,
    Image,
    Other,
    Video,
}

impl FileKind {
    /// Classify by extension (case-insensitive). No extension means `Other`.
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return FileKind::Other;
        };
        let ext = ext.to_ascii_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Image
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Document
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Video
        } else {
            FileKind::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Document => "document",
            FileKind::Image => "image",
            FileKind::Other => "other",
            FileKind::Video => "video",
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A regular file found in the watched directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Creation time, when the platform reports one
    pub created: Option<DateTime<Local>>,
    pub modified: Option<DateTime<Local>>,
    #[serde(rename = "type")]
    pub kind: FileKind,
}

/// Per-category totals for a file listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub total: usize,
    pub images: usize,
    pub documents: usize,
    pub videos: usize,
    pub others: usize,
}

impl FileStats {
    pub fn from_entries(entries: &[FileEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut stats, entry| {
            stats.total += 1;
            match entry.kind {
                FileKind::Image => stats.images += 1,
                FileKind::Document => stats.documents += 1,
                FileKind::Video => stats.videos += 1,
                FileKind::Other => stats.others += 1,
            }
            stats
        })
    }
}

/// Column a file listing is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Date,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}
