//! Temporary storage for uploaded documents.
//!
//! Uploads are written under a single directory with a random prefix and removed as soon as
//! the request that created them finishes, whatever its outcome.

use crate::config::Config;
use std::path::{Path, PathBuf};

/// Extensions accepted by `POST /upload`.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["txt", "pdf", "doc", "docx"];

/// Where uploads are stored and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Directory that receives temporary upload files.
    pub dir: PathBuf,
    /// Largest accepted file, in bytes.
    pub max_bytes: usize,
}

impl UploadSettings {
    /// Settings derived from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            dir: config.upload_dir.clone(),
            max_bytes: config.upload_max_bytes,
        }
    }

    /// Human-readable cap used in error messages (e.g. `16MB`).
    pub fn max_size_label(&self) -> String {
        const MIB: usize = 1024 * 1024;
        if self.max_bytes >= MIB && self.max_bytes % MIB == 0 {
            format!("{}MB", self.max_bytes / MIB)
        } else {
            format!("{} bytes", self.max_bytes)
        }
    }

    /// Create the upload directory if it does not exist yet.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }
}

/// Whether `filename` carries one of the [`ALLOWED_EXTENSIONS`].
pub fn is_allowed(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| {
            let extension = extension.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.contains(&extension.as_str())
        })
        .unwrap_or(false)
}

/// Stem used when nothing of the client-supplied stem survives sanitizing.
const FALLBACK_STEM: &str = "upload";

/// Reduce a client-supplied filename to a safe basename.
///
/// Directory components are dropped, whitespace becomes `_`, and anything other than ASCII
/// alphanumerics, `.`, `_` and `-` is removed. Leading dots and underscores are stripped so
/// the result can never be hidden or relative. The extension is kept; a stem that cleans
/// down to nothing is replaced with `upload`.
pub fn sanitize_filename(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, extension) = match basename.rsplit_once('.') {
        Some((stem, extension)) => (stem, extension),
        None => (basename, ""),
    };

    let stem = clean_component(stem);
    let stem = stem.trim_start_matches(['.', '_']);
    let stem = if stem.is_empty() { FALLBACK_STEM } else { stem };
    let extension: String = extension
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect();

    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}

fn clean_component(part: &str) -> String {
    part.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
        .collect()
}

/// Uploaded file on disk, deleted when dropped.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
}

impl TempUpload {
    /// Write `bytes` to a fresh `<uuid>_<filename>` path under `dir`.
    pub async fn persist(dir: &Path, filename: &str, bytes: &[u8]) -> std::io::Result<Self> {
        let unique = format!("{}_{}", uuid::Uuid::new_v4().simple(), filename);
        let path = dir.join(unique);
        // Own the path before writing so a partial write is still cleaned up.
        let upload = Self { path };
        tokio::fs::write(&upload.path, bytes).await?;
        tracing::debug!(path = %upload.path.display(), bytes = bytes.len(), "Stored upload");
        Ok(upload)
    }

    /// Location of the stored file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the stored file as reported by the filesystem.
    pub async fn size_on_disk(&self) -> std::io::Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed upload"),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "Failed to remove upload")
            }
        }
    }
}
