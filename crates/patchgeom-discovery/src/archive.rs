use std::fs::{self, File};
use std::io;
use std::path::Path;

use tracing::{debug, warn};

/// Unpacks a compressed model bundle into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Returns the number of files written. Must never overwrite existing
    /// files nor write outside `dest`.
    fn extract(&self, archive: &Path, dest: &Path) -> io::Result<usize>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> io::Result<usize> {
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file).map_err(io::Error::other)?;

        let mut written = 0;
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(io::Error::other)?;
            let Some(relative) = entry.enclosed_name() else {
                warn!(entry = entry.name(), "skipping archive entry outside the model root");
                continue;
            };
            let target = dest.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if target.exists() {
                debug!(path = %target.display(), "keeping existing file");
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create_new(&target)?;
            io::copy(&mut entry, &mut out)?;
            written += 1;
        }

        Ok(written)
    }
}
