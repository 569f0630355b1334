//! Discovers photographs on disk for the wallpaper engine. The texture
//! manager hands it the configured source folders and an observer; the
//! scanner walks them, filters for decodable image files, and streams the
//! results back in batches so the decode worker can start before the walk
//! finishes.
//!
//! Types:
//!
//! - `MediaObserver` is the callback seam the texture manager implements to
//!   receive discovery progress.
//! - `MediaScanner` stores the source roots and performs the walk.
//! - `ScanError` reports unreadable roots without aborting the whole scan.
//!
//! Functions:
//!
//! - `MediaScanner::discover` runs one full scan, emitting
//!   `on_start_discovery`, `on_partial_result` per batch, and
//!   `on_end_discovery` with the complete list.
//! - Free helper `is_image_file` implements the extension filter.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Paths are delivered in batches of this size so decoding can begin while
/// large libraries are still being walked.
pub const PARTIAL_BATCH_SIZE: usize = 32;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("no media sources configured")]
    NoSources,
    #[error("failed to read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Receives discovery progress. `user_request` is true when the scan was
/// triggered explicitly rather than by the engine refilling its pools.
pub trait MediaObserver {
    fn on_start_discovery(&mut self, user_request: bool);
    fn on_partial_result(&mut self, batch: &[PathBuf], user_request: bool);
    fn on_end_discovery(&mut self, all: &[PathBuf], user_request: bool);
}

#[derive(Debug, Clone)]
pub struct MediaScanner {
    sources: Vec<PathBuf>,
}

impl MediaScanner {
    pub fn new(sources: Vec<PathBuf>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Walks every configured root and reports results through `observer`.
    /// Unreadable directories are logged and skipped; the scan only fails
    /// when no sources are configured at all.
    pub fn discover(
        &self,
        observer: &mut dyn MediaObserver,
        user_request: bool,
    ) -> Result<Vec<PathBuf>, ScanError> {
        if self.sources.is_empty() {
            return Err(ScanError::NoSources);
        }

        observer.on_start_discovery(user_request);

        let mut all = Vec::new();
        let mut batch = Vec::with_capacity(PARTIAL_BATCH_SIZE);
        for root in &self.sources {
            debug!(root = %root.display(), "scanning media source");
            if let Err(err) = walk(root, &mut |path| {
                batch.push(path);
                if batch.len() >= PARTIAL_BATCH_SIZE {
                    observer.on_partial_result(&batch, user_request);
                    all.append(&mut batch);
                }
            }) {
                warn!(root = %root.display(), error = %err, "skipping unreadable media source");
            }
        }

        if !batch.is_empty() {
            observer.on_partial_result(&batch, user_request);
            all.append(&mut batch);
        }

        all.sort();
        debug!(images = all.len(), "media discovery finished");
        observer.on_end_discovery(&all, user_request);
        Ok(all)
    }
}

fn walk(root: &Path, emit: &mut impl FnMut(PathBuf)) -> Result<(), ScanError> {
    let entries = fs::read_dir(root).map_err(|source| ScanError::Unreadable {
        path: root.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            // Subdirectory failures are tolerated; the rest of the walk
            // still yields results.
            if let Err(err) = walk(&path, emit) {
                warn!(dir = %path.display(), error = %err, "skipping unreadable subdirectory");
            }
        } else if is_image_file(&path) {
            emit(path);
        }
    }
    Ok(())
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingObserver {
        events: Vec<String>,
        batches: Vec<usize>,
        total: usize,
    }

    impl MediaObserver for RecordingObserver {
        fn on_start_discovery(&mut self, _user_request: bool) {
            self.events.push("start".into());
        }

        fn on_partial_result(&mut self, batch: &[PathBuf], _user_request: bool) {
            self.events.push("partial".into());
            self.batches.push(batch.len());
        }

        fn on_end_discovery(&mut self, all: &[PathBuf], _user_request: bool) {
            self.events.push("end".into());
            self.total = all.len();
        }
    }

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn filters_extensions_case_insensitively() {
        assert!(is_image_file(Path::new("a.jpg")));
        assert!(is_image_file(Path::new("a.JPEG")));
        assert!(is_image_file(Path::new("a.WebP")));
        assert!(!is_image_file(Path::new("a.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn walks_nested_sources_and_orders_callbacks() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("album/summer");
        fs::create_dir_all(&nested).unwrap();
        touch(&temp.path().join("one.jpg"));
        touch(&nested.join("two.png"));
        touch(&nested.join("notes.txt"));

        let scanner = MediaScanner::new(vec![temp.path().to_path_buf()]);
        let mut observer = RecordingObserver::default();
        let all = scanner.discover(&mut observer, false).expect("scan");

        assert_eq!(all.len(), 2);
        assert_eq!(observer.total, 2);
        assert_eq!(observer.events.first().map(String::as_str), Some("start"));
        assert_eq!(observer.events.last().map(String::as_str), Some("end"));
        assert!(observer.events.iter().any(|e| e == "partial"));
    }

    #[test]
    fn large_trees_arrive_in_batches() {
        let temp = tempfile::tempdir().unwrap();
        for i in 0..(PARTIAL_BATCH_SIZE + 5) {
            touch(&temp.path().join(format!("img{i:03}.jpg")));
        }

        let scanner = MediaScanner::new(vec![temp.path().to_path_buf()]);
        let mut observer = RecordingObserver::default();
        scanner.discover(&mut observer, false).expect("scan");

        assert_eq!(observer.batches, vec![PARTIAL_BATCH_SIZE, 5]);
        assert_eq!(observer.total, PARTIAL_BATCH_SIZE + 5);
    }

    #[test]
    fn missing_roots_are_skipped_not_fatal() {
        let temp = tempfile::tempdir().unwrap();
        touch(&temp.path().join("keep.png"));

        let scanner = MediaScanner::new(vec![
            temp.path().join("does-not-exist"),
            temp.path().to_path_buf(),
        ]);
        let mut observer = RecordingObserver::default();
        let all = scanner.discover(&mut observer, true).expect("scan");
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn no_sources_is_an_error() {
        let scanner = MediaScanner::new(Vec::new());
        let mut observer = RecordingObserver::default();
        assert!(matches!(
            scanner.discover(&mut observer, false),
            Err(ScanError::NoSources)
        ));
        assert!(observer.events.is_empty());
    }
}
