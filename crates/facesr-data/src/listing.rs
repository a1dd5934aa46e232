//! Dataset file listing.
//!
//! Dataset roots are walked recursively. Within a directory the files are
//! visited in sorted name order, so the listing is deterministic before the
//! single shuffle that precedes splitting.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use facesr_core::Result;

/// File extensions accepted as training images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Returns true if the path has a supported image extension
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Collect every image file below the given roots.
///
/// Roots are listed in the order given. A missing root is an error.
pub fn list_images<P: AsRef<Path>>(roots: &[P]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for root in roots {
        let root = root.as_ref();
        let before = images.len();
        walk(root, &mut images)?;
        tracing::info!(
            root = %root.display(),
            count = images.len() - before,
            "Listed dataset root"
        );
    }

    Ok(images)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut files = Vec::new();
    let mut subdirs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            subdirs.push(path);
        } else if is_image_file(&path) {
            files.push(path);
        }
    }

    files.sort();
    subdirs.sort();

    // Top-down: a directory's own files precede its subdirectories
    out.extend(files);
    for sub in subdirs {
        walk(&sub, out)?;
    }

    Ok(())
}

/// Shuffle a listing in place
pub fn shuffle_paths<R: Rng + ?Sized>(paths: &mut [PathBuf], rng: &mut R) {
    paths.shuffle(rng);
}
