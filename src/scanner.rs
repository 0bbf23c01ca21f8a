use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Extensions treated as images, lowercase.
pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp"];

#[derive(Debug, Default)]
pub struct ScanResult {
    pub images: Vec<PathBuf>,
    /// Regular files without an image extension.
    pub skipped: Vec<PathBuf>,
}

/// Recursively collect image files under `input_dir`, in a stable path order.
pub fn scan_images(input_dir: &Path) -> ScanResult {
    let mut result = ScanResult::default();

    for entry in WalkDir::new(input_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                debug!("skipping unreadable entry: {}", err);
                None
            }
        })
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if is_image(path) {
            result.images.push(path.to_path_buf());
        } else {
            debug!("skipping non-image file {}", path.display());
            result.skipped.push(path.to_path_buf());
        }
    }

    result
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}
