use crate::classifier::Classifier;
use crate::error::{Error, Result};
use crate::metadata;
use crate::scanner;
use crate::transfer;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct OrganizeSummary {
    /// Copied files per album folder, e.g. `2021/cat` or `cat`.
    pub albums: BTreeMap<String, usize>,
    /// Images that could not be classified or dated.
    pub failed: Vec<PathBuf>,
    /// Non-image files left alone.
    pub skipped: usize,
}

impl OrganizeSummary {
    pub fn organized(&self) -> usize {
        self.albums.values().sum()
    }
}

/// Classify every image under `src_dir` and copy it to
/// `dest_dir/<label>/` or `dest_dir/<year>/<label>/`.
///
/// Unreadable images are skipped with a warning; a failed write aborts.
pub fn organize_images_dir<C>(
    classifier: &C,
    src_dir: &Path,
    dest_dir: &Path,
    by_year: bool,
) -> Result<OrganizeSummary>
where
    C: Classifier + ?Sized,
{
    if dest_dir.exists() {
        return Err(Error::PathValidation(format!(
            "DEST_PATH ERROR: '{}' already exists and cannot be used as output directory.",
            dest_dir.display()
        )));
    }

    let scanned = scanner::scan_images(src_dir);
    let mut summary = OrganizeSummary {
        skipped: scanned.skipped.len(),
        ..Default::default()
    };
    debug!(
        "found {} images and {} other files in {}",
        scanned.images.len(),
        summary.skipped,
        src_dir.display()
    );

    std::fs::create_dir_all(dest_dir).map_err(|e| Error::io_fatal(dest_dir, e))?;

    let pb = ProgressBar::new(scanned.images.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Organizing {pos}/{len} {wide_bar} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut taken = HashSet::new();
    for path in &scanned.images {
        let file_name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        pb.set_message(file_name.clone());

        let album = match album_for(classifier, path, by_year) {
            Ok(album) => album,
            Err(e @ Error::Classification { .. }) => {
                pb.suspend(|| warn!("{}, skipping", e));
                summary.failed.push(path.clone());
                pb.inc(1);
                continue;
            }
            Err(e) => {
                pb.abandon();
                return Err(e);
            }
        };

        let album_dir = dest_dir.join(&album);
        let dest = transfer::unique_destination(&album_dir, &file_name, &mut taken);
        if let Err(e) = transfer::copy_file(path, &dest) {
            pb.abandon();
            return Err(e);
        }
        debug!("{} -> {}", path.display(), dest.display());

        *summary.albums.entry(album).or_insert(0) += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(summary)
}

/// Relative album folder for one image: `<label>` or `<year>/<label>`.
fn album_for<C>(classifier: &C, path: &Path, by_year: bool) -> Result<String>
where
    C: Classifier + ?Sized,
{
    let label = sanitize_label(&classifier.classify(path)?);
    if !by_year {
        return Ok(label);
    }

    let year = metadata::capture_year(path).map_err(|e| Error::Classification {
        path: path.to_path_buf(),
        reason: format!("no capture date: {}", e),
    })?;
    Ok(format!("{}/{}", year, label))
}

/// Labels become folder names; keep them to a single path component.
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "unlabeled".to_string(),
        _ => cleaned,
    }
}
