use crate::error::Result;
use std::path::Path;

/// Assigns a class label to a single image.
///
/// Implementations return `Error::Classification` for images they cannot
/// read or decode; the organizer skips those and keeps going.
pub trait Classifier {
    fn classify(&self, path: &Path) -> Result<String>;
}
