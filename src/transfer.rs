use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const BUFFER_SIZE: usize = 256 * 1024; // 256 KB

/// Copy `src` to `dest`, creating parent directories and keeping the
/// source modified time. Any failure on the destination side is fatal.
pub fn copy_file(src: &Path, dest: &Path) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io_fatal(parent, e))?;
    }

    let mut source = fs::File::open(src).map_err(|e| Error::io_fatal(src, e))?;
    let mut destination = fs::File::create(dest).map_err(|e| Error::io_fatal(dest, e))?;
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut copied = 0u64;

    loop {
        let bytes_read = source.read(&mut buffer).map_err(|e| Error::io_fatal(src, e))?;
        if bytes_read == 0 {
            break;
        }
        destination
            .write_all(&buffer[..bytes_read])
            .map_err(|e| Error::io_fatal(dest, e))?;
        copied += bytes_read as u64;
    }
    destination.flush().map_err(|e| Error::io_fatal(dest, e))?;

    // Preserve modified time
    if let Ok(mtime) = fs::metadata(src).and_then(|m| m.modified()) {
        let _ = destination.set_modified(mtime);
    }

    Ok(copied)
}

/// Pick a destination path inside `dir` that no earlier file has claimed.
/// `IMG_1.jpg` becomes `IMG_1_1.jpg`, `IMG_1_2.jpg`, ... on collision.
pub fn unique_destination(dir: &Path, file_name: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let candidate = dir.join(file_name);
    if taken.insert(candidate.clone()) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = name.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1;
    loop {
        let renamed = match &ext {
            Some(ext) => format!("{}_{}.{}", stem, n, ext),
            None => format!("{}_{}", stem, n),
        };
        let candidate = dir.join(renamed);
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_destination_renames_collisions() {
        let dir = Path::new("/out/cat");
        let mut taken = HashSet::new();

        assert_eq!(unique_destination(dir, "a.jpg", &mut taken), dir.join("a.jpg"));
        assert_eq!(unique_destination(dir, "a.jpg", &mut taken), dir.join("a_1.jpg"));
        assert_eq!(unique_destination(dir, "a.jpg", &mut taken), dir.join("a_2.jpg"));
        assert_eq!(unique_destination(dir, "README", &mut taken), dir.join("README"));
        assert_eq!(unique_destination(dir, "README", &mut taken), dir.join("README_1"));
        // Same name in another album does not collide.
        let other = Path::new("/out/dog");
        assert_eq!(unique_destination(other, "a.jpg", &mut taken), other.join("a.jpg"));
    }

    #[test]
    fn test_copy_file_creates_parents_and_keeps_content() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.jpg");
        fs::write(&src, b"pixels").unwrap();
        let dest = tmp.path().join("out/2021/cat/src.jpg");

        let copied = copy_file(&src, &dest).unwrap();

        assert_eq!(copied, 6);
        assert_eq!(fs::read(&dest).unwrap(), b"pixels");
        assert_eq!(
            fs::metadata(&src).unwrap().modified().unwrap(),
            fs::metadata(&dest).unwrap().modified().unwrap()
        );
    }

    #[test]
    fn test_copy_file_fails_fatally_when_destination_is_blocked() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src.jpg");
        fs::write(&src, b"pixels").unwrap();
        // A regular file where a directory is needed.
        let blocker = tmp.path().join("out");
        fs::write(&blocker, b"").unwrap();

        let err = copy_file(&src, &blocker.join("cat/src.jpg")).unwrap_err();
        assert!(matches!(err, Error::IoFatal { .. }));
    }
}
