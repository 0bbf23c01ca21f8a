use anyhow::Result;
use chrono::{Datelike, NaiveDateTime};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Year the photo was taken.
/// Tries EXIF first, falls back to filesystem modified time.
pub fn capture_year(path: &Path) -> Result<i32> {
    let dt = extract_exif_datetime(path).or_else(|_| extract_filesystem_datetime(path))?;
    Ok(dt.year())
}

fn extract_exif_datetime(path: &Path) -> Result<NaiveDateTime> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;

    // Try DateTimeOriginal first, then DateTime
    let field = exif
        .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
        .or_else(|| exif.get_field(exif::Tag::DateTime, exif::In::PRIMARY))
        .ok_or_else(|| anyhow::anyhow!("No EXIF datetime field found"))?;

    let value = field.display_value().to_string();
    // EXIF format: "2024-01-15 14:30:00"
    let dt = NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S")?;
    Ok(dt)
}

fn extract_filesystem_datetime(path: &Path) -> Result<NaiveDateTime> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata.modified()?;
    let datetime: chrono::DateTime<chrono::Local> = modified.into();
    Ok(datetime.naive_local())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use std::time::SystemTime;

    #[test]
    fn test_falls_back_to_modified_time() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("no_exif.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let mtime: SystemTime = Local
            .with_ymd_and_hms(2019, 7, 4, 12, 0, 0)
            .unwrap()
            .into();
        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(mtime).unwrap();

        assert_eq!(capture_year(&path).unwrap(), 2019);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(capture_year(Path::new("/definitely/not/here.jpg")).is_err());
    }
}
