use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Standard camera media directory on a card.
pub const DEFAULT_MEDIA_DIR: &str = "DCIM";

/// Media directory of a volume, if the volume has one.
pub fn media_dir(volume_root: &Path, media_dir_name: &str) -> Option<PathBuf> {
    let dir = volume_root.join(media_dir_name);
    dir.is_dir().then_some(dir)
}

/// Every regular file below `media_dir`, any extension, any depth.
/// Unreadable entries are logged and left out.
pub fn scan_files(media_dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(media_dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry under {}: {}", media_dir.display(), e);
                continue;
            }
        };
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_files_recursive() {
        let dir = TempDir::new().unwrap();
        let dcim = dir.path().join("DCIM");
        fs::create_dir_all(dcim.join("100CANON")).unwrap();
        fs::create_dir_all(dcim.join("101CANON/empty")).unwrap();
        fs::write(dcim.join("100CANON/IMG_0001.JPG"), b"a").unwrap();
        fs::write(dcim.join("100CANON/IMG_0001.CR2"), b"b").unwrap();
        fs::write(dcim.join("101CANON/MVI_0002.MP4"), b"c").unwrap();
        fs::write(dir.path().join("outside.JPG"), b"d").unwrap();

        let mut names: Vec<String> = scan_files(&dcim)
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, ["IMG_0001.CR2", "IMG_0001.JPG", "MVI_0002.MP4"]);
    }

    #[test]
    fn test_media_dir() {
        let dir = TempDir::new().unwrap();
        assert_eq!(media_dir(dir.path(), DEFAULT_MEDIA_DIR), None);
        fs::create_dir(dir.path().join("DCIM")).unwrap();
        assert_eq!(
            media_dir(dir.path(), DEFAULT_MEDIA_DIR),
            Some(dir.path().join("DCIM"))
        );
    }
}
