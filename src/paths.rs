use crate::key::ClassificationKey;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// `root/make/model/date`. Key fields are used as-is; characters the
/// filesystem rejects surface as an I/O error when the directory is created.
pub fn destination_dir(root: &Path, key: &ClassificationKey) -> PathBuf {
    root.join(&key.make).join(&key.model).join(&key.date)
}

/// Build the destination directory for `key` and make sure it exists.
pub fn ensure_destination_dir(root: &Path, key: &ClassificationKey) -> io::Result<PathBuf> {
    let dir = destination_dir(root, key);
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(make: &str, model: &str, date: &str) -> ClassificationKey {
        ClassificationKey {
            make: make.into(),
            model: model.into(),
            date: date.into(),
        }
    }

    #[test]
    fn test_destination_dir() {
        let root = Path::new("photos");
        assert_eq!(
            destination_dir(root, &key("Nikon", "D850", "2022-01-01")),
            Path::new("photos").join("Nikon").join("D850").join("2022-01-01")
        );
    }

    #[test]
    fn test_ensure_creates_nested_dirs() {
        let root = TempDir::new().unwrap();
        let dir = ensure_destination_dir(root.path(), &key("Canon", "EOS R5", "2023-07-04")).unwrap();
        assert!(dir.is_dir());
        assert!(dir.ends_with("Canon/EOS R5/2023-07-04"));

        // Existing directories are fine.
        ensure_destination_dir(root.path(), &key("Canon", "EOS R5", "2023-07-04")).unwrap();
    }
}
