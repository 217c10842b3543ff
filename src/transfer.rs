use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Read and write buffer size for card transfers.
const BUFFER_SIZE: usize = 256 * 1024;

/// Copy `src` into `dest_dir` under its original file name, replacing any
/// existing file. Returns the destination path and the number of bytes copied.
///
/// Not atomic: an interrupted copy leaves a truncated destination behind.
pub fn copy_into(src: &Path, dest_dir: &Path) -> io::Result<(PathBuf, u64)> {
    let file_name = src
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "source has no file name"))?;
    let dest = dest_dir.join(file_name);
    let bytes = copy_file(src, &dest)?;
    Ok((dest, bytes))
}

fn copy_file(src: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, fs::File::open(src)?);
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, fs::File::create(dest)?);
    let copied = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    let destination = writer.into_inner().map_err(io::IntoInnerError::into_error)?;

    if let Ok(mtime) = reader.get_ref().metadata().and_then(|m| m.modified()) {
        if let Err(e) = destination.set_modified(mtime) {
            log::debug!("could not set mtime on {}: {}", dest.display(), e);
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_into_overwrites() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("IMG_0001.JPG");
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        fs::write(&src, b"new contents").unwrap();
        fs::write(out.join("IMG_0001.JPG"), b"old contents that are longer").unwrap();

        let (dest, bytes) = copy_into(&src, &out).unwrap();
        assert_eq!(dest, out.join("IMG_0001.JPG"));
        assert_eq!(bytes, 12);
        assert_eq!(fs::read(&dest).unwrap(), b"new contents");
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("DSC_0042.NEF");
        fs::write(&src, vec![7u8; BUFFER_SIZE + 17]).unwrap();
        let past = std::time::SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);
        fs::OpenOptions::new()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(past)
            .unwrap();

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let (dest, bytes) = copy_into(&src, &out).unwrap();
        assert_eq!(bytes, (BUFFER_SIZE + 17) as u64);
        assert_eq!(fs::metadata(&dest).unwrap().modified().unwrap(), past);
    }

    #[test]
    fn test_copy_spanning_several_buffers_is_exact() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("MVI_0007.MP4");
        let contents: Vec<u8> = (0..3 * BUFFER_SIZE + 5).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &contents).unwrap();

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let (dest, bytes) = copy_into(&src, &out).unwrap();
        assert_eq!(bytes, contents.len() as u64);
        assert_eq!(fs::read(&dest).unwrap(), contents);
    }

    #[test]
    fn test_empty_file_is_copied() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("EMPTY.THM");
        fs::write(&src, b"").unwrap();

        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        let (dest, bytes) = copy_into(&src, &out).unwrap();
        assert_eq!(bytes, 0);
        assert!(dest.is_file());
    }

    #[test]
    fn test_missing_source_is_error() {
        let dir = TempDir::new().unwrap();
        let err = copy_into(&dir.path().join("gone.CR2"), dir.path()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
