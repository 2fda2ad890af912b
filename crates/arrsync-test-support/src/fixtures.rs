//! Temporary directory and file-tree helpers.

use std::fs;
use std::io;
use std::path::Path;

use tempfile::TempDir;

/// Create a temporary directory whose name starts with `prefix`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir(prefix: &str) -> io::Result<TempDir> {
    tempfile::Builder::new().prefix(prefix).tempdir()
}

/// Write `contents` to `root/relative`, creating parent directories.
///
/// # Errors
///
/// Returns an error if any directory or the file cannot be written.
pub fn write_file(root: &Path, relative: &str, contents: &[u8]) -> io::Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_file_creates_parents() -> io::Result<()> {
        let temp = temp_dir("arrsync-fixtures-")?;
        write_file(temp.path(), "Show.S01/Season 1/ep1.mkv", b"video")?;
        assert_eq!(
            fs::read(temp.path().join("Show.S01/Season 1/ep1.mkv"))?,
            b"video"
        );
        Ok(())
    }
}
