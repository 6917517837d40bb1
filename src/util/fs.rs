use std::fs;
use std::io;
use std::path::Path;

use walkdir::WalkDir;

/// Recursively copy `src` into `dest`, creating `dest` and any parents.
/// Symlinks are copied as the files they point to.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a directory tree; a directory that is already gone is not an error.
pub fn remove_dir_all_if_exists(p: &Path) -> io::Result<()> {
    match fs::remove_dir_all(p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_dir_recursive_copies_nested_files() {
        let td = tempfile::tempdir().expect("tmpdir");
        let src = td.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.json"), "{}").unwrap();
        fs::write(src.join("nested").join("b.sh"), "echo hi").unwrap();

        let dest = td.path().join("out").join("copy");
        copy_dir_recursive(&src, &dest).expect("copy");
        assert_eq!(fs::read_to_string(dest.join("a.json")).unwrap(), "{}");
        assert_eq!(
            fs::read_to_string(dest.join("nested").join("b.sh")).unwrap(),
            "echo hi"
        );
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let td = tempfile::tempdir().expect("tmpdir");
        remove_dir_all_if_exists(&td.path().join("nope")).expect("missing ok");
        let d = td.path().join("d");
        fs::create_dir_all(d.join("x")).unwrap();
        remove_dir_all_if_exists(&d).expect("remove");
        assert!(!d.exists());
    }
}
