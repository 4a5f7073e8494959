//! Sorted per-directory file indices for the training, test and target domains.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SsdaError;

/// Files directly inside a set of directories, one sorted list per directory.
///
/// Directories are sorted before scanning, so directory `i` is also one-hot
/// label index `i`. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFileList {
    dirs: Vec<PathBuf>,
    files: Vec<Vec<PathBuf>>,
}

impl DomainFileList {
    /// Scan each directory (non-recursively) and sort its regular files.
    ///
    /// # Errors
    /// Configuration-class errors if `dirs` is empty, a directory cannot be
    /// listed, or a directory contains no files.
    pub fn scan<P: AsRef<Path>>(dirs: &[P]) -> Result<Self, SsdaError> {
        if dirs.is_empty() {
            return Err(SsdaError::Configuration(
                "directory list must not be empty".to_string(),
            ));
        }

        let mut dirs: Vec<PathBuf> = dirs.iter().map(|d| d.as_ref().to_path_buf()).collect();
        dirs.sort();

        let mut files = Vec::with_capacity(dirs.len());
        for dir in &dirs {
            let listing = list_files(dir)?;
            if listing.is_empty() {
                return Err(SsdaError::Configuration(format!(
                    "directory {} contains no files",
                    dir.display()
                )));
            }
            files.push(listing);
        }

        Ok(Self { dirs, files })
    }

    /// Sorted directory paths.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Number of directories (the one-hot label width).
    pub fn num_dirs(&self) -> usize {
        self.dirs.len()
    }

    /// Sorted files of directory `dir_key`.
    ///
    /// # Panics
    /// If `dir_key >= self.num_dirs()`.
    pub fn files(&self, dir_key: usize) -> &[PathBuf] {
        &self.files[dir_key]
    }

    /// Path at `(dir_key, file_key)`.
    ///
    /// # Panics
    /// If either key is out of range for this list.
    pub fn path(&self, dir_key: usize, file_key: usize) -> &Path {
        &self.files[dir_key][file_key]
    }

    /// Total number of files across all directories.
    pub fn len(&self) -> usize {
        self.files.iter().map(Vec::len).sum()
    }

    /// Always false for a successfully scanned list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All files, directory by directory, in index order.
    pub fn iter_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().flatten()
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, SsdaError> {
    let listing_err = |source| SsdaError::DirectoryListing {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(listing_err)? {
        let path = entry.map_err(listing_err)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File indices for the three sampling roles.
#[derive(Debug, Clone)]
pub struct DomainIndex {
    pub training: Arc<DomainFileList>,
    pub test: Arc<DomainFileList>,
    pub target: Arc<DomainFileList>,
}

impl DomainIndex {
    /// Scan all three roles. Without `test_dirs` the test role shares the
    /// training index.
    pub fn build<P: AsRef<Path>>(
        train_dirs: &[P],
        target_dirs: &[P],
        test_dirs: Option<&[P]>,
    ) -> Result<Self, SsdaError> {
        let training = Arc::new(DomainFileList::scan(train_dirs)?);
        let target = Arc::new(DomainFileList::scan(target_dirs)?);
        let test = match test_dirs {
            Some(dirs) => Arc::new(DomainFileList::scan(dirs)?),
            None => Arc::clone(&training),
        };

        tracing::info!(
            train_dirs = training.num_dirs(),
            train_files = training.len(),
            test_dirs = test.num_dirs(),
            test_files = test.len(),
            target_dirs = target.num_dirs(),
            target_files = target.len(),
            test_aliases_training = Arc::ptr_eq(&training, &test),
            "Built domain file index"
        );

        Ok(Self {
            training,
            test,
            target,
        })
    }

    /// Training set size, the basis of the iteration plan.
    pub fn dataset_size(&self) -> usize {
        self.training.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_dir(root: &Path, name: &str, files: &[&str]) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for f in files {
            fs::write(dir.join(f), b"0").unwrap();
        }
        dir
    }

    #[test]
    fn test_scan_sorts_dirs_and_files() {
        let tmp = TempDir::new().unwrap();
        let b = make_dir(tmp.path(), "b", &["z.png", "a.png", "m.png"]);
        let a = make_dir(tmp.path(), "a", &["2.png", "1.png"]);

        let list = DomainFileList::scan(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(list.dirs(), &[a.clone(), b.clone()]);
        assert_eq!(list.files(0), &[a.join("1.png"), a.join("2.png")]);
        assert_eq!(
            list.files(1),
            &[b.join("a.png"), b.join("m.png"), b.join("z.png")]
        );
        assert_eq!(list.len(), 5);
        assert_eq!(list.path(1, 2), b.join("z.png"));
    }

    #[test]
    fn test_scan_is_not_recursive() {
        let tmp = TempDir::new().unwrap();
        let a = make_dir(tmp.path(), "a", &["x.png"]);
        make_dir(&a, "nested", &["hidden.png"]);

        let list = DomainFileList::scan(&[a.clone()]).unwrap();
        assert_eq!(list.files(0), &[a.join("x.png")]);
    }

    #[test]
    fn test_scan_missing_dir_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let err = DomainFileList::scan(&[tmp.path().join("missing")]).unwrap_err();
        assert!(matches!(err, SsdaError::DirectoryListing { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_scan_empty_inputs_rejected() {
        let empty: [PathBuf; 0] = [];
        assert!(DomainFileList::scan(&empty).unwrap_err().is_configuration());

        let tmp = TempDir::new().unwrap();
        let dir = make_dir(tmp.path(), "empty", &[]);
        let err = DomainFileList::scan(&[dir]).unwrap_err();
        assert!(matches!(err, SsdaError::Configuration(_)));
    }

    #[test]
    fn test_test_role_aliases_training() {
        let tmp = TempDir::new().unwrap();
        let train = make_dir(tmp.path(), "train", &["1.png"]);
        let target = make_dir(tmp.path(), "target", &["t.png"]);

        let index = DomainIndex::build(&[train.clone()], &[target.clone()], None).unwrap();
        assert!(Arc::ptr_eq(&index.training, &index.test));
        assert_eq!(index.dataset_size(), 1);

        let test = make_dir(tmp.path(), "test", &["q.png", "r.png"]);
        let tests = [test];
        let index = DomainIndex::build(&[train], &[target], Some(&tests[..])).unwrap();
        assert!(!Arc::ptr_eq(&index.training, &index.test));
        assert_eq!(index.test.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_dir_key_panics() {
        let tmp = TempDir::new().unwrap();
        let a = make_dir(tmp.path(), "a", &["1"]);
        let list = DomainFileList::scan(&[a]).unwrap();
        let _ = list.files(list.num_dirs());
    }

    #[test]
    fn test_iter_paths_in_index_order() {
        let tmp = TempDir::new().unwrap();
        let a = make_dir(tmp.path(), "a", &["1", "2"]);
        let b = make_dir(tmp.path(), "b", &["3"]);
        let list = DomainFileList::scan(&[a.clone(), b.clone()]).unwrap();
        let all: Vec<_> = list.iter_paths().cloned().collect();
        assert_eq!(all, vec![a.join("1"), a.join("2"), b.join("3")]);
    }
}
