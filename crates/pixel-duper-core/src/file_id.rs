use std::borrow::Borrow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cheaply clonable handle to a file path. Equal paths are equal keys; the
/// path is kept as the OS gave it, so names that are not valid UTF-8 survive.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(Arc<Path>);

impl FileId {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(Arc::from(path.as_ref()))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// The path as UTF-8, if it is representable.
    pub fn to_str(&self) -> Option<&str> {
        self.0.to_str()
    }
}

impl From<&Path> for FileId {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for FileId {
    fn from(path: PathBuf) -> Self {
        Self(Arc::from(path))
    }
}

impl From<&str> for FileId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl Borrow<Path> for FileId {
    fn borrow(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equal_paths_are_interchangeable_keys() {
        let a = FileId::new("/photos/a.jpg");
        let b = FileId::from(Path::new("/photos/a.jpg"));
        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
        assert!(set.contains(Path::new("/photos/a.jpg")));
        assert_eq!(a, b);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_paths_stay_distinct() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let ff = FileId::new(OsStr::from_bytes(b"/photos/x\xff.png"));
        let fe = FileId::new(OsStr::from_bytes(b"/photos/x\xfe.png"));
        assert_ne!(ff, fe);
        assert_eq!(ff.path().as_os_str().as_bytes(), b"/photos/x\xff.png");
        assert!(ff.to_str().is_none());
    }
}
