#[cfg(target_os = "windows")]
pub mod windows;

use std::fs::Metadata;
use std::path::Path;

/// Identity of the underlying file, independent of the path used to reach it.
/// Hard links and symlinks to the same file share one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity {
    pub device: u64,
    pub index: u64,
}

#[cfg(unix)]
pub fn file_identity(_path: &Path, metadata: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(FileIdentity {
        device: metadata.dev(),
        index: metadata.ino(),
    })
}

#[cfg(target_os = "windows")]
pub fn file_identity(path: &Path, _metadata: &Metadata) -> Option<FileIdentity> {
    windows::file_identity(path)
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn file_identity(_path: &Path, _metadata: &Metadata) -> Option<FileIdentity> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_hard_link_shares_identity() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        let c = dir.path().join("c.png");
        fs::write(&a, b"one").unwrap();
        fs::hard_link(&a, &b).unwrap();
        fs::write(&c, b"one").unwrap();

        let id = |p: &Path| file_identity(p, &fs::metadata(p).unwrap()).unwrap();
        assert_eq!(id(&a), id(&b));
        assert_ne!(id(&a), id(&c));
    }
}
