//! Filesystem adapters for the persistence layer.

use certgen_types::{CertgenError, Filesystem, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Expand path with tilde.
pub fn expand_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }

    path.to_path_buf()
}

/// Writes under a root directory on local disk.
///
/// Parent directories are created as needed (`0755` on unix). The requested
/// mode is applied even when the file already exists.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    root: PathBuf,
}

impl LocalFilesystem {
    /// Use `root` as the base directory, creating it if necessary.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = expand_path(root);
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a logical path under the root.
    ///
    /// Absolute paths and `..` components are rejected so nothing escapes
    /// the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if path.is_empty() || escapes {
            return Err(CertgenError::Validation(format!(
                "refusing to write outside the output root: '{}'",
                path
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl Filesystem for LocalFilesystem {
    fn write_file(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            create_parent_dirs(parent)?;
        }

        // An existing file keeps its old mode through open; restrict it
        // before any new bytes land.
        let mut file = open_with_mode(&target, mode)?;
        set_mode(&file, mode)?;
        file.write_all(data)?;
        file.sync_all()?;

        tracing::trace!(path = %target.display(), mode = %format!("{:04o}", mode), "wrote file");
        Ok(())
    }
}

#[cfg(unix)]
fn create_parent_dirs(dir: &Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o755).create(dir)?;
    Ok(())
}

#[cfg(not(unix))]
fn create_parent_dirs(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(unix)]
fn open_with_mode(path: &Path, mode: u32) -> Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?)
}

#[cfg(not(unix))]
fn open_with_mode(path: &Path, _mode: u32) -> Result<fs::File> {
    Ok(fs::File::create(path)?)
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> Result<()> {
    Ok(())
}

/// A file captured by [`MemoryFilesystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    /// File contents
    pub data: Vec<u8>,
    /// Permission bits requested by the writer
    pub mode: u32,
}

/// In-memory filesystem, ordered by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilesystem {
    files: BTreeMap<String, MemoryFile>,
    writes: Vec<String>,
}

impl MemoryFilesystem {
    /// Empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a written file.
    pub fn get(&self, path: &str) -> Option<&MemoryFile> {
        self.files.get(path)
    }

    /// All files by path.
    pub fn files(&self) -> &BTreeMap<String, MemoryFile> {
        &self.files
    }

    /// Paths in the order they were written (repeats included).
    pub fn write_order(&self) -> &[String] {
        &self.writes
    }

    /// Number of distinct paths.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Filesystem for MemoryFilesystem {
    fn write_file(&mut self, path: &str, data: &[u8], mode: u32) -> Result<()> {
        self.writes.push(path.to_string());
        self.files.insert(
            path.to_string(),
            MemoryFile {
                data: data.to_vec(),
                mode,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_filesystem() {
        let mut fs = MemoryFilesystem::new();
        fs.write_file("etc/origin/master/ca.crt", b"cert", 0o644).unwrap();
        fs.write_file("etc/origin/master/ca.key", b"key", 0o600).unwrap();
        fs.write_file("etc/origin/master/ca.crt", b"cert2", 0o644).unwrap();

        assert_eq!(fs.len(), 2);
        assert_eq!(fs.get("etc/origin/master/ca.crt").unwrap().data, b"cert2");
        assert_eq!(fs.get("etc/origin/master/ca.key").unwrap().mode, 0o600);
        assert_eq!(fs.write_order().len(), 3);
    }

    #[test]
    fn test_local_filesystem_writes_nested() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = LocalFilesystem::new(dir.path()).unwrap();
        fs.write_file("etc/etcd/peer.key", b"secret", 0o600).unwrap();

        let written = dir.path().join("etc/etcd/peer.key");
        assert_eq!(std::fs::read(&written).unwrap(), b"secret");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&written).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_local_filesystem_tightens_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = LocalFilesystem::new(dir.path()).unwrap();
        fs.write_file("etc/origin/master/admin.key", b"one", 0o644).unwrap();
        fs.write_file("etc/origin/master/admin.key", b"two", 0o600).unwrap();

        let written = dir.path().join("etc/origin/master/admin.key");
        assert_eq!(std::fs::read(&written).unwrap(), b"two");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&written).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_world_readable_key_is_restricted_before_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let written = dir.path().join("etc/origin/master/ca.key");
        std::fs::create_dir_all(written.parent().unwrap()).unwrap();
        std::fs::write(&written, b"old key material that is longer").unwrap();
        std::fs::set_permissions(&written, std::fs::Permissions::from_mode(0o644)).unwrap();

        let mut fs = LocalFilesystem::new(dir.path()).unwrap();
        let target = fs.resolve("etc/origin/master/ca.key").unwrap();
        let file = open_with_mode(&target, 0o600).unwrap();
        assert_eq!(std::fs::metadata(&written).unwrap().permissions().mode() & 0o777, 0o644);
        set_mode(&file, 0o600).unwrap();
        assert_eq!(std::fs::metadata(&written).unwrap().permissions().mode() & 0o777, 0o600);
        assert_eq!(std::fs::metadata(&written).unwrap().len(), 0);
        drop(file);

        fs.write_file("etc/origin/master/ca.key", b"new", 0o600).unwrap();
        assert_eq!(std::fs::read(&written).unwrap(), b"new");
        assert_eq!(std::fs::metadata(&written).unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_local_filesystem_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mut fs = LocalFilesystem::new(dir.path()).unwrap();
        assert!(fs.write_file("../outside.crt", b"x", 0o644).is_err());
        assert!(fs.write_file("/etc/passwd", b"x", 0o644).is_err());
        assert!(fs.write_file("", b"x", 0o644).is_err());
    }

    #[test]
    fn test_expand_path_plain() {
        assert_eq!(expand_path("_output"), PathBuf::from("_output"));
    }
}
