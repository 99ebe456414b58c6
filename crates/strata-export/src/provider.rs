//! Sources of region files.

use std::path::{Path, PathBuf};

use strata_region::{RegionError, RegionFile, RegionPos};

/// Loads regions by grid position.
///
/// `Ok(None)` means the region holds no data, which is not an error.
pub trait RegionProvider: Send + Sync {
    fn load(&self, pos: RegionPos) -> Result<Option<RegionFile>, RegionError>;
}

/// A world's region directory, `<root>/r.<x>.<z>.mca`.
#[derive(Clone, Debug)]
pub struct RegionDirectory {
    root: PathBuf,
}

impl RegionDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, pos: RegionPos) -> PathBuf {
        self.root.join(pos.file_name())
    }

    /// Positions of every region file in the directory, sorted. Other files
    /// are ignored.
    pub fn regions(&self) -> Result<Vec<RegionPos>, RegionError> {
        let io_error = |source| RegionError::Io {
            path: self.root.clone(),
            source,
        };
        let mut regions = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if let Some(pos) = entry
                .file_name()
                .to_str()
                .and_then(|name| RegionPos::from_file_name(name).ok())
            {
                regions.push(pos);
            }
        }
        regions.sort();
        Ok(regions)
    }
}

impl RegionProvider for RegionDirectory {
    fn load(&self, pos: RegionPos) -> Result<Option<RegionFile>, RegionError> {
        RegionFile::load(&self.path_for(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_region_files_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["r.1.0.mca", "r.-1.-2.mca", "level.dat", "r.0.0.mcc", "r.x.0.mca"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let regions = RegionDirectory::new(dir.path()).regions().unwrap();
        assert_eq!(regions, vec![RegionPos::new(-1, -2), RegionPos::new(1, 0)]);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = RegionDirectory::new(dir.path().join("nope")).regions();
        assert!(matches!(result, Err(RegionError::Io { .. })));
    }

    #[test]
    fn test_load_missing_and_empty_regions() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RegionDirectory::new(dir.path());
        assert!(provider.load(RegionPos::new(0, 0)).unwrap().is_none());

        std::fs::write(provider.path_for(RegionPos::new(2, 3)), b"").unwrap();
        assert!(provider.load(RegionPos::new(2, 3)).unwrap().is_none());
    }

    #[test]
    fn test_load_truncated_region_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = RegionDirectory::new(dir.path());
        std::fs::write(provider.path_for(RegionPos::new(0, 0)), [0u8; 100]).unwrap();
        assert!(matches!(
            provider.load(RegionPos::new(0, 0)),
            Err(RegionError::Truncated { .. })
        ));
    }
}
