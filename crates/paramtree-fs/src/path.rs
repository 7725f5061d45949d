//! Slash-separated paths for config directories and files

use std::fmt;
use std::path::{Path, PathBuf};

/// Config file or directory path, always spelled with `/`.
///
/// Includes are resolved against directories in this form and the
/// visited set compares [`NormalizedPath::canonical_key`] values, so a
/// file reached through `a\b.pt` and `a/b.pt` is loaded once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(path.as_ref().to_string_lossy().replace('\\', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }

    /// Appends `segment`; an absolute segment wins over the base.
    pub fn join(&self, segment: &str) -> Self {
        let segment = Self::new(segment);
        if self.0.is_empty() || segment.is_absolute() {
            return segment;
        }
        match self.trimmed() {
            "/" => Self(format!("/{}", segment.0)),
            base => Self(format!("{base}/{}", segment.0)),
        }
    }

    /// Directory part, `/` for a file at the root, `None` for a bare name.
    pub fn parent(&self) -> Option<Self> {
        match self.trimmed().rsplit_once('/') {
            Some(("", _)) => Some(Self("/".to_string())),
            Some((dir, _)) => Some(Self(dir.to_string())),
            None => None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.trimmed();
        let name = trimmed.rsplit_once('/').map_or(trimmed, |(_, name)| name);
        (!name.is_empty()).then_some(name)
    }

    /// Text after the last dot of the file name. Dot files have none.
    pub fn extension(&self) -> Option<&str> {
        match self.file_name()?.rsplit_once('.') {
            Some(("", _)) | None => None,
            Some((_, ext)) => Some(ext),
        }
    }

    pub fn is_absolute(&self) -> bool {
        Path::new(&self.0).is_absolute()
    }

    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Identity of a file for include-cycle and visited tracking.
    ///
    /// A path that cannot be resolved on disk is its own key.
    pub fn canonical_key(&self) -> Self {
        dunce::canonicalize(self.to_native()).map_or_else(|_| self.clone(), Self::new)
    }

    fn trimmed(&self) -> &str {
        match self.0.trim_end_matches('/') {
            "" if self.0.starts_with('/') => "/",
            rest => rest,
        }
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_absolute_segment_replaces_base() {
        let base = NormalizedPath::new("configs/site");
        assert_eq!(base.join("/etc/paramtree").as_str(), "/etc/paramtree");
    }

    #[test]
    fn test_join_onto_empty_base() {
        let base = NormalizedPath::new("");
        assert_eq!(base.join("ports.pt").as_str(), "ports.pt");
    }

    #[test]
    fn test_join_does_not_double_the_separator() {
        let base = NormalizedPath::new("configs/");
        assert_eq!(base.join("ports.pt").as_str(), "configs/ports.pt");
    }

    #[test]
    fn test_parent_of_root_file() {
        assert_eq!(NormalizedPath::new("/ports.pt").parent().unwrap().as_str(), "/");
        assert_eq!(NormalizedPath::new("ports.pt").parent(), None);
    }

    #[test]
    fn test_dot_file_has_no_extension() {
        assert_eq!(NormalizedPath::new("a/b/.hidden").extension(), None);
        assert_eq!(NormalizedPath::new("a/b/ports.pt").extension(), Some("pt"));
    }
}
