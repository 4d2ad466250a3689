use std::path::PathBuf;

use crate::error::{CitrigError, Result};

/// Component pins that ride along with every trigger, named after both the
/// file that records them and the variable that forwards them.
pub const VERSION_FILES: &[&str] = &[
    "GITALY_SERVER_VERSION",
    "GITLAB_ELASTICSEARCH_INDEXER_VERSION",
    "GITLAB_KAS_VERSION",
    "GITLAB_PAGES_VERSION",
    "GITLAB_SHELL_VERSION",
    "GITLAB_WORKHORSE_VERSION",
];

/// File tier of the two-tier version lookup; the environment tier wins.
pub trait VersionSource: Send + Sync {
    /// Trimmed contents of the pin named `name`.
    fn read(&self, name: &str) -> Result<String>;
}

/// Reads pin files from the repository checkout, `<root>/<NAME>`.
pub struct FileVersionSource {
    root: PathBuf,
}

impl FileVersionSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl VersionSource for FileVersionSource {
    fn read(&self, name: &str) -> Result<String> {
        std::fs::read_to_string(self.root.join(name))
            .map(|contents| contents.trim().to_string())
            .map_err(|source| CitrigError::VersionFile {
                name: name.to_string(),
                source,
            })
    }
}


#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_and_trims_the_pin_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("GITLAB_SHELL_VERSION")).unwrap();
        writeln!(file, "14.15.0").unwrap();

        let source = FileVersionSource::new(dir.path());

        assert_eq!(source.read("GITLAB_SHELL_VERSION").unwrap(), "14.15.0");
    }

    #[test]
    fn a_missing_pin_file_is_an_error_naming_the_file() {
        let dir = tempfile::tempdir().unwrap();

        let source = FileVersionSource::new(dir.path());
        let error = source.read("GITALY_SERVER_VERSION").unwrap_err();

        assert!(matches!(
            error,
            CitrigError::VersionFile { name, .. } if name == "GITALY_SERVER_VERSION"
        ));
    }
}
