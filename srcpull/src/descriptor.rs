//! The `url.toml` file describing where a package's source comes from.
//!
//! ```toml
//! src = "https://example.com/foo-1.0.tar.gz"
//! checksum = ["sha256=…", "md5=…"]
//! mirrors = ["https://mirror.example.com/foo-1.0.tar.gz"]
//! ```

use std::path::Path;

use crate::Error;
use crate::checksum::Checksum;
use crate::url::Url;

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct UrlDescriptor {
    pub src: Url,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checksum: Vec<Checksum>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<Url>,
}

impl UrlDescriptor {
    pub fn new(src: Url) -> Self {
        Self {
            src,
            checksum: Vec::new(),
            mirrors: Vec::new(),
        }
    }

    /// Read the descriptor at `path`. A missing file is not an error: the package simply has no
    /// source.
    pub fn read(path: &Path) -> Result<Option<Self>, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => Ok(Some(toml::from_str(&text)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), Error> {
        std::fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }

    /// The source url followed by the mirrors, in the order they are tried.
    pub fn urls(&self) -> Vec<Url> {
        std::iter::once(&self.src)
            .chain(&self.mirrors)
            .cloned()
            .collect()
    }
}
