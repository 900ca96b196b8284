//! Algorithm-tagged digests: parsing, computation and the checksum-to-path mapping used by the
//! cache.

use std::io::Read;
use std::path::{Path, PathBuf};

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

use crate::Error;

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HashKind {
    Md5,
    Sha256,
    Sha512,
}

impl HashKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Length of a hex digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }

    /// Digest the bytes produced by `reader`, reading in chunks.
    pub fn digest_reader<R: Read>(self, reader: R) -> std::io::Result<String> {
        match self {
            Self::Md5 => {
                let mut hasher = Md5::new();
                feed(&mut hasher, reader)?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                feed(&mut hasher, reader)?;
                Ok(format!("{:x}", hasher.finalize()))
            }
            Self::Sha512 => {
                let mut hasher = Sha512::new();
                feed(&mut hasher, reader)?;
                Ok(format!("{:x}", hasher.finalize()))
            }
        }
    }

    /// Compute the checksum of the file at `path` with this algorithm.
    pub fn compute(self, path: &Path) -> std::io::Result<Checksum> {
        let file = std::fs::File::open(path)?;
        Ok(Checksum {
            kind: self,
            digest: self.digest_reader(file)?,
        })
    }
}

impl std::fmt::Display for HashKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn feed<D: Digest, R: Read>(hasher: &mut D, mut reader: R) -> std::io::Result<()> {
    let mut buffer = [0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(())
}

/// A digest tagged with the algorithm that produced it. The textual form is `<kind>=<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum {
    kind: HashKind,
    digest: String,
}

impl Checksum {
    pub fn new<S: AsRef<str>>(kind: HashKind, digest: S) -> Result<Self, Error> {
        let digest = digest.as_ref().to_ascii_lowercase();
        if digest.len() != kind.hex_len() || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidChecksum(format!("{kind}={digest}")));
        }
        Ok(Self { kind, digest })
    }

    pub fn kind(&self) -> HashKind {
        self.kind
    }

    /// The lowercase hex digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Relative location of the content for this checksum: `<kind>/<first two hex chars>/<hex>`.
    pub fn to_path(&self) -> PathBuf {
        self.path_segments().into_iter().collect()
    }

    pub(crate) fn path_segments(&self) -> [&str; 3] {
        [self.kind.as_str(), &self.digest[..2], &self.digest]
    }

    /// Recompute this checksum's algorithm over `path`.
    pub fn recompute(&self, path: &Path) -> std::io::Result<Checksum> {
        self.kind.compute(path)
    }

    /// `None` if the file matches, otherwise the checksum actually found.
    pub fn mismatch(&self, path: &Path) -> std::io::Result<Option<Checksum>> {
        let actual = self.recompute(path)?;
        Ok((actual != *self).then_some(actual))
    }

    pub fn matches_file(&self, path: &Path) -> std::io::Result<bool> {
        Ok(self.mismatch(path)?.is_none())
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.kind, self.digest)
    }
}

impl std::str::FromStr for Checksum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((kind, digest)) => match HashKind::from_name(kind) {
                Some(kind) => Checksum::new(kind, digest),
                None => Err(Error::InvalidChecksum(s.to_string())),
            },
            // Untagged digests are md5
            None => Checksum::new(HashKind::Md5, s).map_err(|_| Error::InvalidChecksum(s.to_string())),
        }
    }
}

impl TryFrom<String> for Checksum {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Checksum> for String {
    fn from(value: Checksum) -> Self {
        value.to_string()
    }
}
