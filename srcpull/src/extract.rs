//! Unpacking of downloaded archives.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::Archive;
use xz2::read::XzDecoder;

/// Archive formats that can be unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the file name.
    pub fn from_name(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// Detect the format from the leading bytes of the file.
    pub fn sniff(path: &Path) -> io::Result<Option<Self>> {
        let mut head = Vec::with_capacity(512);
        fs::File::open(path)?.take(512).read_to_end(&mut head)?;
        Ok(if head.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if head.starts_with(b"BZh") {
            Some(Self::TarBz2)
        } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::TarXz)
        } else if head.starts_with(b"PK\x03\x04") {
            Some(Self::Zip)
        } else if head.len() >= 262 && &head[257..262] == b"ustar" {
            Some(Self::Tar)
        } else {
            None
        })
    }

    /// The format of `path`, by name first and then by content.
    pub fn detect(path: &Path) -> io::Result<Option<Self>> {
        match Self::from_name(path) {
            Some(format) => Ok(Some(format)),
            None => Self::sniff(path),
        }
    }
}

fn unpack_tar<R: Read>(reader: R, into: &Path) -> io::Result<()> {
    let mut archive = Archive::new(reader);
    for archive_entry in archive.entries()? {
        // `unpack_in` refuses entries that would escape `into`
        archive_entry?.unpack_in(into)?;
    }
    Ok(())
}

fn unpack(archive: &Path, format: ArchiveFormat, into: &Path) -> io::Result<()> {
    let file = fs::File::open(archive)?;
    match format {
        ArchiveFormat::Tar => unpack_tar(file, into),
        ArchiveFormat::TarGz => unpack_tar(GzDecoder::new(file), into),
        ArchiveFormat::TarBz2 => unpack_tar(BzDecoder::new(file), into),
        ArchiveFormat::TarXz => unpack_tar(XzDecoder::new(file), into),
        ArchiveFormat::Zip => zip::ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(into))
            .map_err(io::Error::other),
    }
}

/// Extract `archive` so that its content ends up directly in `dest`, replacing anything already
/// there. An archive holding a single top-level directory is unwrapped. A file that is not a
/// recognised archive is copied into `dest` unchanged.
pub fn extract(archive: &Path, dest: &Path) -> io::Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let Some(format) = ArchiveFormat::detect(archive)? else {
        fs::create_dir_all(dest)?;
        let name = archive
            .file_name()
            .ok_or_else(|| io::Error::other(format!("no file name in {}", archive.display())))?;
        fs::copy(archive, dest.join(name))?;
        return Ok(());
    };
    let staging = tempfile::Builder::new()
        .prefix(".extract")
        .tempdir_in(parent)?;
    unpack(archive, format, staging.path())?;
    let top_level = fs::read_dir(staging.path())?.collect::<Result<Vec<_>, _>>()?;
    match top_level.as_slice() {
        [single] if single.file_type()?.is_dir() => fs::rename(single.path(), dest)?,
        _ => fs::rename(staging.keep(), dest)?,
    }
    Ok(())
}

#[cfg(test)]
mod test_extract {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::path::PathBuf;

    fn write_tar_gz(path: &Path, entries: &[(&str, &str)]) {
        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn detect_by_name() {
        assert_eq!(ArchiveFormat::from_name(Path::new("x-1.0.tar.gz")), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name(Path::new("x.TBZ")), Some(ArchiveFormat::TarBz2));
        assert_eq!(ArchiveFormat::from_name(Path::new("x.txz")), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_name(Path::new("x.zip")), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_name(Path::new("x.ml")), None);
    }

    #[test]
    fn detect_by_content() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("download");
        write_tar_gz(&archive, &[("a.txt", "a")]);
        assert_eq!(ArchiveFormat::detect(&archive).unwrap(), Some(ArchiveFormat::TarGz));
    }

    #[test]
    fn single_top_level_dir_is_unwrapped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("foo-1.0.tar.gz");
        write_tar_gz(&archive, &[("foo-1.0/README", "hi"), ("foo-1.0/src/lib.ml", "let x = 1")]);
        let dest = dir.path().join("out/foo.1.0");
        extract(&archive, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("README")).unwrap(), "hi");
        assert!(dest.join("src/lib.ml").is_file());
    }

    #[test]
    fn flat_archive_is_kept_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("flat.tar.gz");
        write_tar_gz(&archive, &[("a.txt", "a"), ("b.txt", "b")]);
        let dest = dir.path().join("flat");
        extract(&archive, &dest).unwrap();
        assert!(dest.join("a.txt").is_file());
        assert!(dest.join("b.txt").is_file());
        let leftovers: Vec<PathBuf> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(".extract"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn plain_file_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("patch.diff");
        fs::write(&file, "--- a\n+++ b\n").unwrap();
        let dest = dir.path().join("pkg");
        extract(&file, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("patch.diff")).unwrap(), "--- a\n+++ b\n");
    }
}
