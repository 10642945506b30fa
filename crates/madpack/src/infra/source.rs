//! Origins of model file content: directory trees, zip archives, bundled
//! resources.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};

use zip::ZipArchive;
use zip::result::ZipError;

/// Readable stream of model file content.
pub type ContentStream = Box<dyn Read + Send>;

/// One of the three possible origins of the concrete data of a model
/// definition. All lookups are keyed by *archive path* (forward-slash
/// separated), the layout shared by zip archives, exported directory trees
/// and bundled resources.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A local file tree laid out like an exported archive.
    Directory { root: PathBuf },
    /// A previously exported zip archive.
    Zip { path: PathBuf },
    /// Resources bundled with the application, held in memory.
    Memory { files: BTreeMap<String, Vec<u8>> },
}

impl ModelSource {
    pub fn directory(root: impl Into<PathBuf>) -> Self {
        ModelSource::Directory { root: root.into() }
    }

    pub fn zip(path: impl Into<PathBuf>) -> Self {
        ModelSource::Zip { path: path.into() }
    }

    pub fn memory(files: BTreeMap<String, Vec<u8>>) -> Self {
        ModelSource::Memory { files }
    }

    /// Open the content stored at the given archive path. Fails with
    /// [`io::ErrorKind::NotFound`] when the source has no such entry.
    pub fn open(&self, archive_path: &str) -> io::Result<ContentStream> {
        match self {
            ModelSource::Directory { root } => {
                let file = File::open(join_archive_path(root, archive_path))?;
                Ok(Box::new(file))
            }
            ModelSource::Zip { path } => {
                let mut archive = open_zip(path)?;
                match archive.by_name(archive_path) {
                    Ok(mut entry) => {
                        let mut buf = Vec::with_capacity(entry.size() as usize);
                        entry.read_to_end(&mut buf)?;
                        Ok(Box::new(Cursor::new(buf)))
                    }
                    Err(ZipError::FileNotFound) => Err(not_found(archive_path)),
                    Err(err) => Err(io::Error::other(err)),
                }
            }
            ModelSource::Memory { files } => match files.get(archive_path) {
                Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
                None => Err(not_found(archive_path)),
            },
        }
    }

    /// Whether the source holds content for the given archive path.
    pub fn contains(&self, archive_path: &str) -> bool {
        match self {
            ModelSource::Directory { root } => join_archive_path(root, archive_path).is_file(),
            ModelSource::Zip { path } => open_zip(path)
                .map(|mut archive| archive.by_name(archive_path).is_ok())
                .unwrap_or(false),
            ModelSource::Memory { files } => files.contains_key(archive_path),
        }
    }

    /// The on-disk location of an archive path, when the source is a plain
    /// directory tree. Zip and in-memory sources have no per-file location.
    pub fn local_path(&self, archive_path: &str) -> Option<PathBuf> {
        match self {
            ModelSource::Directory { root } => Some(join_archive_path(root, archive_path)),
            _ => None,
        }
    }
}

fn open_zip(path: &Path) -> io::Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(io::Error::other)
}

fn not_found(archive_path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no entry '{archive_path}' in model source"),
    )
}

/// Join a forward-slash archive path onto a host path, segment by segment.
fn join_archive_path(root: &Path, archive_path: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in archive_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path
}
