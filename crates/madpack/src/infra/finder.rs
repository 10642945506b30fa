//! Resolution of model files to local paths and byte streams.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::domain::errors::ResolveError;
use crate::domain::file::{ModelFile, ModelFileLocation, ModelPathOffsets};
use crate::infra::kernel::KernelScope;
use crate::infra::source::{ContentStream, ModelSource};

/// What takes priority when looking up repository files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryPriority {
    /// Look in the repository path first; extract from the archive only when
    /// the file is not found there.
    #[default]
    Repository,
    /// Extract from the archive first; fall back to the repository path only
    /// when extraction fails.
    Archive,
}

/// Resolves [`ModelFile`] references of one model definition to usable
/// filesystem paths or byte streams.
///
/// A finder is scoped to a single model definition: it carries the
/// definition's path offsets and the [`ModelSource`] its content comes from.
/// Files that have to be extracted from the source land in the private
/// directory of the requesting [`KernelScope`]; extraction is idempotent per
/// kernel.
pub struct ModelFileFinder {
    offsets: ModelPathOffsets,
    source: ModelSource,
    /// Root of the shared model repository on disk, if one is configured.
    repository_base: Option<PathBuf>,
    priority: RwLock<RepositoryPriority>,
    /// Extraction cache, keyed by kernel id and archive path.
    extracted: DashMap<(u64, String), PathBuf>,
}

impl ModelFileFinder {
    pub fn new(offsets: ModelPathOffsets, source: ModelSource) -> Self {
        Self {
            offsets,
            source,
            repository_base: None,
            priority: RwLock::new(RepositoryPriority::default()),
            extracted: DashMap::new(),
        }
    }

    /// Build a finder according to the loaded configuration: repository base
    /// and lookup priority come from the config, offsets and source from the
    /// model definition at hand.
    pub fn from_config(
        config: &crate::infra::config::Config,
        offsets: ModelPathOffsets,
        source: ModelSource,
    ) -> Self {
        let mut finder = Self::new(offsets, source);
        finder.repository_base = config.repository.base();
        finder.set_repository_file_priority(config.repository.file_priority());
        finder
    }

    /// Set the on-disk root below which repository offsets are resolved.
    pub fn with_repository_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.repository_base = Some(base.into());
        self
    }

    pub fn repository_file_priority(&self) -> RepositoryPriority {
        *self.priority.read()
    }

    pub fn set_repository_file_priority(&self, priority: RepositoryPriority) {
        *self.priority.write() = priority;
    }

    /// The absolute repository path of a file: repository base (when
    /// configured), the location's path offset, then the file name. Pure path
    /// composition, no I/O.
    pub fn repository_path(&self, file: &ModelFile) -> PathBuf {
        let mut path = self.repository_base.clone().unwrap_or_default();
        if let Some(offset) = file.location.path_offset(&self.offsets) {
            push_segments(&mut path, offset);
        }
        push_segments(&mut path, &file.name);
        path
    }

    /// The path of a file inside a zip archive or exported directory tree:
    /// the location's prefix, the location's path offset, then the file name.
    /// Always forward-slash separated, independent of the host separator.
    pub fn archive_path(&self, file: &ModelFile) -> String {
        let mut segments: Vec<&str> = vec![file.location.resource_prefix(&self.offsets)];
        if let Some(offset) = file.location.path_offset(&self.offsets) {
            segments.extend(offset.split('/').filter(|s| !s.is_empty()));
        }
        segments.extend(file.name.split('/').filter(|s| !s.is_empty()));
        segments.join("/")
    }

    /// Resolve a model file to a path usable by an external process.
    ///
    /// Resource files always come from the model source. Repository files
    /// follow the configured [`RepositoryPriority`]. Content that has to be
    /// extracted is written below the kernel's private directory, never to a
    /// shared location, and only once per kernel.
    pub fn resolve(&self, file: &ModelFile, kernel: &KernelScope) -> Result<PathBuf, ResolveError> {
        match file.location {
            ModelFileLocation::Resource => self.extract(file, kernel),
            ModelFileLocation::Repository => match self.repository_file_priority() {
                RepositoryPriority::Repository => {
                    let repository_path = self.repository_path(file);
                    if repository_path.is_file() {
                        tracing::debug!(file = %file.name, path = %repository_path.display(), "resolved from repository");
                        Ok(repository_path)
                    } else {
                        tracing::debug!(file = %file.name, "not in repository, extracting from archive");
                        self.extract(file, kernel)
                    }
                }
                RepositoryPriority::Archive => match self.extract(file, kernel) {
                    Ok(path) => Ok(path),
                    Err(extract_err) => {
                        let repository_path = self.repository_path(file);
                        if repository_path.is_file() {
                            tracing::warn!(file = %file.name, error = %extract_err, "extraction failed, falling back to repository");
                            Ok(repository_path)
                        } else {
                            Err(ResolveError::not_found(file))
                        }
                    }
                },
            },
        }
    }

    /// Open the raw content of a model file, honoring the same lookup
    /// priority as [`resolve`](Self::resolve) but without any kernel-scoped
    /// extraction. Used for packaging, not for execution.
    pub fn open_stream(&self, file: &ModelFile) -> Result<ContentStream, ResolveError> {
        match file.location {
            ModelFileLocation::Resource => self.open_from_source(file),
            ModelFileLocation::Repository => match self.repository_file_priority() {
                RepositoryPriority::Repository => {
                    let repository_path = self.repository_path(file);
                    if repository_path.is_file() {
                        open_file(&repository_path)
                    } else {
                        self.open_from_source(file)
                    }
                }
                RepositoryPriority::Archive => self.open_from_source(file).or_else(|_| {
                    let repository_path = self.repository_path(file);
                    if repository_path.is_file() {
                        open_file(&repository_path)
                    } else {
                        Err(ResolveError::not_found(file))
                    }
                }),
            },
        }
    }

    /// The on-disk origin of a model file, available only when the model
    /// definition's source is a local file tree. Used by maintenance tooling
    /// to validate a repository, not by export.
    pub fn local_source_file(&self, file: &ModelFile) -> Option<PathBuf> {
        self.source.local_path(&self.archive_path(file))
    }

    fn open_from_source(&self, file: &ModelFile) -> Result<ContentStream, ResolveError> {
        let archive_path = self.archive_path(file);
        self.source.open(&archive_path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ResolveError::not_found(file)
            } else {
                ResolveError::Open {
                    path: PathBuf::from(archive_path),
                    source: err,
                }
            }
        })
    }

    /// Extract a file from the model source into the kernel's workspace.
    /// Second and later calls for the same file and kernel are cache hits.
    fn extract(&self, file: &ModelFile, kernel: &KernelScope) -> Result<PathBuf, ResolveError> {
        let archive_path = self.archive_path(file);
        let key = (kernel.id(), archive_path.clone());

        if let Some(cached) = self.extracted.get(&key)
            && cached.is_file()
        {
            tracing::debug!(file = %file.name, kernel = kernel.id(), "extraction cache hit");
            return Ok(cached.clone());
        }

        let mut target = kernel.file_dir().to_path_buf();
        push_segments(&mut target, &archive_path);

        let mut stream = self.open_from_source(file)?;
        write_stream(&mut stream, &target).map_err(|err| ResolveError::Extraction {
            name: file.name.clone(),
            target: target.clone(),
            source: err,
        })?;

        tracing::debug!(file = %file.name, kernel = kernel.id(), target = %target.display(), "extracted model file");
        self.extracted.insert(key, target.clone());
        Ok(target)
    }
}

fn open_file(path: &Path) -> Result<ContentStream, ResolveError> {
    let file = File::open(path).map_err(|err| ResolveError::Open {
        path: path.to_path_buf(),
        source: err,
    })?;
    Ok(Box::new(file))
}

fn write_stream(stream: &mut ContentStream, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(target)?;
    io::copy(stream, &mut out)?;
    Ok(())
}

/// Push the segments of a forward-slash path onto a host path.
fn push_segments(path: &mut PathBuf, slash_path: &str) {
    for segment in slash_path.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
}
