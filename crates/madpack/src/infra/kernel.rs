//! Kernel scopes: isolated workspaces for extracted model files.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempDir;

static NEXT_KERNEL_ID: AtomicU64 = AtomicU64::new(1);

/// An isolated execution context owning its own extracted-file workspace.
///
/// Every kernel gets a private temporary directory; files extracted from
/// archives or resources land below it, so two concurrently running kernels
/// can reference equally named model files without colliding. Dropping the
/// scope removes the workspace and all extracted copies with it.
#[derive(Debug)]
pub struct KernelScope {
    id: u64,
    workspace: TempDir,
}

impl KernelScope {
    /// Create a kernel scope with its workspace in the system temp directory.
    pub fn create() -> io::Result<Self> {
        let id = NEXT_KERNEL_ID.fetch_add(1, Ordering::Relaxed);
        let workspace = tempfile::Builder::new()
            .prefix(&format!("madpack-kernel-{id}-"))
            .tempdir()?;
        tracing::debug!(kernel = id, path = %workspace.path().display(), "created kernel workspace");
        Ok(Self { id, workspace })
    }

    /// Create a kernel scope below the given work root, creating the root if
    /// necessary.
    pub fn create_in(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let id = NEXT_KERNEL_ID.fetch_add(1, Ordering::Relaxed);
        let workspace = tempfile::Builder::new()
            .prefix(&format!("kernel-{id}-"))
            .tempdir_in(root)?;
        tracing::debug!(kernel = id, path = %workspace.path().display(), "created kernel workspace");
        Ok(Self { id, workspace })
    }

    /// Process-unique identifier of this kernel.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The directory below which this kernel's extracted files are placed.
    pub fn file_dir(&self) -> &Path {
        self.workspace.path()
    }
}
