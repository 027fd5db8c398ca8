use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CwdError {
    #[error("Directory is not authorized.")]
    OutsideRoot,

    #[error("The system cannot find the path specified.")]
    NotFound,

    #[error("The path specified is not a directory.")]
    NotADirectory,
}

/// A session's working directory, confined to a root.
///
/// Clients see virtual paths: `/` is the root. Arguments starting with `/`
/// are resolved from the root, everything else from the current directory.
#[derive(Debug, Clone)]
pub struct WorkingDir {
    root: PathBuf,
    cwd: PathBuf,
}

impl WorkingDir {
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "root is not a directory",
            ));
        }
        Ok(Self {
            cwd: root.clone(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn current(&self) -> &Path {
        &self.cwd
    }

    fn join(&self, arg: &str) -> PathBuf {
        match arg.strip_prefix('/') {
            Some(from_root) => self.root.join(from_root),
            None => self.cwd.join(arg),
        }
    }

    fn is_within_root(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    pub fn cd(&mut self, arg: &str) -> Result<(), CwdError> {
        let target = self.join(arg);
        let canonical = target.canonicalize().map_err(|_| CwdError::NotFound)?;
        if !self.is_within_root(&canonical) {
            return Err(CwdError::OutsideRoot);
        }
        if !canonical.is_dir() {
            return Err(CwdError::NotADirectory);
        }
        self.cwd = canonical;
        Ok(())
    }

    /// Resolves an existing path inside the root.
    pub fn resolve_existing(&self, arg: &str) -> Option<PathBuf> {
        let canonical = self.join(arg).canonicalize().ok()?;
        self.is_within_root(&canonical).then_some(canonical)
    }

    /// Resolves a path that may not exist yet: its parent must exist inside
    /// the root and its last component must be a plain name.
    pub fn resolve_new(&self, arg: &str) -> Option<PathBuf> {
        let target = self.join(arg);
        let name = match target.components().next_back()? {
            Component::Normal(name) => name.to_os_string(),
            _ => return None,
        };
        let parent = target.parent()?.canonicalize().ok()?;
        self.is_within_root(&parent).then(|| parent.join(name))
    }

    /// The virtual path of `path`, `/` being the root.
    pub fn virtual_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("/{}", parts.join("/"))
    }

    pub fn display_cwd(&self) -> String {
        self.virtual_path(&self.cwd)
    }
}
