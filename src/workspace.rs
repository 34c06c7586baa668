use std::{
  fs, io,
  path::{Component, Path, PathBuf},
};

use thiserror::Error;

/// Error for anything touching the workspace tree.
#[derive(Debug, Error)]
pub enum FilesystemError {
  #[error("workspace root {path}: {source}")]
  Root {
    path: PathBuf,
    source: io::Error,
  },

  #[error("workspace io at {path}: {source}")]
  Io {
    path: PathBuf,
    source: io::Error,
  },

  #[error("path `{path}` escapes the workspace")]
  Containment { path: PathBuf },
}

/// Fixed subdirectory schema of one submission's workspace.
const SUBDIRS: [&str; 6] = ["submission", "problem", "lib", "build", "run", "logs"];

/// A per-submission host directory tree.
///
/// Acquired at the start of an iteration and released at its end; release
/// either deletes the tree or parks it under `<root>/debug` for inspection.
#[derive(Debug)]
pub struct Workspace {
  id: String,
  dir: PathBuf,
  root: PathBuf,
}

impl Workspace {
  /// Create the directory skeleton for one submission.
  pub fn acquire(root: &Path, id: &str) -> Result<Self, FilesystemError> {
    let dir = root.join(id);
    for sub in SUBDIRS {
      fs::create_dir_all(dir.join(sub)).map_err(|source| FilesystemError::Io {
        path: dir.join(sub),
        source,
      })?;
    }
    return Ok(Self {
      id: id.to_string(),
      dir,
      root: root.to_path_buf(),
    });
  }

  pub fn id(&self) -> &str {
    return &self.id;
  }

  pub fn path(&self) -> &Path {
    return &self.dir;
  }

  pub fn submission_dir(&self) -> PathBuf {
    return self.dir.join("submission");
  }

  pub fn problem_dir(&self) -> PathBuf {
    return self.dir.join("problem");
  }

  pub fn lib_dir(&self) -> PathBuf {
    return self.dir.join("lib");
  }

  pub fn build_dir(&self) -> PathBuf {
    return self.dir.join("build");
  }

  pub fn logs_dir(&self) -> PathBuf {
    return self.dir.join("logs");
  }

  /// Per-test execution scratch directory (created on demand).
  pub fn run_dir(&self, test_name: &str) -> Result<PathBuf, FilesystemError> {
    let dir = self.contained_join(&self.dir.join("run"), test_name)?;
    fs::create_dir_all(&dir).map_err(|source| FilesystemError::Io {
      path: dir.clone(),
      source,
    })?;
    return Ok(dir);
  }

  /// Join `name` onto `base`, refusing anything that could land outside the
  /// workspace: absolute paths, parent components, and symlinks that resolve
  /// out of the tree.
  pub fn contained_join(&self, base: &Path, name: &str) -> Result<PathBuf, FilesystemError> {
    let rel = Path::new(name);
    if rel
      .components()
      .any(|c| !matches!(c, Component::Normal(_)))
    {
      return Err(FilesystemError::Containment {
        path: rel.to_path_buf(),
      });
    }

    let joined = base.join(rel);

    // Symlink check: resolve the deepest existing ancestor and make sure it
    // is still inside the workspace.
    let mut probe = joined.clone();
    let real = loop {
      match probe.canonicalize() {
        Ok(p) => break p,
        Err(_) => match probe.parent() {
          Some(parent) => probe = parent.to_path_buf(),
          None => {
            return Err(FilesystemError::Containment { path: joined });
          }
        },
      }
    };
    let real_ws = self.dir.canonicalize().map_err(|source| FilesystemError::Io {
      path: self.dir.clone(),
      source,
    })?;
    if !real.starts_with(&real_ws) {
      return Err(FilesystemError::Containment { path: joined });
    }

    return Ok(joined);
  }

  /// Delete the tree, or move it to `<root>/debug/<id>` when a debugging
  /// copy was requested.
  pub fn release(self, keep_for_debug: bool) -> Result<(), FilesystemError> {
    if keep_for_debug {
      let parking = self.root.join("debug");
      fs::create_dir_all(&parking).map_err(|source| FilesystemError::Io {
        path: parking.clone(),
        source,
      })?;
      let target = parking.join(&self.id);
      log::info!("keeping workspace {} at {}", self.id, target.display());
      return fs::rename(&self.dir, &target).map_err(|source| FilesystemError::Io {
        path: target,
        source,
      });
    }
    return fs::remove_dir_all(&self.dir).map_err(|source| FilesystemError::Io {
      path: self.dir.clone(),
      source,
    });
  }
}

/// Startup check: the workspace root exists, is a directory and is writable.
pub fn ensure_root(root: &Path) -> Result<(), FilesystemError> {
  fs::create_dir_all(root).map_err(|source| FilesystemError::Root {
    path: root.to_path_buf(),
    source,
  })?;
  let probe = root.join(".write-probe");
  fs::write(&probe, b"probe").map_err(|source| FilesystemError::Root {
    path: root.to_path_buf(),
    source,
  })?;
  fs::remove_file(&probe).map_err(|source| FilesystemError::Root {
    path: root.to_path_buf(),
    source,
  })?;
  return Ok(());
}
