use crate::errors::HostError;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicU64, Ordering},
};

static NEXT_COPY: AtomicU64 = AtomicU64::new(0);

/// A private copy of a target module, removed when the boundary goes away.
#[derive(Debug)]
pub(crate) struct ShadowCopy {
    dir: PathBuf,
    module: PathBuf,
}

impl ShadowCopy {
    pub fn create(module: &Path, folder: Option<&Path>) -> Result<Self, HostError> {
        let file_name = module.file_name().ok_or_else(|| {
            HostError::Boundary(format!("{} is not a file", module.display()))
        })?;
        let base = folder
            .map(Path::to_path_buf)
            .unwrap_or_else(env::temp_dir);
        let dir = base.join(format!(
            "runt-host-{}-{}",
            process::id(),
            NEXT_COPY.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&dir).map_err(|err| {
            HostError::Boundary(format!("{}: {}", dir.display(), err))
        })?;

        let copy = dir.join(file_name);
        if let Err(err) = fs::copy(module, &copy) {
            let _ = fs::remove_dir_all(&dir);
            return Err(HostError::Boundary(format!(
                "failed to shadow copy {}: {}",
                module.display(),
                err
            )));
        }
        log::debug!("shadow copied {} to {}", module.display(), copy.display());
        Ok(Self { dir, module: copy })
    }

    pub fn module(&self) -> &Path {
        &self.module
    }

    /// Best-effort removal.
    pub fn remove(self) {
        if let Err(err) = fs::remove_dir_all(&self.dir) {
            log::warn!(
                "failed to remove shadow copy {}: {}",
                self.dir.display(),
                err
            );
        }
    }
}
