use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("model {name} not found (searched: {searched:?})")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("could not determine model directory")]
    NoCacheDir,
}

/// Resolve a model file by name.
///
/// An explicit path is used as given and never replaced by another model:
/// if it does not exist the result is `NotFound`. Without one, the search is
/// the user model directory (platform-specific), then the bundled directory
/// (for development / pre-packaged installs).
pub fn resolve(
    name: &str,
    explicit: Option<&Path>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_with(name, explicit, model_cache_dir, bundled_dir)
}

fn resolve_with(
    name: &str,
    explicit: Option<&Path>,
    cache_dir: impl FnOnce() -> Result<PathBuf, ModelResolveError>,
    bundled_dir: Option<&Path>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = explicit {
        return first_existing(name, vec![path.to_path_buf()]);
    }

    let mut candidates = Vec::new();
    match cache_dir() {
        Ok(dir) => candidates.push(dir.join(name)),
        Err(e) if bundled_dir.is_none() => return Err(e),
        Err(e) => log::debug!("{e}; searching the bundled directory only"),
    }
    if let Some(dir) = bundled_dir {
        candidates.push(dir.join(name));
    }
    first_existing(name, candidates)
}

/// Platform-specific model directory.
///
/// - macOS: `~/Library/Application Support/MaskWatch/models/`
/// - Linux: `$XDG_DATA_HOME/MaskWatch/models/` or `~/.local/share/MaskWatch/models/`
/// - Windows: `%APPDATA%/MaskWatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::data_dir()
        .map(|d| d.join("MaskWatch").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn first_existing(name: &str, candidates: Vec<PathBuf>) -> Result<PathBuf, ModelResolveError> {
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        log::debug!("Resolved model {name} at {}", found.display());
        return Ok(found.clone());
    }
    Err(ModelResolveError::NotFound {
        name: name.to_string(),
        searched: candidates,
    })
}
