use std::io;
use std::path::PathBuf;

use crate::error::Result;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "BENTOKIT_HOME";

/// Root data directory: `$BENTOKIT_HOME`, or `$HOME/.bentokit`.
pub fn home_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|_| {
        io::Error::new(io::ErrorKind::NotFound, "HOME environment variable not set")
    })?;
    Ok(PathBuf::from(home).join(".bentokit"))
}

pub fn bento_store_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join("bentos"))
}

pub fn model_store_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join("models"))
}
