//! Filesystem infrastructure: implements the `LocalFs` port.

use std::path::Path;

use crate::application::ports::LocalFs;

/// Production `LocalFs` backed by `std::fs` metadata calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl LocalFs for StdFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}
