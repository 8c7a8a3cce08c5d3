use std::fs::create_dir_all;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::error;

use crate::Result;
use crate::SystemError;

pub fn crate_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create log directory: {:?}", e);
                return Err(SystemError::Io(e).into());
            }
        }
    }
    Ok(())
}

pub fn open_file_for_append(path: PathBuf) -> Result<File> {
    crate_parent_dir_if_not_exist(&path)?;
    let log_file = match OpenOptions::new().append(true).create(true).open(&path) {
        Ok(f) => f,
        Err(e) => {
            return Err(SystemError::Io(e).into());
        }
    };
    Ok(log_file)
}

/// Number of entries directly inside `dir`.
pub(crate) fn count_dir_entries(dir: &Path) -> Result<usize> {
    let unreadable = |source| SystemError::DeviceDirUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut count = 0;
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        entry.map_err(unreadable)?;
        count += 1;
    }
    Ok(count)
}

/// Removes a socket file left behind by a previous run.
///
/// A missing file is not an error.
pub(crate) fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("removed stale socket {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SystemError::SocketCleanup {
            path: path.to_path_buf(),
            source,
        }
        .into()),
    }
}
