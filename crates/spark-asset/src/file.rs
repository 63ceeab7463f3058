//! Local directory transport
//!
//! Serves the same relative paths as the HTTP transport from a directory on
//! disk. Reads happen on the host thread in a queued task, so completions
//! still arrive on a later turn than the issuing call.

use crate::transport::{TextCallback, Transport};
use spark_core::{ImageHandle, Result, SparkError};
use spark_runtime::Host;
use std::io;
use std::path::{Path, PathBuf};

/// Transport reading resources from a local directory
pub struct FileTransport {
    host: Host,
    root: PathBuf,
}

impl FileTransport {
    pub fn new(host: Host, root: impl Into<PathBuf>) -> Self {
        Self {
            host,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SparkError::Transport {
            url: path.display().to_string(),
            status: 404,
        },
        _ => SparkError::TransportIo {
            url: path.display().to_string(),
            message: e.to_string(),
        },
    })
}

fn read_text(path: &Path) -> Result<String> {
    let bytes = read(path)?;
    String::from_utf8(bytes).map_err(|e| SparkError::TransportIo {
        url: path.display().to_string(),
        message: format!("not valid UTF-8: {e}"),
    })
}

impl Transport for FileTransport {
    fn fetch_text(&self, path: &str, done: TextCallback) {
        let file = self.resolve(path);
        log::debug!("read {}", file.display());
        self.host.spawn_local(move || done(read_text(&file)));
    }

    fn fetch_image(&self, target: &ImageHandle) {
        let file = self.resolve(target.path());
        let image = target.clone();
        self.host.spawn_local(move || match read(&file) {
            Ok(bytes) => {
                image.fulfill(bytes);
            }
            Err(e) => log::warn!("image {} failed to load: {e}", image.path()),
        });
    }

    fn locate(&self, path: &str) -> String {
        self.resolve(path).display().to_string()
    }
}
