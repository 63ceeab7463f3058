//! Transport trait shared by the HTTP and file backends

use spark_core::{ImageHandle, Result};

/// Receives the result of a text fetch, on the host thread
pub type TextCallback = Box<dyn FnOnce(Result<String>)>;

/// Fetches resources by path relative to the transport's base.
///
/// Implementations must deliver completions on a later turn of the host
/// loop, never from inside the `fetch_*` call itself.
pub trait Transport {
    /// Fetch a text resource. A non-2xx status is reported as
    /// `SparkError::Transport`.
    fn fetch_text(&self, path: &str, done: TextCallback);

    /// Start loading an image into `target`. Fire-and-forget: on success the
    /// bytes land in the handle, on failure it stays empty.
    fn fetch_image(&self, target: &ImageHandle);

    /// Human-readable location of `path`, for logs
    fn locate(&self, path: &str) -> String;
}

/// Join a base URL and a relative path with exactly one slash between them.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if base.is_empty() {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
