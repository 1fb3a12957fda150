//! Audio source addressing
//!
//! The engine accepts a plain filesystem path or a `file://`-scheme URI. Any
//! other scheme is rejected: remote fetch is the generation service's job and
//! happens before this engine ever sees the source.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Resolve a source string to a local filesystem path.
///
/// - Plain paths pass through unchanged.
/// - `file:///path/to/track.mp3` and `file://localhost/path` are
///   percent-decoded to `/path/to/track.mp3`.
/// - Other URI schemes yield [`Error::InvalidSource`].
///
/// Existence is not checked here; `play()` does that as its pre-flight step.
pub fn resolve_source(source: &str) -> Result<PathBuf> {
    if let Some(rest) = source.strip_prefix("file://") {
        let path = match rest.find('/') {
            // file:///absolute/path has an empty authority
            Some(0) => rest,
            Some(idx) => {
                let host = &rest[..idx];
                if host != "localhost" {
                    return Err(Error::InvalidSource(format!(
                        "file URI with remote host '{}' is not supported",
                        host
                    )));
                }
                &rest[idx..]
            }
            None => {
                return Err(Error::InvalidSource(format!(
                    "file URI has no path: {}",
                    source
                )));
            }
        };

        let decoded = urlencoding::decode(path)
            .map_err(|e| Error::InvalidSource(format!("invalid percent-encoding: {}", e)))?;
        return Ok(PathBuf::from(decoded.into_owned()));
    }

    if source.contains("://") {
        return Err(Error::InvalidSource(format!(
            "unsupported URI scheme: {}",
            source
        )));
    }

    Ok(PathBuf::from(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_passes_through() {
        let path = resolve_source("/music/track.mp3").unwrap();
        assert_eq!(path, PathBuf::from("/music/track.mp3"));
    }

    #[test]
    fn test_relative_path_passes_through() {
        let path = resolve_source("tracks/next.flac").unwrap();
        assert_eq!(path, PathBuf::from("tracks/next.flac"));
    }

    #[test]
    fn test_file_uri() {
        let path = resolve_source("file:///music/track.mp3").unwrap();
        assert_eq!(path, PathBuf::from("/music/track.mp3"));
    }

    #[test]
    fn test_file_uri_percent_decoding() {
        let path = resolve_source("file:///music/my%20track.mp3").unwrap();
        assert_eq!(path, PathBuf::from("/music/my track.mp3"));
    }

    #[test]
    fn test_file_uri_localhost() {
        let path = resolve_source("file://localhost/music/track.mp3").unwrap();
        assert_eq!(path, PathBuf::from("/music/track.mp3"));
    }

    #[test]
    fn test_file_uri_remote_host_rejected() {
        assert!(matches!(
            resolve_source("file://nas/music/track.mp3"),
            Err(Error::InvalidSource(_))
        ));
    }

    #[test]
    fn test_http_scheme_rejected() {
        assert!(matches!(
            resolve_source("https://example.com/track.mp3"),
            Err(Error::InvalidSource(_))
        ));
    }
}
