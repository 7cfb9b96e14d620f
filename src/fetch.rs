//! Tile retrieval: the fetcher seam, its error taxonomy, and local-cache
//! validation.
//!
//! The engine never assumes a particular transport — anything that turns
//! a URL into bytes implements [`TileFetcher`]. The default
//! implementation rides `reqwest::blocking` with a fixed per-request
//! timeout and no retries; retry policy belongs to the caller.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

/// Per-request timeout; a tile slower than this is treated as failed.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// Smallest plausible tile file; anything shorter is a truncated or
/// error-page artifact.
pub const MIN_TILE_BYTES: u64 = 1024;

/// JPEG start-of-image signature.
pub const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP status {0}")]
    Status(u16),
}

/// Turns a tile URL into raster bytes.
pub trait TileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP fetcher with a fixed timeout.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tessella/", env!("CARGO_PKG_VERSION")))
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(HttpFetcher { client })
    }
}

impl TileFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;
        Ok(bytes.to_vec())
    }
}

/// Whether a local tile file can stand in for a fresh download:
/// it exists, is at least [`MIN_TILE_BYTES`], and starts with the JPEG
/// signature. Cheap structural checks in place of full validation.
pub fn is_cached_tile(path: &Path) -> bool {
    let Ok(meta) = path.metadata() else {
        return false;
    };
    if !meta.is_file() || meta.len() < MIN_TILE_BYTES {
        return false;
    }

    let Ok(mut file) = File::open(path) else {
        return false;
    };
    let mut header = [0u8; 3];
    if file.read_exact(&mut header).is_err() {
        return false;
    }
    header == JPEG_MAGIC
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tessella_fetch_tests");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn missing_file_is_not_cached() {
        assert!(!is_cached_tile(Path::new("/nonexistent/tile.jpg")));
    }

    #[test]
    fn short_file_is_not_cached() {
        let path = temp_path("short.jpg");
        fs::write(&path, [0xFF, 0xD8, 0xFF, 0x00]).unwrap();
        assert!(!is_cached_tile(&path));
    }

    #[test]
    fn wrong_magic_is_not_cached() {
        let path = temp_path("not_jpeg.jpg");
        let mut data = vec![0x89, 0x50, 0x4E]; // PNG-ish start
        data.resize(2048, 0);
        fs::write(&path, &data).unwrap();
        assert!(!is_cached_tile(&path));
    }

    #[test]
    fn valid_jpeg_header_is_cached() {
        let path = temp_path("good.jpg");
        let mut data = JPEG_MAGIC.to_vec();
        data.resize(2048, 0);
        fs::write(&path, &data).unwrap();
        assert!(is_cached_tile(&path));
    }

    #[test]
    fn error_display() {
        assert_eq!(FetchError::Timeout.to_string(), "request timed out");
        assert_eq!(FetchError::Status(404).to_string(), "HTTP status 404");
        assert_eq!(
            FetchError::Network("refused".into()).to_string(),
            "network error: refused"
        );
    }
}
