use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Listen address (host:port).
    pub bind_addr: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Preset applied when a request names none.
    pub default_preset: String,
    /// Upper bound on a multipart upload body.
    pub max_upload_bytes: usize,
    /// Quality of the JPEG response encoding.
    pub jpeg_quality: u8,
    /// Depth of the engine request queue.
    pub queue_depth: usize,
}

impl Config {
    /// Load configuration from `TOONSWAP_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("TOONSWAP_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| toonswap_face::default_model_dir());

        Self {
            bind_addr: std::env::var("TOONSWAP_BIND")
                .unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            model_dir,
            default_preset: std::env::var("TOONSWAP_PRESET")
                .unwrap_or_else(|_| "classic".to_string()),
            max_upload_bytes: env_usize("TOONSWAP_MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            jpeg_quality: env_u8("TOONSWAP_JPEG_QUALITY", 90),
            queue_depth: env_usize("TOONSWAP_QUEUE_DEPTH", 4),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_usize_parses_and_defaults() {
        std::env::set_var("TOONSWAP_TEST_USIZE", "42");
        assert_eq!(env_usize("TOONSWAP_TEST_USIZE", 7), 42);
        std::env::remove_var("TOONSWAP_TEST_USIZE");
        assert_eq!(env_usize("TOONSWAP_TEST_USIZE", 7), 7);
    }

    #[test]
    fn env_usize_ignores_garbage() {
        std::env::set_var("TOONSWAP_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_usize("TOONSWAP_TEST_GARBAGE", 3), 3);
        std::env::remove_var("TOONSWAP_TEST_GARBAGE");
    }

    #[test]
    fn env_u8_rejects_overflow() {
        std::env::set_var("TOONSWAP_TEST_U8", "4000");
        assert_eq!(env_u8("TOONSWAP_TEST_U8", 90), 90);
        std::env::remove_var("TOONSWAP_TEST_U8");
    }
}
