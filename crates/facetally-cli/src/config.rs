use facetally_vision::{TensorLayout, VisionConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Default number of age histogram bins.
pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Optional TOML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    model_dir: Option<PathBuf>,
    detect_faces: Option<bool>,
    detection_threshold: Option<f32>,
    intra_threads: Option<usize>,
    tensor_layout: Option<TensorLayout>,
    histogram_bins: Option<usize>,
}

/// Resolved CLI configuration: defaults, then the config file, then
/// `FACETALLY_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub vision: VisionConfig,
    /// Number of age histogram bins in reports.
    pub histogram_bins: usize,
    /// Config file that was read, if any.
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration. `explicit` (from `--config`) wins over `FACETALLY_CONFIG`.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("FACETALLY_CONFIG").map(PathBuf::from));

        let file = match &path {
            Some(p) => read_file(p)?,
            None => FileConfig::default(),
        };

        let mut config = Self::resolve(file, |key| std::env::var(key).ok());
        config.file = path;
        Ok(config)
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = VisionConfig::default();

        let model_dir = env("FACETALLY_MODEL_DIR")
            .map(PathBuf::from)
            .or(file.model_dir)
            .unwrap_or_else(|| default_model_dir(&env));

        let vision = VisionConfig {
            model_dir,
            detect_faces: env("FACETALLY_DETECT_FACES")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .or(file.detect_faces)
                .unwrap_or(defaults.detect_faces),
            detection_threshold: env_parse(&env, "FACETALLY_DETECTION_THRESHOLD")
                .or(file.detection_threshold)
                .unwrap_or(defaults.detection_threshold),
            intra_threads: env_parse(&env, "FACETALLY_INTRA_THREADS")
                .or(file.intra_threads)
                .unwrap_or(defaults.intra_threads),
            layout: env_parse(&env, "FACETALLY_TENSOR_LAYOUT")
                .or(file.tensor_layout)
                .unwrap_or(defaults.layout),
        };

        Self {
            vision,
            histogram_bins: env_parse(&env, "FACETALLY_HISTOGRAM_BINS")
                .or(file.histogram_bins)
                .unwrap_or(DEFAULT_HISTOGRAM_BINS),
            file: None,
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// `$XDG_DATA_HOME/facetally/models`, falling back to `~/.local/share`.
fn default_model_dir(env: &impl Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facetally")
        .join("models")
}

fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(FileConfig::default(), env_from(&[("HOME", "/home/ana")]));
        assert_eq!(
            config.vision.model_dir,
            PathBuf::from("/home/ana/.local/share/facetally/models")
        );
        assert!(config.vision.detect_faces);
        assert_eq!(config.vision.intra_threads, 2);
        assert_eq!(config.histogram_bins, DEFAULT_HISTOGRAM_BINS);
    }

    #[test]
    fn test_xdg_data_home() {
        let config = Config::resolve(
            FileConfig::default(),
            env_from(&[("XDG_DATA_HOME", "/data")]),
        );
        assert_eq!(config.vision.model_dir, PathBuf::from("/data/facetally/models"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            model_dir = "/opt/models"
            detect_faces = false
            tensor_layout = "nchw"
            histogram_bins = 8
            "#,
        )
        .unwrap();
        let config = Config::resolve(file, env_from(&[]));
        assert_eq!(config.vision.model_dir, PathBuf::from("/opt/models"));
        assert!(!config.vision.detect_faces);
        assert_eq!(config.vision.layout, TensorLayout::Nchw);
        assert_eq!(config.histogram_bins, 8);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = FileConfig {
            model_dir: Some(PathBuf::from("/opt/models")),
            histogram_bins: Some(8),
            ..FileConfig::default()
        };
        let env = env_from(&[
            ("FACETALLY_MODEL_DIR", "/env/models"),
            ("FACETALLY_HISTOGRAM_BINS", "5"),
            ("FACETALLY_DETECT_FACES", "0"),
            ("FACETALLY_DETECTION_THRESHOLD", "0.65"),
        ]);
        let config = Config::resolve(file, env);
        assert_eq!(config.vision.model_dir, PathBuf::from("/env/models"));
        assert_eq!(config.histogram_bins, 5);
        assert!(!config.vision.detect_faces);
        assert!((config.vision.detection_threshold - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_bad_env_value_falls_back() {
        let file = FileConfig {
            intra_threads: Some(4),
            ..FileConfig::default()
        };
        let config = Config::resolve(file, env_from(&[("FACETALLY_INTRA_THREADS", "many")]));
        assert_eq!(config.vision.intra_threads, 4);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("facetally.toml");
        std::fs::write(&path, "model_dirr = \"/x\"\n").unwrap();
        assert!(matches!(read_file(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
