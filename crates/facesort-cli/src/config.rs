use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Probability floor below which a face is reported as `Unknown`.
pub const DEFAULT_THRESHOLD: f32 = 0.70;

/// CLI configuration.
///
/// Resolution order: built-in defaults, then an optional TOML file, then
/// `FACESORT_*` environment variables, then command-line flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Trained model blob.
    pub model_path: PathBuf,
    /// Optional `{ "id": "display name" }` JSON map.
    pub name_map_path: Option<PathBuf>,
    /// Confidence threshold shared by classification and disambiguation.
    pub threshold: f32,
    /// Padding in pixels around face crops.
    pub crop_padding: u32,
    /// Softmax temperature for newly trained models.
    pub temperature: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: data_dir().join("face_classifier_model.json"),
            name_map_path: None,
            threshold: DEFAULT_THRESHOLD,
            crop_padding: facesort_core::crop::DEFAULT_PADDING,
            temperature: facesort_core::model::DEFAULT_TEMPERATURE,
        }
    }
}

impl Config {
    /// Load from an optional TOML file (falling back to `FACESORT_CONFIG`),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("FACESORT_CONFIG").ok().map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                let config: Config = toml::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?;
                tracing::debug!(path = %path.display(), "loaded config file");
                config
            }
            None => Config::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Apply `FACESORT_*` environment variables over the current values.
    pub fn apply_env(&mut self) {
        if let Ok(path) = std::env::var("FACESORT_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("FACESORT_NAME_MAP") {
            self.name_map_path = Some(PathBuf::from(path));
        }
        self.threshold = env_f32("FACESORT_THRESHOLD", self.threshold);
        self.crop_padding = env_u32("FACESORT_CROP_PADDING", self.crop_padding);
        self.temperature = env_f32("FACESORT_TEMPERATURE", self.temperature);
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("threshold must lie in [0, 1], got {}", self.threshold);
        }
        if !(self.temperature > 0.0) {
            bail!("temperature must be positive, got {}", self.temperature);
        }
        Ok(())
    }
}

/// `$XDG_DATA_HOME/facesort`, or `~/.local/share/facesort`.
fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facesort")
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
