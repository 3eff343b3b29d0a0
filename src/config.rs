use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_API_URL: &str = "https://integrate.api.nvidia.com";
pub const DEFAULT_TEXT_MODEL: &str = "nvidia/nvidia-nemotron-nano-9b-v2";
/// Attempt budget of the generation loop.
pub const MAX_RETRIES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_ms: u64,
    pub system_prompt: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_TEXT_MODEL.to_string(),
            timeout_ms: 30_000,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_attempts: usize,
    pub max_tokens: u32,
    /// Temperature of the first attempt.
    pub initial_temperature: f32,
    /// Temperature of a retry is `retry_temperature + retry_temperature_step * index`.
    pub retry_temperature: f32,
    pub retry_temperature_step: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            max_tokens: 1500,
            initial_temperature: 0.1,
            retry_temperature: 0.2,
            retry_temperature_step: 0.05,
        }
    }
}

impl PipelineConfig {
    pub fn temperature_for_attempt(&self, index: usize) -> f32 {
        if index == 0 {
            self.initial_temperature
        } else {
            self.retry_temperature + self.retry_temperature_step * index as f32
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub generator: GeneratorConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    api_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    timeout_ms: Option<u64>,
    system_prompt: Option<String>,
    max_attempts: Option<usize>,
    max_tokens: Option<u32>,
    temperature: Option<TemperatureFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemperatureFile {
    initial: Option<f32>,
    retry: Option<f32>,
    step: Option<f32>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(_) => json5::from_str(&contents)?,
    };

    if let Some(v) = parsed.api_url {
        config.generator.api_url = v;
    }
    if let Some(v) = parsed.api_key {
        config.generator.api_key = v;
    }
    if let Some(v) = parsed.model {
        config.generator.model = v;
    }
    if let Some(v) = parsed.timeout_ms {
        config.generator.timeout_ms = v;
    }
    if parsed.system_prompt.is_some() {
        config.generator.system_prompt = parsed.system_prompt;
    }
    if let Some(v) = parsed.max_attempts {
        config.pipeline.max_attempts = v.max(1);
    }
    if let Some(v) = parsed.max_tokens {
        config.pipeline.max_tokens = v;
    }
    if let Some(temperature) = parsed.temperature {
        if let Some(v) = temperature.initial {
            config.pipeline.initial_temperature = v;
        }
        if let Some(v) = temperature.retry {
            config.pipeline.retry_temperature = v;
        }
        if let Some(v) = temperature.step {
            config.pipeline.retry_temperature_step = v;
        }
    }

    Ok(config)
}

/// Overlays `LLM_*` environment variables on top of a loaded config.
///
/// `lookup` is usually `|key| std::env::var(key).ok()`.
pub fn apply_env_overrides<F>(mut config: Config, lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("LLM_API_KEY") {
        config.generator.api_key = v;
    }
    if let Some(v) = lookup("LLM_API_URL") {
        config.generator.api_url = v;
    }
    if let Some(v) = lookup("LLM_TEXT_MODEL_ID").or_else(|| lookup("LLM_MODEL_ID")) {
        config.generator.model = v;
    }
    if let Some(v) = lookup("LLM_TIMEOUT_MS") {
        config.generator.timeout_ms = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("LLM_TIMEOUT_MS must be a number of milliseconds: {e}"))?;
    }
    if let Some(v) = lookup("LLM_MAX_ATTEMPTS") {
        let attempts: usize = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("LLM_MAX_ATTEMPTS must be a positive integer: {e}"))?;
        config.pipeline.max_attempts = attempts.max(1);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn temperature_schedule() {
        let pipeline = PipelineConfig::default();
        assert_eq!(pipeline.temperature_for_attempt(0), 0.1);
        assert!((pipeline.temperature_for_attempt(1) - 0.25).abs() < 1e-6);
        assert!((pipeline.temperature_for_attempt(2) - 0.30).abs() < 1e-6);
    }

    #[test]
    fn loads_json5_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("forge.json5");
        std::fs::write(
            &path,
            "{\n  // local gateway\n  apiUrl: 'http://localhost:8000/v1',\n  maxAttempts: 5,\n  temperature: { initial: 0.0 },\n}",
        )
        .unwrap();

        let config = load_config(Some(path.as_path())).unwrap();
        assert_eq!(config.generator.api_url, "http://localhost:8000/v1");
        assert_eq!(config.generator.model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.pipeline.max_attempts, 5);
        assert_eq!(config.pipeline.initial_temperature, 0.0);
        assert_eq!(config.pipeline.retry_temperature, 0.2);
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.pipeline.max_attempts, MAX_RETRIES);
        assert_eq!(config.generator.timeout_ms, 30_000);
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LLM_API_KEY", "secret"),
            ("LLM_MODEL_ID", "fallback-model"),
            ("LLM_TEXT_MODEL_ID", "text-model"),
            ("LLM_MAX_ATTEMPTS", "0"),
        ]);
        let config = apply_env_overrides(Config::default(), |key| {
            env.get(key).map(|v| v.to_string())
        })
        .unwrap();
        assert_eq!(config.generator.api_key, "secret");
        assert_eq!(config.generator.model, "text-model");
        assert_eq!(config.pipeline.max_attempts, 1);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result = apply_env_overrides(Config::default(), |key| {
            (key == "LLM_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
