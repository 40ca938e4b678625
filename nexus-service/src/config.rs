use anyhow::{Context as _, Result, anyhow, bail};
use std::{str::FromStr, sync::Arc, time::Duration};

use crate::analysis::{
    AnalysisBackend, GeminiBackend, OpenRouterBackend, ValidationPolicy, gemini, openrouter,
};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 120;
const DEFAULT_FAILURE_RESET_SECS: u64 = 3;
const DEFAULT_MAX_UPLOAD_MB: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    Gemini,
}

impl Provider {
    fn key_var(self) -> &'static str {
        match self {
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => openrouter::DEFAULT_MODEL,
            Self::Gemini => gemini::DEFAULT_MODEL,
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(Self::OpenRouter),
            "gemini" => Ok(Self::Gemini),
            other => Err(anyhow!("unknown provider '{other}', expected openrouter or gemini")),
        }
    }
}

/// Runtime settings of the service binary
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub port: u16,
    pub analysis_timeout: Duration,
    pub failure_reset: Duration,
    pub max_upload_bytes: usize,
    pub validation: ValidationPolicy,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match var("NEXUS_PROVIDER") {
            Some(raw) => raw.parse::<Provider>().context("invalid NEXUS_PROVIDER")?,
            None => Provider::OpenRouter,
        };
        let Some(api_key) = var(provider.key_var()) else {
            bail!("{} environment variable is required", provider.key_var());
        };
        let model = var("NEXUS_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let port = parse_or(var("PORT"), "PORT", DEFAULT_PORT)?;
        let analysis_timeout = parse_or(
            var("NEXUS_ANALYSIS_TIMEOUT_SECS"),
            "NEXUS_ANALYSIS_TIMEOUT_SECS",
            DEFAULT_ANALYSIS_TIMEOUT_SECS,
        )?;
        if analysis_timeout == 0 {
            bail!("NEXUS_ANALYSIS_TIMEOUT_SECS must be greater than zero");
        }
        let failure_reset = parse_or(
            var("NEXUS_FAILURE_RESET_SECS"),
            "NEXUS_FAILURE_RESET_SECS",
            DEFAULT_FAILURE_RESET_SECS,
        )?;
        let max_upload_mb = parse_or(
            var("NEXUS_MAX_UPLOAD_MB"),
            "NEXUS_MAX_UPLOAD_MB",
            DEFAULT_MAX_UPLOAD_MB,
        )?;
        if max_upload_mb == 0 {
            bail!("NEXUS_MAX_UPLOAD_MB must be greater than zero");
        }
        let Some(max_upload_bytes) = max_upload_mb.checked_mul(1024 * 1024) else {
            bail!("NEXUS_MAX_UPLOAD_MB is too large: {max_upload_mb}");
        };
        let validation = match var("NEXUS_VALIDATION") {
            Some(raw) => raw
                .parse::<ValidationPolicy>()
                .map_err(|e| anyhow!("invalid NEXUS_VALIDATION: {e}"))?,
            None => ValidationPolicy::default(),
        };

        Ok(Self {
            provider,
            api_key,
            model,
            port,
            analysis_timeout: Duration::from_secs(analysis_timeout),
            failure_reset: Duration::from_secs(failure_reset),
            max_upload_bytes,
            validation,
        })
    }

    /// The analysis backend for the configured provider, holding the credential
    pub fn build_backend(&self) -> Arc<dyn AnalysisBackend> {
        match self.provider {
            Provider::OpenRouter => Arc::new(OpenRouterBackend::new(&self.api_key, &self.model)),
            Provider::Gemini => Arc::new(GeminiBackend::new(&self.api_key, &self.model)),
        }
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key} '{raw}': {e}")),
        None => Ok(default),
    }
}
