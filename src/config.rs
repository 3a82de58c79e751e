use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub path: Option<PathBuf>,
    pub config: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.matcher.validate()?;

        let mut seen = BTreeSet::new();
        for site in &self.sites {
            if site.key.trim().is_empty() {
                bail!("site.key must not be empty");
            }
            if site.name.trim().is_empty() {
                bail!("site.name must not be empty for site {}", site.key);
            }
            if !seen.insert(site.key.as_str()) {
                bail!("duplicate site key {}", site.key);
            }
        }

        Ok(())
    }

    pub fn site(&self, key: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.key == key)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=100.0).contains(&self.threshold) {
            bail!(
                "matcher.threshold must lie in 0..=100, got {}",
                self.threshold
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub key: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub brand: Option<String>,
}

/// Loads and validates a pipeline config. `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = path else {
        return Ok(LoadedConfig {
            path: None,
            config: PipelineConfig::default(),
        });
    };

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pipeline config: {}", path.display()))?;
    let config: PipelineConfig = toml::from_str(&text)
        .with_context(|| format!("failed to parse toml in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid pipeline config {}", path.display()))?;

    Ok(LoadedConfig {
        path: Some(path.to_path_buf()),
        config,
    })
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    85.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sites_and_threshold() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [matcher]
            threshold = 90.0

            [[site]]
            key = "prist"
            name = "Прист"

            [[site]]
            key = "keysight"
            name = "Keysight Technologies"
            enabled = false
            brand = "Keysight"
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.matcher.threshold, 90.0);
        assert_eq!(config.sites.len(), 2);
        assert!(config.site("prist").unwrap().enabled);
        assert_eq!(config.site("keysight").unwrap().brand.as_deref(), Some("Keysight"));
    }

    #[test]
    fn defaults_apply_to_empty_document() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config.matcher.threshold, 85.0);
        assert!(config.sites.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = PipelineConfig {
            matcher: MatcherConfig { threshold: 120.0 },
            sites: Vec::new(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_site_keys() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [[site]]
            key = "prist"
            name = "A"

            [[site]]
            key = "prist"
            name = "B"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
