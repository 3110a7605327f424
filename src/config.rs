use crate::analyzer::categorizer::CategoryRules;
use crate::analyzer::duration::parse_duration_label;
use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveTime;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".WorkTrace";
const CONFIG_FILE: &str = "config.json";
const CATEGORIES_FILE: &str = "categories.json";
const DEFAULT_ROLLUP_TIME: &str = "23:30";
const DEFAULT_DAILY_TARGET: &str = "8hrs";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rollup_time: String,
    pub report_dir: PathBuf,
    pub categories_path: PathBuf,
    pub db_path: PathBuf,
    pub api_port: u16,
    pub retention_days: u32,
    pub default_category: String,
    pub time_bar_bucket_minutes: u32,
    pub daily_target: String,
    pub feed_limit: usize,
    pub top_websites_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let root = default_root_dir();

        Self {
            rollup_time: DEFAULT_ROLLUP_TIME.to_string(),
            report_dir: default_report_dir(),
            categories_path: root.join(CATEGORIES_FILE),
            db_path: root.join("db").join("worktrace.db"),
            api_port: 7891,
            retention_days: 180,
            default_category: "other".to_string(),
            time_bar_bucket_minutes: 60,
            daily_target: DEFAULT_DAILY_TARGET.to_string(),
            feed_limit: 50,
            top_websites_limit: 10,
        }
    }
}

impl Config {
    /// Config rooted in `root` instead of the home directory.
    pub fn with_root(root: &Path) -> Self {
        Self {
            report_dir: root.join("reports"),
            categories_path: root.join(CATEGORIES_FILE),
            db_path: root.join("db").join("worktrace.db"),
            ..Self::default()
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        fs::create_dir_all(&self.report_dir).with_context(|| {
            format!(
                "Failed to create report directory: {}",
                self.report_dir.display()
            )
        })?;

        if !self.categories_path.exists() {
            if let Some(parent) = self.categories_path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create categories directory: {}", parent.display())
                })?;
            }

            fs::write(&self.categories_path, CategoryRules::DEFAULT_JSON).with_context(|| {
                format!(
                    "Failed to create default categories file: {}",
                    self.categories_path.display()
                )
            })?;
            set_mode_600(&self.categories_path)?;
        }

        Ok(())
    }

    pub fn parse_rollup_time(&self) -> Result<NaiveTime> {
        parse_hhmm(&self.rollup_time)
    }

    pub fn daily_target_seconds(&self) -> Result<u64> {
        parse_duration_label(&self.daily_target)
            .with_context(|| format!("Invalid daily_target setting: {}", self.daily_target))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let normalized = normalize_config_key(key);

        match normalized {
            "rollup_time" => {
                parse_hhmm(value)?;
                self.rollup_time = value.to_string();
            }
            "report_dir" => {
                self.report_dir = expand_home(value);
            }
            "categories_path" => {
                self.categories_path = expand_home(value);
            }
            "db_path" => {
                self.db_path = expand_home(value);
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "retention_days" => {
                self.retention_days = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("retention_days must be a number"))?;
            }
            "default_category" => {
                self.default_category = CategoryRules::normalize_category(value);
            }
            "time_bar_bucket_minutes" => {
                let minutes = value
                    .parse::<u32>()
                    .map_err(|_| anyhow!("time_bar_bucket_minutes must be a number"))?;
                if minutes == 0 || 24 * 60 % minutes != 0 {
                    bail!("time_bar_bucket_minutes must divide a day evenly (e.g. 15, 30, 60)");
                }
                self.time_bar_bucket_minutes = minutes;
            }
            "daily_target" => {
                parse_duration_label(value)?;
                self.daily_target = value.trim().to_string();
            }
            "feed_limit" => {
                self.feed_limit = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("feed_limit must be a number"))?
                    .clamp(1, 500);
            }
            "top_websites_limit" => {
                self.top_websites_limit = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("top_websites_limit must be a number"))?
                    .clamp(1, 50);
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: rollup_time|rollup.time, report_dir|report.dir, categories_path|categories.path, db_path|db.path, api_port|api.port, retention_days|retention.days, default_category|categories.default, time_bar_bucket_minutes|time_bar.bucket_minutes, daily_target|weekly.daily_target, feed_limit|feed.limit, top_websites_limit|websites.limit"
                );
            }
        }

        if normalized == "report_dir" {
            fs::create_dir_all(&self.report_dir).with_context(|| {
                format!(
                    "Failed to create report directory: {}",
                    self.report_dir.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "rollup_time" => Some(self.rollup_time.clone()),
            "report_dir" => Some(self.report_dir.display().to_string()),
            "categories_path" => Some(self.categories_path.display().to_string()),
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "retention_days" => Some(self.retention_days.to_string()),
            "default_category" => Some(self.default_category.clone()),
            "time_bar_bucket_minutes" => Some(self.time_bar_bucket_minutes.to_string()),
            "daily_target" => Some(self.daily_target.clone()),
            "feed_limit" => Some(self.feed_limit.to_string()),
            "top_websites_limit" => Some(self.top_websites_limit.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "rollup_time" | "rollup.time" => "rollup_time",
        "report_dir" | "report.dir" => "report_dir",
        "categories_path" | "categories.path" => "categories_path",
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "retention_days" | "retention.days" => "retention_days",
        "default_category" | "categories.default" => "default_category",
        "time_bar_bucket_minutes" | "time_bar.bucket_minutes" => "time_bar_bucket_minutes",
        "daily_target" | "weekly.daily_target" => "daily_target",
        "feed_limit" | "feed.limit" => "feed_limit",
        "top_websites_limit" | "websites.limit" => "top_websites_limit",
        _ => key,
    }
}

pub fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .with_context(|| format!("Invalid time format: {value}. Example: 23:30 (24-hour format)",))
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

pub fn default_report_dir() -> PathBuf {
    default_root_dir().join("reports")
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn dotted_aliases_resolve_to_the_same_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::with_root(dir.path());

        config.set_value("api.port", "9000").expect("set api.port");
        assert_eq!(config.api_port, 9000);
        assert_eq!(config.get_value("api_port").as_deref(), Some("9000"));
    }

    #[test]
    fn rejects_bucket_width_that_does_not_divide_a_day() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::with_root(dir.path());

        assert!(config.set_value("time_bar_bucket_minutes", "7").is_err());
        assert!(config.set_value("time_bar_bucket_minutes", "0").is_err());
        config
            .set_value("time_bar_bucket_minutes", "30")
            .expect("30 minute buckets");
        assert_eq!(config.time_bar_bucket_minutes, 30);
    }

    #[test]
    fn daily_target_accepts_legacy_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = Config::with_root(dir.path());

        config.set_value("daily_target", "8.5hrs").expect("8.5hrs");
        assert_eq!(config.daily_target_seconds().expect("seconds"), 30_600);
        assert!(config.set_value("daily_target", "lots").is_err());
    }

    #[test]
    fn bootstrap_writes_default_categories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::with_root(dir.path());

        config.ensure_bootstrap_files().expect("bootstrap");
        assert!(config.categories_path.exists());
        assert!(config.report_dir.exists());
    }

    #[test]
    fn saved_config_loads_back_with_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let mut config = Config::with_root(dir.path());
        config.set_value("rollup.time", "21:45").expect("rollup time");

        config.save_to(&path).expect("save");
        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.rollup_time, "21:45");
        assert_eq!(loaded.db_path, config.db_path);

        std::fs::write(&path, r#"{"api_port": 8080}"#).expect("write partial");
        let partial = Config::load_from(&path).expect("partial");
        assert_eq!(partial.api_port, 8080);
        assert_eq!(partial.feed_limit, 50);
    }
}
