use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductivityStatus {
    Productive,
    Neutral,
    NonProductive,
    Away,
}

impl ProductivityStatus {
    pub const ALL: [ProductivityStatus; 4] = [
        ProductivityStatus::Productive,
        ProductivityStatus::Neutral,
        ProductivityStatus::NonProductive,
        ProductivityStatus::Away,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductivityStatus::Productive => "productive",
            ProductivityStatus::Neutral => "neutral",
            ProductivityStatus::NonProductive => "non-productive",
            ProductivityStatus::Away => "away",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProductivityStatus::Productive => "Productive",
            ProductivityStatus::Neutral => "Neutral",
            ProductivityStatus::NonProductive => "Non-productive",
            ProductivityStatus::Away => "Away",
        }
    }
}

impl fmt::Display for ProductivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductivityStatus {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "productive" => Ok(Self::Productive),
            "neutral" => Ok(Self::Neutral),
            "non-productive" | "non_productive" | "nonproductive" => Ok(Self::NonProductive),
            "away" | "idle" => Ok(Self::Away),
            other => bail!("Unknown productivity status: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRules {
    pub apps: HashMap<String, String>,
    pub domains: HashMap<String, String>,
    #[serde(default)]
    pub productivity: HashMap<String, String>,
}

impl CategoryRules {
    pub const DEFAULT_JSON: &'static str = include_str!("../../assets/categories.json");

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read categories file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse categories file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let parsed: Self = serde_json::from_str(content)?;
        parsed.validate()?;

        Ok(parsed.normalized())
    }

    pub fn canonical_categories() -> [&'static str; 7] {
        [
            "development",
            "research",
            "communication",
            "entertainment",
            "sns",
            "shopping",
            "other",
        ]
    }

    pub fn normalize_category(raw: &str) -> String {
        match raw.trim().to_lowercase().as_str() {
            "development" | "dev" => "development".to_string(),
            "communication" => "communication".to_string(),
            "research" => "research".to_string(),
            "entertainment" => "entertainment".to_string(),
            "sns" | "social" => "sns".to_string(),
            "shopping" => "shopping".to_string(),
            _ => "other".to_string(),
        }
    }

    pub fn categorize_app(&self, app_name: &str) -> Option<String> {
        let normalized = app_name.trim().to_lowercase();

        self.apps.get(&normalized).cloned().or_else(|| {
            let mut candidates = self
                .apps
                .iter()
                .filter(|(key, _)| normalized.contains(key.as_str()))
                .collect::<Vec<_>>();
            // Longest key first so "microsoft teams" beats "teams".
            candidates.sort_by(|left, right| {
                right
                    .0
                    .len()
                    .cmp(&left.0.len())
                    .then_with(|| left.0.cmp(right.0))
            });
            candidates.first().map(|(_, value)| (*value).clone())
        })
    }

    pub fn categorize_domain(&self, domain: &str) -> String {
        let normalized = normalize_domain(domain);

        let mut candidates = self
            .domains
            .iter()
            .filter(|(rule, _)| domain_matches(&normalized, rule))
            .collect::<Vec<_>>();
        candidates.sort_by(|left, right| right.0.len().cmp(&left.0.len()));

        candidates
            .first()
            .map(|(_, value)| (*value).clone())
            .unwrap_or_else(|| "other".to_string())
    }

    pub fn status_for_category(&self, category: &str) -> ProductivityStatus {
        self.productivity
            .get(&Self::normalize_category(category))
            .and_then(|raw| raw.parse::<ProductivityStatus>().ok())
            .filter(|status| *status != ProductivityStatus::Away)
            .unwrap_or(ProductivityStatus::Neutral)
    }

    fn validate(&self) -> Result<()> {
        self.productivity.iter().try_for_each(|(category, raw)| {
            let status = raw
                .parse::<ProductivityStatus>()
                .with_context(|| format!("Invalid productivity status for {category}"))?;
            if status == ProductivityStatus::Away {
                bail!("Category {category} cannot be mapped to away");
            }
            Ok(())
        })
    }

    fn normalized(self) -> Self {
        let apps = self
            .apps
            .into_iter()
            .map(|(key, value)| (key.trim().to_lowercase(), Self::normalize_category(&value)))
            .collect::<HashMap<_, _>>();

        let domains = self
            .domains
            .into_iter()
            .map(|(key, value)| (normalize_domain(&key), Self::normalize_category(&value)))
            .collect::<HashMap<_, _>>();

        let productivity = self
            .productivity
            .into_iter()
            .map(|(key, value)| (Self::normalize_category(&key), value.trim().to_lowercase()))
            .collect::<HashMap<_, _>>();

        Self {
            apps,
            domains,
            productivity,
        }
    }
}

pub fn normalize_domain(raw: &str) -> String {
    raw.trim()
        .trim_end_matches('.')
        .to_lowercase()
        .trim_start_matches("www.")
        .to_string()
}

fn domain_matches(domain: &str, rule: &str) -> bool {
    domain == rule || domain.ends_with(&format!(".{rule}"))
}

#[cfg(test)]
mod tests {
    use super::{CategoryRules, ProductivityStatus};
    use std::collections::HashMap;

    fn rules() -> CategoryRules {
        CategoryRules::parse(CategoryRules::DEFAULT_JSON).expect("default rules")
    }

    #[test]
    fn categorize_domain_with_subdomain() {
        let rules = CategoryRules {
            apps: HashMap::new(),
            domains: HashMap::from([("github.com".to_string(), "development".to_string())]),
            productivity: HashMap::new(),
        };

        assert_eq!(rules.categorize_domain("docs.github.com"), "development");
        assert_eq!(rules.categorize_domain("WWW.GitHub.com"), "development");
        assert_eq!(rules.categorize_domain("notgithub.com"), "other");
    }

    #[test]
    fn categorize_app_prefers_exact_then_longest_substring() {
        let rules = rules();

        assert_eq!(rules.categorize_app("Code").as_deref(), Some("development"));
        assert_eq!(
            rules.categorize_app("Slack - workspace").as_deref(),
            Some("communication")
        );
        assert_eq!(rules.categorize_app("hrmware_v2"), None);
    }

    #[test]
    fn status_defaults_to_neutral() {
        let rules = rules();

        assert_eq!(
            rules.status_for_category("development"),
            ProductivityStatus::Productive
        );
        assert_eq!(
            rules.status_for_category("sns"),
            ProductivityStatus::NonProductive
        );
        assert_eq!(
            rules.status_for_category("unheard-of"),
            ProductivityStatus::Neutral
        );
    }

    #[test]
    fn rejects_away_as_category_status() {
        let raw = r#"{"apps":{},"domains":{},"productivity":{"other":"away"}}"#;
        assert!(CategoryRules::parse(raw).is_err());

        let raw = r#"{"apps":{},"domains":{},"productivity":{"other":"busy"}}"#;
        assert!(CategoryRules::parse(raw).is_err());
    }

    #[test]
    fn status_strings_accept_aliases() {
        assert_eq!(
            "non_productive".parse::<ProductivityStatus>().expect("alias"),
            ProductivityStatus::NonProductive
        );
        assert_eq!(
            serde_json::to_value(ProductivityStatus::NonProductive).expect("json"),
            "non-productive"
        );
    }
}
