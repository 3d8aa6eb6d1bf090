use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use moodreel_catalog::CatalogConfig;
use serde::{Deserialize, Serialize};

use crate::genre::{default_genres, default_mood_rules, GenreEntry, GenreTable, MoodResolver, MoodRule};

pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

fn default_connector_id() -> String {
    "tg_main".to_string()
}

fn default_acceptance_token() -> String {
    "accept".to_string()
}

fn default_session_idle_secs() -> i64 {
    24 * 60 * 60
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_connector_id")]
    pub connector_id: String,
    #[serde(default)]
    pub token: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            connector_id: default_connector_id(),
            token: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Substring (case-insensitive) that accepts the terms of use
    #[serde(default = "default_acceptance_token")]
    pub acceptance_token: String,
    /// Evaluated in order; first keyword found wins
    #[serde(default = "default_mood_rules")]
    pub mood_rules: Vec<MoodRule>,
    #[serde(default = "default_genres")]
    pub genres: Vec<GenreEntry>,
    /// Sessions idle this long are dropped; the user starts over with /start
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: i64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            acceptance_token: default_acceptance_token(),
            mood_rules: default_mood_rules(),
            genres: default_genres(),
            session_idle_secs: default_session_idle_secs(),
        }
    }
}

impl ConversationConfig {
    pub fn resolver(&self) -> MoodResolver {
        MoodResolver::new(self.mood_rules.clone(), GenreTable::new(self.genres.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodreelConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Expand `${VAR}` placeholders from the process environment. Unset
/// variables expand to the empty string.
pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

/// Load `path` if it exists, otherwise start from defaults. Secrets left
/// empty by the file are taken from `TELEGRAM_BOT_TOKEN` / `TMDB_API_KEY`.
pub fn load_config(path: &Path) -> Result<MoodreelConfig> {
    let mut config = if path.exists() {
        read_yaml_file(path)?
    } else {
        tracing::debug!("config file {} not found, using defaults", path.display());
        MoodreelConfig::default()
    };

    resolve_config_env(&mut config);
    apply_env_fallback(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

fn read_yaml_file(path: &Path) -> Result<MoodreelConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_config_env(config: &mut MoodreelConfig) {
    config.telegram.token = resolve_env_var(&config.telegram.token);
    config.catalog.api_key = resolve_env_var(&config.catalog.api_key);
    config.catalog.base_url = resolve_env_var(&config.catalog.base_url);
    config.catalog.image_base_url = resolve_env_var(&config.catalog.image_base_url);
}

fn apply_env_fallback(config: &mut MoodreelConfig, lookup: impl Fn(&str) -> Option<String>) {
    if config.telegram.token.trim().is_empty() {
        if let Some(token) = lookup(TELEGRAM_TOKEN_ENV) {
            config.telegram.token = token;
        }
    }
    if config.catalog.api_key.trim().is_empty() {
        if let Some(key) = lookup(TMDB_API_KEY_ENV) {
            config.catalog.api_key = key;
        }
    }
}

/// Checks everything needed to answer recommendations. The Telegram token
/// is checked separately by [`require_telegram_token`] since the local
/// commands run without it.
pub fn validate_config(config: &MoodreelConfig) -> Result<()> {
    if config.catalog.api_key.trim().is_empty() {
        return Err(anyhow!(
            "catalog api_key is empty (set {TMDB_API_KEY_ENV} or catalog.api_key)"
        ));
    }
    if config.catalog.timeout_secs == 0 {
        return Err(anyhow!("catalog.timeout_secs must be greater than zero"));
    }

    let conversation = &config.conversation;
    if conversation.acceptance_token.trim().is_empty() {
        return Err(anyhow!("conversation.acceptance_token is empty"));
    }
    if conversation.session_idle_secs <= 0 {
        return Err(anyhow!("conversation.session_idle_secs must be greater than zero"));
    }

    let mut genres = HashSet::new();
    for genre in &conversation.genres {
        if !genres.insert(genre.name.to_lowercase()) {
            return Err(anyhow!("duplicate genre: {}", genre.name));
        }
    }

    let mut keywords = HashSet::new();
    for rule in &conversation.mood_rules {
        let keyword = rule.keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Err(anyhow!("mood rule for genre {} has an empty keyword", rule.genre));
        }
        if !keywords.insert(keyword) {
            return Err(anyhow!("duplicate mood keyword: {}", rule.keyword));
        }
        if !genres.contains(&rule.genre.to_lowercase()) {
            tracing::warn!(
                keyword = %rule.keyword,
                genre = %rule.genre,
                "mood rule points at a genre missing from the genre table"
            );
        }
    }

    Ok(())
}

pub fn require_telegram_token(config: &MoodreelConfig) -> Result<&str> {
    let token = config.telegram.token.trim();
    if token.is_empty() {
        return Err(anyhow!(
            "telegram token is empty (set {TELEGRAM_TOKEN_ENV} or telegram.token)"
        ));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn fixture_config_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/main.yaml")
    }

    fn valid() -> MoodreelConfig {
        let mut config = MoodreelConfig::default();
        config.catalog.api_key = "k".into();
        config
    }

    #[test]
    fn workspace_fixture_parses() {
        let config = read_yaml_file(&fixture_config_path()).unwrap();
        assert_eq!(config.telegram.connector_id, "tg_main");
        assert_eq!(config.telegram.token, "${TELEGRAM_BOT_TOKEN}");
        assert_eq!(config.conversation.mood_rules, default_mood_rules());
        assert_eq!(config.conversation.genres, default_genres());
    }

    #[test]
    fn load_config_reads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "catalog:\n  api_key: from-file\n  locale: pt-BR\nconversation:\n  acceptance_token: aceito\n  mood_rules:\n    - keyword: triste\n      genre: romance\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.catalog.api_key, "from-file");
        assert_eq!(config.catalog.locale, "pt-BR");
        assert_eq!(config.catalog.timeout_secs, 10);
        assert_eq!(config.conversation.acceptance_token, "aceito");
        assert_eq!(config.conversation.mood_rules, vec![MoodRule::new("triste", "romance")]);
        assert_eq!(config.conversation.genres, default_genres());
        assert_eq!(config.conversation.session_idle_secs, 86_400);
        validate_config(&config).unwrap();
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.conversation.acceptance_token, "accept");
        assert_eq!(config.logging.dir, PathBuf::from("logs"));
    }

    #[test]
    fn load_config_reports_bad_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "catalog: [not, a, map]").unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }

    #[test]
    fn env_fallback_fills_only_empty_secrets() {
        let mut config = MoodreelConfig::default();
        config.catalog.api_key = "from-file".into();
        apply_env_fallback(&mut config, |key| Some(format!("env:{key}")));
        assert_eq!(config.telegram.token, "env:TELEGRAM_BOT_TOKEN");
        assert_eq!(config.catalog.api_key, "from-file");
    }

    #[test]
    fn env_fallback_leaves_empty_when_unset() {
        let mut config = MoodreelConfig::default();
        apply_env_fallback(&mut config, |_| None);
        assert!(config.telegram.token.is_empty());
        assert!(require_telegram_token(&config).is_err());
    }

    #[test]
    fn resolve_env_var_replaces_env_placeholder() {
        let expected = std::env::var("PATH").unwrap();
        assert_eq!(resolve_env_var("${PATH}"), expected);
    }

    #[test]
    fn resolve_env_var_unclosed_bracket() {
        assert_eq!(resolve_env_var("prefix_${UNCLOSED"), "prefix_${UNCLOSED");
    }

    #[test]
    fn resolve_env_var_missing_env_returns_empty() {
        assert_eq!(resolve_env_var("val=${MOODREEL_NONEXISTENT_VAR_XYZ}"), "val=");
    }

    #[test]
    fn validate_requires_api_key() {
        let err = validate_config(&MoodreelConfig::default()).unwrap_err();
        assert!(err.to_string().contains("api_key is empty"));
        validate_config(&valid()).unwrap();
    }

    #[test]
    fn validate_rejects_duplicate_keyword() {
        let mut config = valid();
        config.conversation.mood_rules.push(MoodRule::new("SAD", "drama"));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate mood keyword"));
    }

    #[test]
    fn validate_rejects_empty_keyword_and_token() {
        let mut config = valid();
        config.conversation.mood_rules.push(MoodRule::new(" ", "drama"));
        assert!(validate_config(&config).is_err());

        let mut config = valid();
        config.conversation.acceptance_token = "  ".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn validate_rejects_non_positive_idle_window() {
        let mut config = valid();
        config.conversation.session_idle_secs = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("session_idle_secs"));
    }

    #[test]
    fn validate_rejects_duplicate_genre() {
        let mut config = valid();
        config.conversation.genres.push(GenreEntry::new("Action", 99));
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate genre"));
    }

    #[test]
    fn validate_allows_rule_with_unknown_genre() {
        let mut config = valid();
        config.conversation.mood_rules.push(MoodRule::new("curious", "documentary"));
        validate_config(&config).unwrap();
    }

    #[test]
    fn resolver_uses_configured_rules() {
        let mut config = valid();
        config.conversation.mood_rules = vec![MoodRule::new("triste", "romance")];
        let resolver = config.conversation.resolver();
        assert_eq!(resolver.rules().len(), 1);
        assert_eq!(resolver.table().id_of("romance"), Some(10749));
    }
}
