//! Vocabulary configuration
//!
//! The configuration file (`idranges.toml`) declares, per vocabulary, the
//! permanent IRI part and digit width of IDs, the scheme metadata, extra
//! prefixes, the delete guard and the ID ranges handed out to contributors.
//! It is read once, validated as a whole and then wrapped per vocabulary in a
//! [`VocabContext`] that every component receives by reference.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::allocator::Allocator;
use crate::cell::parse_date;
use crate::error::ConfigError;
use crate::iri::{IdPattern, PrefixMap};

/// Default provenance URL template, a git blame view of the entity file
pub const DEFAULT_PROVENANCE_TEMPLATE: &str =
    "https://github.com/{{ github_repo }}/blame/{{ version }}/vocabularies/{{ vocab_name }}/{{ entity_id }}.ttl";

/// Root of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub single_vocab: bool,
    #[serde(default)]
    pub vocabs: IndexMap<String, VocabConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checks {
    #[serde(default)]
    pub allow_delete: bool,
}

/// Settings of one vocabulary
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabConfig {
    pub id_length: usize,
    pub permanent_iri_part: String,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub vocabulary_iri: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub default_language: String,
    #[serde(default)]
    pub created_date: Option<String>,
    /// One agent per line: "<name> <url-or-email>"
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub custodian: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub conforms_to: Option<String>,
    #[serde(default)]
    pub history_note: Option<String>,
    #[serde(default)]
    pub catalogue_pid: Option<String>,
    #[serde(default)]
    pub repository: Option<String>,
    #[serde(default)]
    pub provenance_url_template: Option<String>,
    #[serde(default)]
    pub checks: Checks,
    #[serde(default)]
    pub prefix_map: IndexMap<String, String>,
    #[serde(default)]
    pub id_range: Vec<IdRangeConfig>,
}

fn default_language() -> String {
    "en".to_string()
}

/// An ID range handed to one contributor
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdRangeConfig {
    pub first_id: u64,
    pub last_id: u64,
    #[serde(default)]
    pub gh_name: String,
    #[serde(default)]
    pub orcid: Option<String>,
    #[serde(default)]
    pub ror_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl IdRangeConfig {
    /// Human-readable owner, used in messages and the ID Ranges sheet
    pub fn owner(&self) -> String {
        if !self.gh_name.is_empty() {
            self.gh_name.clone()
        } else if let Some(orcid) = &self.orcid {
            orcid.clone()
        } else {
            self.name.clone().unwrap_or_default()
        }
    }

    /// Whether a committer identity names the owner of this range
    pub fn is_owned_by(&self, committer: &str) -> bool {
        let committer = committer.trim();
        if committer.is_empty() {
            return false;
        }
        if !self.gh_name.is_empty() && self.gh_name.eq_ignore_ascii_case(committer) {
            return true;
        }
        let bare = |id: &str| {
            id.trim_start_matches("https://orcid.org/")
                .trim_start_matches("https://ror.org/")
                .to_ascii_lowercase()
        };
        let committer = bare(committer);
        self.orcid.as_deref().map(bare) == Some(committer.clone())
            || self.ror_id.as_deref().map(bare) == Some(committer)
    }

    fn validate(&self, vocab: &str) -> Result<(), ConfigError> {
        let label = format!("id_range {}-{}", self.first_id, self.last_id);
        if self.first_id < 1 {
            return Err(ConfigError::invalid(vocab, &label, "first_id must be at least 1"));
        }
        if self.last_id <= self.first_id {
            return Err(ConfigError::invalid(
                vocab,
                &label,
                format!(
                    "last_id ({}) must be greater than first_id ({}).",
                    self.last_id, self.first_id
                ),
            ));
        }
        if self.gh_name.is_empty() && self.orcid.is_none() {
            return Err(ConfigError::invalid(
                vocab,
                &label,
                "Either a gh_name or an orcid is required.",
            ));
        }
        if !self.gh_name.is_empty() && !is_valid_gh_name(&self.gh_name) {
            return Err(ConfigError::invalid(
                vocab,
                &label,
                format!("invalid GitHub name \"{}\"", self.gh_name),
            ));
        }
        if let Some(orcid) = &self.orcid {
            normalize_orcid(orcid).map_err(|reason| ConfigError::invalid(vocab, &label, reason))?;
        }
        if let Some(ror) = &self.ror_id {
            validate_ror(ror).map_err(|reason| ConfigError::invalid(vocab, &label, reason))?;
        }
        Ok(())
    }
}

impl Config {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Read { reason, .. } => ConfigError::Read {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })?;
        debug!(
            "Loaded configuration for {} vocabularies from {}",
            config.vocabs.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Read {
            path: "<string>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every vocabulary, including the ID range overlap check
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.single_vocab && self.vocabs.len() > 1 {
            return Err(ConfigError::SingleVocab(self.vocabs.len()));
        }
        for (name, vocab) in &self.vocabs {
            vocab.validate(name)?;
            Allocator::new(vocab.id_length, vocab.id_range.clone())?;
        }
        Ok(())
    }

    /// Settings for a vocabulary, matched case-insensitively by name
    pub fn vocab(&self, name: &str) -> Option<&VocabConfig> {
        let name = name.to_lowercase();
        self.vocabs
            .iter()
            .find(|(k, _)| k.to_lowercase() == name)
            .map(|(_, v)| v)
    }
}

impl VocabConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if !(3..=18).contains(&self.id_length) {
            return Err(ConfigError::invalid(
                name,
                "id_length",
                format!("must be between 3 and 18, got {}", self.id_length),
            ));
        }
        require_http_url(name, "permanent_iri_part", &self.permanent_iri_part)?;
        require_http_url(name, "vocabulary_iri", &self.vocabulary_iri)?;
        for (field, value) in [("title", &self.title), ("description", &self.description)] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    vocab: name.to_string(),
                    field: field.to_string(),
                });
            }
        }
        if let Some(date) = &self.created_date {
            parse_date(date).map_err(|e| ConfigError::invalid(name, "created_date", e))?;
        }
        for (prefix, ns) in &self.prefix_map {
            Url::parse(ns).map_err(|e| {
                ConfigError::invalid(name, &format!("prefix_map.{}", prefix), e.to_string())
            })?;
        }
        for range in &self.id_range {
            range.validate(name)?;
        }
        Ok(())
    }

    pub fn id_pattern(&self) -> IdPattern {
        IdPattern::new(self.permanent_iri_part.clone(), self.id_length)
    }
}

fn require_http_url(vocab: &str, field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingField {
            vocab: vocab.to_string(),
            field: field.to_string(),
        });
    }
    let url = Url::parse(value).map_err(|e| ConfigError::invalid(vocab, field, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(vocab, field, "must be an http(s) URL"));
    }
    Ok(())
}

static GH_NAME: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^(?i)[a-z\d](?:-?[a-z\d])*$"));

static ORCID: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?P<id>[0-9]{4}-[0-9]{4}-[0-9]{4}-[0-9]{3}[0-9X])$"));

fn is_valid_gh_name(name: &str) -> bool {
    name.len() <= 39 && GH_NAME.as_ref().is_ok_and(|re| re.is_match(name))
}

/// Check an ORCID (bare or URL form) and return its URL form
pub fn normalize_orcid(value: &str) -> Result<String, String> {
    let re = ORCID.as_ref().map_err(|e| e.to_string())?;
    let caps = re
        .captures(value.trim())
        .ok_or_else(|| format!("\"{}\" does not match the ORCID pattern", value))?;
    let id = &caps["id"];

    let mut total: u32 = 0;
    for c in id[..id.len() - 1].chars().filter(char::is_ascii_digit) {
        total = (total + c.to_digit(10).unwrap_or(0)) * 2;
    }
    let expected = (12 - total % 11) % 11;
    let check = match id.chars().last() {
        Some('X') => 10,
        Some(c) => c.to_digit(10).unwrap_or(99),
        None => 99,
    };
    if expected != check {
        return Err(format!("invalid ORCID checksum in \"{}\"", value));
    }
    Ok(format!("https://orcid.org/{}", id))
}

/// Check a ROR identifier in URL form, including its checksum
pub fn validate_ror(value: &str) -> Result<(), String> {
    const CROCKFORD: &str = "0123456789abcdefghjkmnpqrstvwxyz";
    let id = value
        .trim()
        .strip_prefix("https://ror.org/")
        .ok_or_else(|| format!("\"{}\" is not a https://ror.org/ URL", value))?;
    if id.len() != 9 || !id.starts_with('0') {
        return Err(format!("\"{}\" does not match the ROR pattern", value));
    }
    let (body, checksum) = id.split_at(7);
    let mut decoded: u64 = 0;
    for c in body.chars() {
        let digit = CROCKFORD
            .find(c)
            .ok_or_else(|| format!("\"{}\" does not match the ROR pattern", value))?;
        decoded = decoded * 32 + digit as u64;
    }
    let expected = format!("{:02}", 98 - ((decoded * 100) % 97));
    if expected != checksum {
        return Err(format!("invalid ROR checksum in \"{}\"", value));
    }
    Ok(())
}

/// Values that may be overridden from outside the configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub version: Option<String>,
    pub committer: Option<String>,
    pub repository: Option<String>,
}

/// A source of overrides; later sources in a list win
#[derive(Debug, Clone)]
pub enum OverrideSource {
    /// `VOCSYNC_VERSION`, `VOCSYNC_COMMITTER` or `GITHUB_ACTOR`, `GITHUB_REPOSITORY`
    Environment,
    Explicit(Overrides),
}

impl Overrides {
    /// Resolve an ordered list of sources into one set of overrides.
    ///
    /// Called once at the process boundary; nothing below reads the
    /// environment.
    pub fn resolve(sources: &[OverrideSource]) -> Self {
        let mut resolved = Overrides::default();
        for source in sources {
            let layer = match source {
                OverrideSource::Environment => Self::from_env(),
                OverrideSource::Explicit(values) => values.clone(),
            };
            resolved.merge(layer);
        }
        resolved
    }

    fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Overrides {
            version: var("VOCSYNC_VERSION"),
            committer: var("VOCSYNC_COMMITTER").or_else(|| var("GITHUB_ACTOR")),
            repository: var("GITHUB_REPOSITORY"),
        }
    }

    fn merge(&mut self, other: Overrides) {
        if other.version.is_some() {
            self.version = other.version;
        }
        if other.committer.is_some() {
            self.committer = other.committer;
        }
        if other.repository.is_some() {
            self.repository = other.repository;
        }
    }
}

/// Everything a component needs to know about one vocabulary
#[derive(Debug, Clone)]
pub struct VocabContext {
    pub name: String,
    pub vocab: Option<VocabConfig>,
    pub prefixes: PrefixMap,
    pub id_pattern: Option<IdPattern>,
    pub allocator: Allocator,
    pub overrides: Overrides,
    /// IDs already present before this change; only IDs outside this set are
    /// checked against the committer
    pub baseline_ids: Option<BTreeSet<u64>>,
}

impl VocabContext {
    pub fn new(name: &str, config: &Config, overrides: Overrides) -> Result<Self, ConfigError> {
        let vocab = config.vocab(name).cloned();
        if vocab.is_none() {
            warn!(
                "No configuration found for vocabulary \"{}\", ID checks are disabled",
                name
            );
        }
        Self::from_parts(name, vocab, overrides)
    }

    /// Context for a vocabulary without configuration
    pub fn unconfigured(name: &str) -> Self {
        VocabContext {
            name: name.to_string(),
            vocab: None,
            prefixes: PrefixMap::well_known(),
            id_pattern: None,
            allocator: Allocator::empty(0),
            overrides: Overrides::default(),
            baseline_ids: None,
        }
    }

    pub fn from_parts(
        name: &str,
        vocab: Option<VocabConfig>,
        overrides: Overrides,
    ) -> Result<Self, ConfigError> {
        let Some(vocab) = vocab else {
            let mut ctx = Self::unconfigured(name);
            ctx.overrides = overrides;
            return Ok(ctx);
        };

        let mut prefixes = PrefixMap::well_known();
        for (prefix, ns) in &vocab.prefix_map {
            prefixes.insert(prefix.clone(), ns.clone());
        }
        let vocab_prefix = vocab.prefix.clone().unwrap_or_else(|| name.to_lowercase());
        prefixes.insert(vocab_prefix, vocab.permanent_iri_part.clone());

        let allocator = Allocator::new(vocab.id_length, vocab.id_range.clone())?;
        Ok(VocabContext {
            name: name.to_string(),
            id_pattern: Some(vocab.id_pattern()),
            vocab: Some(vocab),
            prefixes,
            allocator,
            overrides,
            baseline_ids: None,
        })
    }

    pub fn with_baseline(mut self, ids: BTreeSet<u64>) -> Self {
        self.baseline_ids = Some(ids);
        self
    }

    pub fn default_language(&self) -> &str {
        self.vocab
            .as_ref()
            .map(|v| v.default_language.as_str())
            .unwrap_or("en")
    }

    pub fn allow_delete(&self) -> bool {
        self.vocab.as_ref().is_some_and(|v| v.checks.allow_delete)
    }

    /// Repository as "owner/name", from the override or the configured URL
    pub fn repository(&self) -> Option<String> {
        if let Some(repo) = &self.overrides.repository {
            return Some(repo.clone());
        }
        let url = self.vocab.as_ref()?.repository.as_deref()?;
        let parsed = Url::parse(url).ok()?;
        let path = parsed.path().trim_matches('/').trim_end_matches(".git");
        (!path.is_empty()).then(|| path.to_string())
    }

    /// Version used in provenance URLs; branch-like versions map to "main"
    pub fn provenance_version(&self) -> String {
        match self.overrides.version.as_deref() {
            Some(v) if !v.starts_with("v_") => v.to_string(),
            _ => "main".to_string(),
        }
    }

    pub fn provenance_template(&self) -> &str {
        self.vocab
            .as_ref()
            .and_then(|v| v.provenance_url_template.as_deref())
            .unwrap_or(DEFAULT_PROVENANCE_TEMPLATE)
    }
}
