//! Orchestrator configuration (`noface.toml`-shaped key-value file).
//!
//! The wire format is a small section/key-value text format, not TOML (see
//! module-level parser below), so it is parsed by hand rather than via
//! `serde`. The resulting typed [`Config`] mirrors the same "every field has
//! a default, missing file means all defaults" discipline used elsewhere in
//! this codebase.

use std::fmt;
use std::path::{Path, PathBuf};

/// Top-level orchestrator configuration.
///
/// Parsed from a key-value file with `[section]` headers. Missing file →
/// full defaults (not an error). Unknown keys are ignored (with a
/// `tracing::warn!`); malformed values fall back to the field default and
/// also warn.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub project: ProjectConfig,
    pub agents: AgentsConfig,
    pub passes: PassesConfig,
    pub tracker: TrackerConfig,
    pub sync: SyncConfig,
    pub monowiki: MonowikiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            agents: AgentsConfig::default(),
            passes: PassesConfig::default(),
            tracker: TrackerConfig::default(),
            sync: SyncConfig::default(),
            monowiki: MonowikiConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectConfig {
    pub name: String,
    pub build: Option<String>,
    pub test: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "project".to_owned(),
            build: None,
            test: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentsConfig {
    pub implementer: String,
    pub reviewer: String,
    pub timeout_seconds: u32,
    pub num_workers: u8,
    pub verbose: bool,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            implementer: "claude".to_owned(),
            reviewer: "claude".to_owned(),
            timeout_seconds: 900,
            num_workers: 1,
            verbose: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannerMode {
    Interval,
    EventDriven,
}

impl Default for PlannerMode {
    fn default() -> Self {
        Self::Interval
    }
}

impl fmt::Display for PlannerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval => write!(f, "interval"),
            Self::EventDriven => write!(f, "event_driven"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PassesConfig {
    pub planner_enabled: bool,
    pub planner_interval: u32,
    pub planner_mode: PlannerMode,
    pub quality_enabled: bool,
    pub quality_interval: u32,
}

impl Default for PassesConfig {
    fn default() -> Self {
        Self {
            planner_enabled: true,
            planner_interval: 5,
            planner_mode: PlannerMode::Interval,
            quality_enabled: false,
            quality_interval: 10,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerKind {
    Beads,
    Github,
}

impl Default for TrackerKind {
    fn default() -> Self {
        Self::Beads
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackerConfig {
    pub kind: TrackerKind,
    pub sync_to_github: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            kind: TrackerKind::default(),
            sync_to_github: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncConfig {
    pub provider: Option<String>,
    pub api_url: Option<String>,
    pub repo: Option<String>,
    pub token: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonowikiConfig {
    pub vault: Option<String>,
    pub proactive_search: bool,
    pub resolve_wikilinks: bool,
    pub expand_neighbors: bool,
    pub neighbor_depth: u8,
    pub api_docs_slug: Option<String>,
    pub sync_api_docs: bool,
    pub max_context_docs: u8,
    pub max_file_size_kb: u32,
}

impl Default for MonowikiConfig {
    fn default() -> Self {
        Self {
            vault: None,
            proactive_search: false,
            resolve_wikilinks: true,
            expand_neighbors: false,
            neighbor_depth: 1,
            api_docs_slug: None,
            sync_api_docs: false,
            max_context_docs: 10,
            max_file_size_kb: 256,
        }
    }
}

/// A config error with the offending file path, used to build
/// [`crate::error::OrchestratorError::ConfigError`] at the boundary.
#[derive(Debug)]
pub struct ConfigError {
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Config {
    /// Load configuration from `path`. A missing file yields full defaults,
    /// which is not an error condition.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(ConfigError {
                    path: Some(path.to_path_buf()),
                    message: err.to_string(),
                })
            }
        };
        Ok(Self::parse(&text))
    }

    /// Parse configuration text directly (used by [`Self::load`] and by
    /// tests that don't want to touch the filesystem).
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let sections = parse_sections(text);
        let mut config = Self::default();

        if let Some(kv) = sections.get("project") {
            if let Some(v) = kv.get("name") {
                config.project.name = v.clone();
            }
            config.project.build = kv.get("build").cloned();
            config.project.test = kv.get("test").cloned();
        }

        if let Some(kv) = sections.get("agents") {
            if let Some(v) = kv.get("implementer") {
                config.agents.implementer = v.clone();
            }
            if let Some(v) = kv.get("reviewer") {
                config.agents.reviewer = v.clone();
            }
            set_u32(kv, "timeout_seconds", &mut config.agents.timeout_seconds);
            if let Some(raw) = kv.get("num_workers") {
                match raw.parse::<u8>() {
                    Ok(n) if (1..=crate::ids::MAX_WORKERS).contains(&n) => {
                        config.agents.num_workers = n;
                    }
                    _ => tracing::warn!(
                        value = raw.as_str(),
                        "agents.num_workers must be 1-{}, using default",
                        crate::ids::MAX_WORKERS
                    ),
                }
            }
            set_bool(kv, "verbose", &mut config.agents.verbose);
        }

        if let Some(kv) = sections.get("passes") {
            apply_passes(kv, "planner", &mut config.passes);
            apply_passes(kv, "scrum", &mut config.passes);
            set_bool(kv, "quality_enabled", &mut config.passes.quality_enabled);
            set_u32(kv, "quality_interval", &mut config.passes.quality_interval);
        }

        if let Some(kv) = sections.get("tracker") {
            if let Some(raw) = kv.get("type") {
                match raw.as_str() {
                    "beads" => config.tracker.kind = TrackerKind::Beads,
                    "github" => config.tracker.kind = TrackerKind::Github,
                    other => tracing::warn!(value = other, "unknown tracker.type, using default"),
                }
            }
            set_bool(kv, "sync_to_github", &mut config.tracker.sync_to_github);
        }

        if let Some(kv) = sections.get("sync") {
            config.sync.provider = kv.get("provider").cloned();
            config.sync.api_url = kv.get("api_url").cloned();
            config.sync.repo = kv.get("repo").cloned();
            config.sync.token = kv.get("token").cloned();
        }

        if let Some(kv) = sections.get("monowiki") {
            config.monowiki.vault = kv.get("vault").cloned();
            set_bool(
                kv,
                "proactive_search",
                &mut config.monowiki.proactive_search,
            );
            set_bool(
                kv,
                "resolve_wikilinks",
                &mut config.monowiki.resolve_wikilinks,
            );
            set_bool(
                kv,
                "expand_neighbors",
                &mut config.monowiki.expand_neighbors,
            );
            set_u8(kv, "neighbor_depth", &mut config.monowiki.neighbor_depth);
            config.monowiki.api_docs_slug = kv.get("api_docs_slug").cloned();
            set_bool(kv, "sync_api_docs", &mut config.monowiki.sync_api_docs);
            set_u8(kv, "max_context_docs", &mut config.monowiki.max_context_docs);
            set_u32(
                kv,
                "max_file_size_kb",
                &mut config.monowiki.max_file_size_kb,
            );
        }

        config
    }
}

fn apply_passes(
    kv: &std::collections::BTreeMap<String, String>,
    prefix: &str,
    passes: &mut PassesConfig,
) {
    if let Some(v) = kv.get(&format!("{prefix}_enabled")) {
        if let Some(b) = parse_bool(v) {
            passes.planner_enabled = b;
        }
    }
    if let Some(v) = kv.get(&format!("{prefix}_interval")) {
        if let Ok(n) = v.parse::<u32>() {
            if n > 0 {
                passes.planner_interval = n;
            }
        }
    }
    if let Some(v) = kv.get(&format!("{prefix}_mode")) {
        match v.as_str() {
            "interval" => passes.planner_mode = PlannerMode::Interval,
            "event_driven" => passes.planner_mode = PlannerMode::EventDriven,
            other => tracing::warn!(value = other, "unknown planner mode, using default"),
        }
    }
}

fn set_bool(kv: &std::collections::BTreeMap<String, String>, key: &str, field: &mut bool) {
    if let Some(v) = kv.get(key) {
        match parse_bool(v) {
            Some(b) => *field = b,
            None => tracing::warn!(key, value = v.as_str(), "expected boolean, using default"),
        }
    }
}

fn set_u32(kv: &std::collections::BTreeMap<String, String>, key: &str, field: &mut u32) {
    if let Some(v) = kv.get(key) {
        match v.parse::<u32>() {
            Ok(n) if n > 0 => *field = n,
            _ => tracing::warn!(key, value = v.as_str(), "expected positive integer, using default"),
        }
    }
}

fn set_u8(kv: &std::collections::BTreeMap<String, String>, key: &str, field: &mut u8) {
    if let Some(v) = kv.get(key) {
        match v.parse::<u8>() {
            Ok(n) => *field = n,
            _ => tracing::warn!(key, value = v.as_str(), "expected 0-255 integer, using default"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Scan `[section]` headers and `key = value` lines into a nested map.
///
/// `#` starts a comment outside of quoted strings; `"…"` strings support
/// `\" \\ \n \r \t` escapes. Lines that match neither a section header nor
/// a key-value pair are ignored.
fn parse_sections(
    text: &str,
) -> std::collections::BTreeMap<String, std::collections::BTreeMap<String, String>> {
    let mut sections: std::collections::BTreeMap<String, std::collections::BTreeMap<String, String>> =
        std::collections::BTreeMap::new();
    let mut current = String::new();

    for raw_line in text.lines() {
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            current = name.trim().to_owned();
            sections.entry(current.clone()).or_default();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().to_owned();
        let value = unquote(value.trim());
        sections.entry(current.clone()).or_default().insert(key, value);
    }

    sections
}

/// Strip a `#` comment that starts outside of a quoted string.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Strip surrounding quotes and resolve escapes, or return the raw token
/// unchanged if it isn't quoted.
fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|s| s.strip_suffix('"')) else {
        return value.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_all_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/noface.conf")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_sections_and_strings() {
        let text = r#"
            [project]
            name = "demo"
            build = "cargo build"

            [agents]
            implementer = claude
            num_workers = 3
            verbose = true
        "#;
        let cfg = Config::parse(text);
        assert_eq!(cfg.project.name, "demo");
        assert_eq!(cfg.project.build.as_deref(), Some("cargo build"));
        assert_eq!(cfg.agents.implementer, "claude");
        assert_eq!(cfg.agents.num_workers, 3);
        assert!(cfg.agents.verbose);
    }

    #[test]
    fn comment_outside_quotes_is_stripped() {
        let text = "[project]\nname = \"demo\" # trailing comment\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.project.name, "demo");
    }

    #[test]
    fn hash_inside_quotes_is_preserved() {
        let text = "[project]\nname = \"de#mo\"\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.project.name, "de#mo");
    }

    #[test]
    fn escape_sequences_decode() {
        let text = r#"[project]
name = "line1\nline2\ttabbed"
"#;
        let cfg = Config::parse(text);
        assert_eq!(cfg.project.name, "line1\nline2\ttabbed");
    }

    #[test]
    fn out_of_range_num_workers_falls_back_to_default() {
        let text = "[agents]\nnum_workers = 99\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.agents.num_workers, AgentsConfig::default().num_workers);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let text = "[project]\nname = demo\nbogus_key = 1\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.project.name, "demo");
    }

    #[test]
    fn planner_mode_event_driven() {
        let text = "[passes]\nplanner_mode = event_driven\nplanner_enabled = false\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.passes.planner_mode, PlannerMode::EventDriven);
        assert!(!cfg.passes.planner_enabled);
    }

    #[test]
    fn tracker_type_github_with_sync() {
        let text = "[tracker]\ntype = github\nsync_to_github = true\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.tracker.kind, TrackerKind::Github);
        assert!(cfg.tracker.sync_to_github);
    }

    #[test]
    fn monowiki_bounds() {
        let text = "[monowiki]\nneighbor_depth = 255\nmax_context_docs = 5\n";
        let cfg = Config::parse(text);
        assert_eq!(cfg.monowiki.neighbor_depth, 255);
        assert_eq!(cfg.monowiki.max_context_docs, 5);
    }
}
