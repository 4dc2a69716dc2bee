use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::project::NonalignedPolicy;

pub const CONFIG_FILENAME: &str = "span-projector.toml";
pub const CONFIG_ENV: &str = "SPAN_PROJECTOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub tags: TagsSection,
    #[serde(default)]
    pub anonymize: AnonymizeSection,
    #[serde(default)]
    pub detect: DetectSection,
    #[serde(default)]
    pub project: ProjectSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// "full" (7 input fields, tagging + anonymization) or "project"
    /// (5 input fields, tagging only).
    #[serde(default)]
    pub mode: Option<String>,
    /// Worker threads; 0 or unset = all cores.
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Lines handed to the worker pool at once.
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub progress_every: Option<usize>,
    #[serde(default)]
    pub fail_fast: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TagsSection {
    #[serde(default)]
    pub open: Option<String>,
    #[serde(default)]
    pub close: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AnonymizeSection {
    #[serde(default)]
    pub placeholder: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DetectSection {
    /// Model labels accepted as entities. Pattern matches are always kept.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// `phrase<TAB>label` lexicon, relative to the config file.
    #[serde(default)]
    pub glossary: Option<PathBuf>,
    #[serde(default)]
    pub ner: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProjectSection {
    #[serde(default)]
    pub nonaligned_policy: Option<NonalignedPolicy>,
    #[serde(default)]
    pub quality_pass: Option<bool>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 4) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("parse config: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text).context("parse config toml")?;
    Ok(cfg)
}

/// Explicit path, then `$SPAN_PROJECTOR_CONFIG`, then an upward search.
pub fn locate_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit
        .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .or_else(|| find_default_config(CONFIG_FILENAME))
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

pub const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
# "full": source, target, tokens, lowercased tokens, alignment (7 fields)
# "project": source, target, tokens, alignment (5 fields), tagging only
mode = "full"
# 0 = one worker per core
jobs = 0
batch_size = 1024
progress_every = 10000
fail_fast = false

[tags]
open = "<entity>"
close = "</entity>"

[anonymize]
placeholder = "__ENTITY__"

[detect]
ner = true
labels = ["PERSON"]
# Dictionary recognizer: one "phrase<TAB>label" per line.
# glossary = "entities.tsv"

[project]
# "any_gap": fill every hole of a projected span when the filled span covers
#            more than half of its range.
# "unaligned_only": only fill holes whose target token has no alignment link.
nonaligned_policy = "any_gap"
# Project the result back onto the source and log how much of it returns.
quality_pass = false
"#;
