use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{load_config, locate_config, AppConfig};
use crate::detect::LabelFilter;
use crate::project::{NonalignedPolicy, ProjectOptions};
use crate::sentinels::{TagPair, DEFAULT_CLOSE_TAG, DEFAULT_OPEN_TAG, DEFAULT_PLACEHOLDER};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineMode {
    /// Tag both sides and anonymize them; 7 input fields.
    Full,
    /// Tag both sides only; 5 input fields.
    Project,
}

impl PipelineMode {
    pub fn parse(s: Option<&str>) -> anyhow::Result<Self> {
        match s.unwrap_or("full").trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "project" | "projection" => Ok(Self::Project),
            other => Err(anyhow!("unknown pipeline mode: {other}")),
        }
    }

    pub fn required_fields(self) -> usize {
        match self {
            Self::Full => 7,
            Self::Project => 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Tsv,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" => Ok(Self::Tsv),
            "json" | "jsonl" => Ok(Self::Json),
            other => Err(anyhow!("unknown output format: {other}")),
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub mode: Option<String>,
    pub format: Option<String>,
    pub jobs: Option<usize>,
    pub batch_size: Option<usize>,
    pub open_tag: Option<String>,
    pub close_tag: Option<String>,
    pub placeholder: Option<String>,
    pub glossary: Option<PathBuf>,
    pub no_ner: bool,
    pub labels: Option<Vec<String>>,
    pub nonaligned_policy: Option<String>,
    pub quality_pass: bool,
    pub fail_fast: bool,
    pub progress_every: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: Option<PathBuf>,
    pub mode: PipelineMode,
    pub format: OutputFormat,
    /// 0 = one worker per core.
    pub jobs: usize,
    pub batch_size: usize,
    pub progress_every: usize,
    pub fail_fast: bool,
    pub tags: TagPair,
    pub placeholder: String,
    pub ner: bool,
    pub labels: LabelFilter,
    pub glossary: Option<PathBuf>,
    pub project: ProjectOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            mode: PipelineMode::Full,
            format: OutputFormat::Tsv,
            jobs: 0,
            batch_size: 1024,
            progress_every: 10_000,
            fail_fast: false,
            tags: TagPair::default(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            ner: true,
            labels: LabelFilter::default(),
            glossary: None,
            project: ProjectOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads the config file (if any is found) and applies `overrides`.
    pub fn load(overrides: Overrides) -> anyhow::Result<Self> {
        let cfg_path = locate_config(overrides.config_path.clone());
        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_path.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            } else if overrides.config_path.is_some() {
                return Err(anyhow!("config not found: {}", p.display()));
            }
        }
        Self::resolve(&file_cfg, cfg_path.as_deref(), overrides)
    }

    pub fn resolve(
        file_cfg: &AppConfig,
        cfg_path: Option<&Path>,
        overrides: Overrides,
    ) -> anyhow::Result<Self> {
        let mode = PipelineMode::parse(
            overrides
                .mode
                .as_deref()
                .or(file_cfg.pipeline.mode.as_deref()),
        )?;
        let format = match overrides.format.as_deref() {
            Some(f) => OutputFormat::parse(f)?,
            None => OutputFormat::Tsv,
        };
        let jobs = overrides.jobs.or(file_cfg.pipeline.jobs).unwrap_or(0);
        let batch_size = overrides
            .batch_size
            .or(file_cfg.pipeline.batch_size)
            .unwrap_or(1024)
            .max(1);
        let progress_every = overrides
            .progress_every
            .or(file_cfg.pipeline.progress_every)
            .unwrap_or(10_000);
        let fail_fast = overrides.fail_fast || file_cfg.pipeline.fail_fast.unwrap_or(false);

        let open = overrides
            .open_tag
            .or_else(|| file_cfg.tags.open.clone())
            .unwrap_or_else(|| DEFAULT_OPEN_TAG.to_string());
        let close = overrides
            .close_tag
            .or_else(|| file_cfg.tags.close.clone())
            .unwrap_or_else(|| DEFAULT_CLOSE_TAG.to_string());
        let tags = TagPair::new(open, close).context("tag markers")?;

        let placeholder = overrides
            .placeholder
            .or_else(|| file_cfg.anonymize.placeholder.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());
        if placeholder.chars().any(char::is_whitespace) {
            return Err(anyhow!("placeholder must be a single token: {placeholder:?}"));
        }

        let ner = !overrides.no_ner && file_cfg.detect.ner.unwrap_or(true);
        let labels = overrides
            .labels
            .or_else(|| file_cfg.detect.labels.clone())
            .map(LabelFilter::new)
            .unwrap_or_default();
        let config_dir = cfg_path
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new("."));
        let glossary = overrides.glossary.or_else(|| {
            file_cfg.detect.glossary.clone().map(|p| {
                if p.is_relative() {
                    config_dir.join(p)
                } else {
                    p
                }
            })
        });

        let nonaligned = match overrides.nonaligned_policy.as_deref() {
            Some(name) => NonalignedPolicy::parse(name)
                .ok_or_else(|| anyhow!("unknown nonaligned policy: {name}"))?,
            None => file_cfg.project.nonaligned_policy.unwrap_or_default(),
        };
        let quality_pass = overrides.quality_pass || file_cfg.project.quality_pass.unwrap_or(false);

        Ok(Self {
            config_path: cfg_path.map(Path::to_path_buf),
            mode,
            format,
            jobs,
            batch_size,
            progress_every,
            fail_fast,
            tags,
            placeholder,
            ner,
            labels,
            glossary,
            project: ProjectOptions {
                nonaligned,
                quality_pass,
            },
        })
    }
}
