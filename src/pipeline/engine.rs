use std::sync::Arc;

use tracing::debug;

use crate::alignment::BiAlignment;
use crate::anonymize::anonymize;
use crate::cluster::condense;
use crate::detect::{tag_entities, EntityDetector, GlossaryDetector, LabelFilter, RegexDetector};
use crate::errors::LineError;
use crate::offsets::{locate_spans, token_offsets};
use crate::project::{project_clusters, quality_check, ProjectOptions};
use crate::render::{merge_continuous, projection_points, render_tags};
use crate::sentinels::TagPair;

use super::config::{PipelineConfig, PipelineMode};
use super::record::{AnonymizedPair, InputRecord, OutputRecord};

/// Everything needed to turn one input line into one output line. Shared
/// read-only by all workers.
pub struct SentencePairEngine {
    mode: PipelineMode,
    tags: TagPair,
    placeholder: String,
    labels: LabelFilter,
    patterns: RegexDetector,
    model: Option<Arc<dyn EntityDetector>>,
    project: ProjectOptions,
}

impl SentencePairEngine {
    pub fn new(cfg: &PipelineConfig, model: Option<Arc<dyn EntityDetector>>) -> Self {
        Self {
            mode: cfg.mode,
            tags: cfg.tags.clone(),
            placeholder: cfg.placeholder.clone(),
            labels: cfg.labels.clone(),
            patterns: RegexDetector,
            model: if cfg.ner { model } else { None },
            project: cfg.project,
        }
    }

    /// Builds the engine, loading the configured glossary recognizer once.
    pub fn from_config(cfg: &PipelineConfig) -> anyhow::Result<Self> {
        let model: Option<Arc<dyn EntityDetector>> = match cfg.glossary.as_deref() {
            Some(path) if cfg.ner => Some(Arc::new(GlossaryDetector::from_path(path)?)),
            _ => None,
        };
        Ok(Self::new(cfg, model))
    }

    /// Tags `target` where the spans tagged in `source_tagged` land through
    /// the alignment.
    pub fn project_tags(
        &self,
        source_tagged: &str,
        target: &str,
        source_tokens: &str,
        target_tokens: &str,
        alignment: &BiAlignment,
    ) -> String {
        let src: Vec<&str> = source_tokens.split_whitespace().collect();
        let trg: Vec<&str> = target_tokens.split_whitespace().collect();

        let clusters = condense(
            &locate_spans(source_tagged, &self.tags),
            &token_offsets(&src),
        );
        let words = project_clusters(&src, &trg, alignment, &clusters, self.project.nonaligned);
        if self.project.quality_pass {
            let report = quality_check(
                &src,
                &trg,
                alignment,
                &clusters,
                &words,
                self.project.nonaligned,
            );
            debug!(recall = report.recall(), spurious = report.spurious, "quality pass");
        }
        let points = projection_points(&token_offsets(&trg), &trg, &words);
        merge_continuous(&render_tags(target, &points, &self.tags), &self.tags)
    }

    pub fn process(&self, rec: &InputRecord<'_>) -> Result<OutputRecord, LineError> {
        let alignment = BiAlignment::parse(rec.alignment).map_err(|e| LineError::BadAlignment {
            line: rec.line,
            reason: format!("{e:#}"),
        })?;

        let mut source_detectors: Vec<&dyn EntityDetector> = vec![&self.patterns];
        if let Some(model) = self.model.as_deref() {
            source_detectors.push(model);
        }
        let tagged = tag_entities(rec.source, &source_detectors, &self.labels, &self.tags);
        let (src_offset_tokens, trg_offset_tokens) = rec.offset_tokens();

        let (source_tagged, target_tagged) = if tagged.accepted > 0 {
            let target_tagged = self.project_tags(
                &tagged.text,
                rec.target,
                src_offset_tokens,
                trg_offset_tokens,
                &alignment,
            );
            (tagged.text, target_tagged)
        } else {
            // nothing to project; the target may still hold pattern matches
            let target = tag_entities(rec.target, &[&self.patterns], &self.labels, &self.tags);
            (rec.source.to_string(), target.text)
        };
        debug!(line = rec.line, entities = tagged.accepted, "tagged pair");

        let anonymized = match (self.mode, rec.lowercased) {
            (PipelineMode::Full, Some((src_lc, trg_lc))) => Some(AnonymizedPair {
                source: anonymize(
                    rec.source_tokens,
                    src_lc,
                    &source_tagged,
                    &self.tags,
                    &self.placeholder,
                ),
                target: anonymize(
                    rec.target_tokens,
                    trg_lc,
                    &target_tagged,
                    &self.tags,
                    &self.placeholder,
                ),
            }),
            _ => None,
        };

        Ok(OutputRecord {
            line: rec.line,
            source_tagged,
            target_tagged,
            anonymized,
            source_entities: tagged.accepted,
        })
    }

    pub fn process_line(&self, line_no: usize, line: &str) -> Result<OutputRecord, LineError> {
        let rec = InputRecord::parse(line_no, line, self.mode)?;
        self.process(&rec)
    }
}
