use serde::Serialize;

use crate::anonymize::{flatten_mapping, Anonymized};
use crate::errors::LineError;
use crate::sentinels::{SRC_MAP_LABEL, TRG_MAP_LABEL};

use super::config::PipelineMode;

/// Fields of one input line, borrowed from it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRecord<'a> {
    pub line: usize,
    pub source: &'a str,
    pub target: &'a str,
    pub source_tokens: &'a str,
    pub target_tokens: &'a str,
    /// Only present in full mode.
    pub lowercased: Option<(&'a str, &'a str)>,
    pub alignment: &'a str,
}

impl<'a> InputRecord<'a> {
    pub fn parse(line_no: usize, line: &'a str, mode: PipelineMode) -> Result<Self, LineError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split('\t').collect();
        let expected = mode.required_fields();
        if fields.len() < expected {
            return Err(LineError::TooFewFields {
                line: line_no,
                expected,
                found: fields.len(),
            });
        }
        Ok(match mode {
            PipelineMode::Full => Self {
                line: line_no,
                source: fields[0],
                target: fields[1],
                source_tokens: fields[2],
                target_tokens: fields[3],
                lowercased: Some((fields[4], fields[5])),
                alignment: fields[6],
            },
            PipelineMode::Project => Self {
                line: line_no,
                source: fields[0],
                target: fields[1],
                source_tokens: fields[2],
                target_tokens: fields[3],
                lowercased: None,
                alignment: fields[4],
            },
        })
    }

    /// Tokens used to line up offsets: lower-cased when available.
    pub fn offset_tokens(&self) -> (&'a str, &'a str) {
        self.lowercased
            .unwrap_or((self.source_tokens, self.target_tokens))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnonymizedPair {
    pub source: Anonymized,
    pub target: Anonymized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub line: usize,
    pub source_tagged: String,
    pub target_tagged: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymized: Option<AnonymizedPair>,
    /// Mentions accepted in the source sentence.
    #[serde(skip)]
    pub source_entities: usize,
}

impl OutputRecord {
    pub fn to_tsv(&self) -> String {
        match &self.anonymized {
            None => format!("{}\t{}", self.source_tagged, self.target_tagged),
            Some(pair) => format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{SRC_MAP_LABEL}\t{}\t{TRG_MAP_LABEL}\t{}",
                self.source_tagged,
                self.target_tagged,
                pair.source.joined_tokens(),
                pair.target.joined_tokens(),
                pair.source.text,
                pair.target.text,
                flatten_mapping(&pair.source.mapping),
                flatten_mapping(&pair.target.mapping),
            ),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
