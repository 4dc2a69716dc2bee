use std::io::{BufRead, Write};

use anyhow::{anyhow, Context};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::errors::LineError;
use crate::progress::ConsoleProgress;

use super::config::{OutputFormat, PipelineConfig};
use super::engine::SentencePairEngine;
use super::record::OutputRecord;

/// Line number and decoded text of a line waiting for a worker.
type Pending = (usize, Result<String, LineError>);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub lines: usize,
    pub written: usize,
    pub malformed: usize,
    pub with_entities: usize,
}

/// Streams tab-separated records from `input` to `output`, processing each
/// batch on a worker pool and writing results in input order.
pub struct LineRunner<'a> {
    engine: &'a SentencePairEngine,
    format: OutputFormat,
    batch_size: usize,
    fail_fast: bool,
    pool: Option<rayon::ThreadPool>,
}

impl<'a> LineRunner<'a> {
    pub fn new(engine: &'a SentencePairEngine, cfg: &PipelineConfig) -> anyhow::Result<Self> {
        let pool = if cfg.jobs == 1 {
            None
        } else {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(cfg.jobs)
                    .build()
                    .context("build worker pool")?,
            )
        };
        Ok(Self {
            engine,
            format: cfg.format,
            batch_size: cfg.batch_size.max(1),
            fail_fast: cfg.fail_fast,
            pool,
        })
    }

    pub fn run<R: BufRead, W: Write>(
        &self,
        mut input: R,
        mut output: W,
        progress: &ConsoleProgress,
    ) -> anyhow::Result<RunStats> {
        let mut stats = RunStats::default();
        let mut batch: Vec<Pending> = Vec::with_capacity(self.batch_size);
        let mut buf: Vec<u8> = Vec::new();
        let mut line_no = 0usize;
        loop {
            buf.clear();
            let n = input
                .read_until(b'\n', &mut buf)
                .with_context(|| format!("read input line {}", line_no + 1))?;
            if n == 0 {
                break;
            }
            line_no += 1;
            let line = String::from_utf8(std::mem::take(&mut buf))
                .map_err(|_| LineError::InvalidUtf8 { line: line_no });
            batch.push((line_no, line));
            if batch.len() >= self.batch_size {
                self.flush(&mut batch, &mut output, &mut stats)?;
                progress.lines(stats.lines);
            }
        }
        self.flush(&mut batch, &mut output, &mut stats)?;
        output.flush().context("flush output")?;
        progress.finish(stats.lines, stats.malformed);
        info!(
            lines = stats.lines,
            written = stats.written,
            malformed = stats.malformed,
            with_entities = stats.with_entities,
            "run complete"
        );
        Ok(stats)
    }

    fn process_one(&self, (n, line): &Pending) -> Result<OutputRecord, LineError> {
        match line {
            Ok(line) => self.engine.process_line(*n, line),
            Err(err) => Err(err.clone()),
        }
    }

    fn process_batch(&self, batch: &[Pending]) -> Vec<Result<OutputRecord, LineError>> {
        let work = || batch.par_iter().map(|p| self.process_one(p)).collect::<Vec<_>>();
        match self.pool.as_ref() {
            Some(pool) => pool.install(work),
            None => batch.iter().map(|p| self.process_one(p)).collect(),
        }
    }

    fn flush<W: Write>(
        &self,
        batch: &mut Vec<Pending>,
        output: &mut W,
        stats: &mut RunStats,
    ) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let results = self.process_batch(batch);
        for ((_, line), result) in batch.iter().zip(results) {
            stats.lines += 1;
            match result {
                Ok(rec) => {
                    if rec.source_entities > 0 {
                        stats.with_entities += 1;
                    }
                    let text = match self.format {
                        OutputFormat::Tsv => rec.to_tsv(),
                        OutputFormat::Json => rec.to_json()?,
                    };
                    writeln!(output, "{text}").context("write output")?;
                    stats.written += 1;
                }
                Err(err) => {
                    stats.malformed += 1;
                    let input = line.as_deref().map(str::trim_end).unwrap_or_default();
                    warn!(line = err.line(), input, "{err}");
                    if self.fail_fast {
                        return Err(anyhow!(err));
                    }
                }
            }
        }
        batch.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::LineRunner;
    use crate::pipeline::config::{PipelineConfig, PipelineMode};
    use crate::pipeline::engine::SentencePairEngine;
    use crate::progress::ConsoleProgress;

    fn cfg(jobs: usize, batch_size: usize, fail_fast: bool) -> PipelineConfig {
        PipelineConfig {
            mode: PipelineMode::Project,
            jobs,
            batch_size,
            fail_fast,
            ..PipelineConfig::default()
        }
    }

    const INPUT: &str = "a\tb\ta\tb\t0-0\nbroken line\nip 10.0.0.1\tip 10.0.0.1\tip 10.0.0.1\tip 10.0.0.1\t0-0 1-1\n";

    #[test]
    fn keeps_order_and_skips_malformed() {
        for jobs in [1, 3] {
            let cfg = cfg(jobs, 2, false);
            let engine = SentencePairEngine::new(&cfg, None);
            let runner = LineRunner::new(&engine, &cfg).unwrap();
            let mut out = Vec::new();
            let stats = runner
                .run(Cursor::new(INPUT), &mut out, &ConsoleProgress::new(false, 0))
                .unwrap();
            assert_eq!(stats.lines, 3);
            assert_eq!(stats.written, 2);
            assert_eq!(stats.malformed, 1);
            assert_eq!(stats.with_entities, 1);
            let text = String::from_utf8(out).unwrap();
            assert_eq!(
                text,
                "a\tb\nip <entity>10.0.0.1</entity>\tip <entity>10.0.0.1</entity>\n"
            );
        }
    }

    #[test]
    fn fail_fast_stops_at_first_bad_line() {
        let cfg = cfg(1, 8, true);
        let engine = SentencePairEngine::new(&cfg, None);
        let runner = LineRunner::new(&engine, &cfg).unwrap();
        let mut out = Vec::new();
        let err = runner
            .run(Cursor::new(INPUT), &mut out, &ConsoleProgress::new(false, 0))
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    const MIXED_BYTES: &[u8] = b"a\tb\ta\tb\t0-0\n\xff\tb\ta\tb\t0-0\nc\td\tc\td\t0-0\n";

    #[test]
    fn invalid_utf8_line_is_skipped() {
        for jobs in [1, 2] {
            let cfg = cfg(jobs, 8, false);
            let engine = SentencePairEngine::new(&cfg, None);
            let runner = LineRunner::new(&engine, &cfg).unwrap();
            let mut out = Vec::new();
            let stats = runner
                .run(Cursor::new(MIXED_BYTES), &mut out, &ConsoleProgress::new(false, 0))
                .unwrap();
            assert_eq!(stats.lines, 3);
            assert_eq!(stats.written, 2);
            assert_eq!(stats.malformed, 1);
            assert_eq!(String::from_utf8(out).unwrap(), "a\tb\nc\td\n");
        }
    }

    #[test]
    fn invalid_utf8_honors_fail_fast() {
        let cfg = cfg(1, 8, true);
        let engine = SentencePairEngine::new(&cfg, None);
        let runner = LineRunner::new(&engine, &cfg).unwrap();
        let mut out = Vec::new();
        let err = runner
            .run(Cursor::new(MIXED_BYTES), &mut out, &ConsoleProgress::new(false, 0))
            .unwrap_err();
        assert_eq!(err.to_string(), "line 2: not valid UTF-8");
        assert_eq!(String::from_utf8(out).unwrap(), "a\tb\n");
    }
}
