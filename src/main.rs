use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use span_projector::alignment::reverse_alignment;
use span_projector::config::init_default_config;
use span_projector::pipeline::{LineRunner, Overrides, PipelineConfig, SentencePairEngine};
use span_projector::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "span-projector")]
#[command(
    about = "Projects entity tags across aligned sentence pairs and anonymizes them",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Write a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory for --init-config (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file with --init-config
    #[arg(long)]
    force: bool,

    /// Config file (default: $SPAN_PROJECTOR_CONFIG, then span-projector.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Input TSV (default: stdin)
    #[arg(short, long, value_name = "TSV")]
    input: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// "full" (7 fields, anonymize) or "project" (5 fields, tag only)
    #[arg(long)]
    mode: Option<String>,

    /// Output format: tsv or json
    #[arg(long)]
    format: Option<String>,

    /// Worker threads (0 = all cores, 1 = no pool)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Lines per worker batch
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, value_name = "TAG")]
    open_tag: Option<String>,

    #[arg(long, value_name = "TAG")]
    close_tag: Option<String>,

    /// Token substituted for every entity
    #[arg(long)]
    placeholder: Option<String>,

    /// phrase<TAB>label lexicon used as entity recognizer
    #[arg(long, value_name = "TSV")]
    glossary: Option<PathBuf>,

    /// Only use pattern detectors (email, phone, IP)
    #[arg(long)]
    no_ner: bool,

    /// Entity labels to keep (comma separated)
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,

    /// any_gap or unaligned_only
    #[arg(long)]
    nonaligned_policy: Option<String>,

    /// Project results back to the source and log the agreement
    #[arg(long)]
    quality_pass: bool,

    /// Read Pharaoh alignments, one per line, and print them reversed
    #[arg(long)]
    reverse_alignment: bool,

    /// Abort on the first malformed line
    #[arg(long)]
    fail_fast: bool,

    /// Suppress progress lines on stderr
    #[arg(long)]
    no_progress: bool,

    /// Progress line every N input lines
    #[arg(long)]
    progress_every: Option<usize>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// Structured JSON logs
    #[arg(long)]
    log_json: bool,
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_input(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn BufRead>> {
    Ok(match path {
        Some(p) => Box::new(BufReader::new(
            File::open(p).with_context(|| format!("open input: {}", p.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin().lock())),
    })
}

fn open_output(path: Option<&PathBuf>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("create output: {}", p.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn run_reverse_alignment(
    input: Box<dyn BufRead>,
    mut output: Box<dyn Write>,
) -> anyhow::Result<()> {
    for (idx, line) in input.lines().enumerate() {
        let line = line.with_context(|| format!("read input line {}", idx + 1))?;
        let reversed =
            reverse_alignment(&line).with_context(|| format!("line {}", idx + 1))?;
        writeln!(output, "{reversed}").context("write output")?;
    }
    output.flush().context("flush output")?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.log_json);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = open_input(args.input.as_ref())?;
    let output = open_output(args.output.as_ref())?;

    if args.reverse_alignment {
        return run_reverse_alignment(input, output);
    }

    let cfg = PipelineConfig::load(Overrides {
        config_path: args.config,
        mode: args.mode,
        format: args.format,
        jobs: args.jobs,
        batch_size: args.batch_size,
        open_tag: args.open_tag,
        close_tag: args.close_tag,
        placeholder: args.placeholder,
        glossary: args.glossary,
        no_ner: args.no_ner,
        labels: args.labels,
        nonaligned_policy: args.nonaligned_policy,
        quality_pass: args.quality_pass,
        fail_fast: args.fail_fast,
        progress_every: args.progress_every,
    })
    .context("build config")?;
    info!(
        config = ?cfg.config_path,
        mode = ?cfg.mode,
        jobs = cfg.jobs,
        glossary = ?cfg.glossary,
        "starting"
    );

    let engine = SentencePairEngine::from_config(&cfg)?;
    let runner = LineRunner::new(&engine, &cfg)?;
    let progress = ConsoleProgress::new(!args.no_progress, cfg.progress_every);
    runner.run(input, output, &progress)?;
    Ok(())
}
