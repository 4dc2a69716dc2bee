use std::collections::BTreeSet;
use std::io::Cursor;

use span_projector::pipeline::{
    LineRunner, Overrides, PipelineConfig, PipelineMode, SentencePairEngine,
};
use span_projector::progress::ConsoleProgress;
use span_projector::{project_clusters, reverse_alignment, BiAlignment, NonalignedPolicy};

const ALICE_LINE: &str = "Alice went home.\tAlice fue a casa.\t\
                          Alice went home .\tAlice fue a casa .\t\
                          alice went home .\talice fue a casa .\t0-0 1-1 2-3 3-4";

fn write_project(dir: &std::path::Path, config: &str) -> std::path::PathBuf {
    std::fs::write(dir.join("entities.tsv"), "Alice\tPERSON\nParis\tLOC\n").unwrap();
    let cfg_path = dir.join("span-projector.toml");
    std::fs::write(&cfg_path, config).unwrap();
    cfg_path
}

fn run(cfg: &PipelineConfig, input: &str) -> String {
    let engine = SentencePairEngine::from_config(cfg).unwrap();
    let runner = LineRunner::new(&engine, cfg).unwrap();
    let mut out = Vec::new();
    runner
        .run(Cursor::new(input), &mut out, &ConsoleProgress::new(false, 0))
        .unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn reverses_pharaoh_alignments() {
    assert_eq!(reverse_alignment("0-1 1-0").unwrap(), "0-1 1-0");
    assert_eq!(reverse_alignment("0-2 1-0").unwrap(), "0-1 2-0");
    assert_eq!(reverse_alignment("").unwrap(), "");
    assert!(reverse_alignment("0-1 x").is_err());
}

#[test]
fn gap_filling_depends_on_policy() {
    let src = ["p", "q", "r", "s", "t"];
    let trg = ["a", "b", "c", "d", "e"];
    let ali = BiAlignment::parse("0-0 1-4 2-1 3-2 4-3").unwrap();
    let clusters = vec![BTreeSet::from([0, 1])];

    let any = project_clusters(&src, &trg, &ali, &clusters, NonalignedPolicy::AnyGap);
    assert_eq!(any, BTreeSet::from([0, 1, 2, 3, 4]));

    // every hole is linked elsewhere, so nothing may be added
    let strict = project_clusters(&src, &trg, &ali, &clusters, NonalignedPolicy::UnalignedOnly);
    assert_eq!(strict, BTreeSet::from([0, 4]));
}

#[test]
fn full_mode_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_project(
        dir.path(),
        "[pipeline]\nmode = \"full\"\njobs = 1\n\n[detect]\nglossary = \"entities.tsv\"\n",
    );
    let cfg = PipelineConfig::load(Overrides {
        config_path: Some(cfg_path),
        ..Overrides::default()
    })
    .unwrap();
    assert_eq!(cfg.mode, PipelineMode::Full);
    assert_eq!(cfg.glossary.as_deref(), Some(dir.path().join("entities.tsv").as_path()));

    let out = run(&cfg, &format!("{ALICE_LINE}\n"));
    assert_eq!(
        out,
        "<entity>Alice</entity> went home.\t<entity>Alice</entity> fue a casa.\t\
         __ENTITY__ went home .\t__ENTITY__ fue a casa .\t\
         __ENTITY__ went home.\t__ENTITY__ fue a casa.\t\
         __srcmap__\t0\t0\tAlice\t0\t0\t__ENTITY__\t\
         __trgmap__\t0\t0\tAlice\t0\t0\t__ENTITY__\n"
    );
}

#[test]
fn label_filter_skips_other_glossary_labels() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_project(
        dir.path(),
        "[pipeline]\nmode = \"project\"\njobs = 1\n\n[detect]\nglossary = \"entities.tsv\"\n",
    );
    let cfg = PipelineConfig::load(Overrides {
        config_path: Some(cfg_path),
        ..Overrides::default()
    })
    .unwrap();
    let out = run(&cfg, "to Paris\ta París\tto Paris\ta París\t0-0 1-1\n");
    assert_eq!(out, "to Paris\ta París\n");
}

#[test]
fn json_output_and_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = write_project(dir.path(), "[detect]\nglossary = \"entities.tsv\"\n");
    let cfg = PipelineConfig::load(Overrides {
        config_path: Some(cfg_path),
        format: Some("json".to_string()),
        placeholder: Some("<PER>".to_string()),
        jobs: Some(2),
        ..Overrides::default()
    })
    .unwrap();

    let out = run(&cfg, &format!("{ALICE_LINE}\n{ALICE_LINE}\n"));
    let rows: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["line"], 1);
    assert_eq!(rows[1]["line"], 2);
    assert_eq!(rows[0]["target_tagged"], "<entity>Alice</entity> fue a casa.");
    assert_eq!(rows[0]["anonymized"]["source"]["text"], "<PER> went home.");
    assert_eq!(rows[0]["anonymized"]["target"]["mapping"][0]["original"], "Alice");
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = PipelineConfig::load(Overrides {
        config_path: Some(dir.path().join("nope.toml")),
        ..Overrides::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("config not found"));
}
