use std::collections::HashMap;
use std::path::Path;

use crate::config::{ArtifactPaths, DatasetSchema};
use crate::corpus::{build_labelled_text_index, build_metadata, save_project_names};
use crate::dataset::Dataset;
use crate::errors::PipelineError;
use crate::evaluate::{evaluate, Judgment, JudgmentMode};
use crate::format::PROJECT_NAME_COLUMN;
use crate::semantic::SearchService;
use crate::tests::support::{write_dataset, HashEmbedder};

const SENTIMENT: &str = "Sentiment Analysis of Citizen Wellbeing";

fn catalog() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        (
            SENTIMENT,
            "Sentiment analysis of citizen wellbeing on social media. We measure public opinion.",
            "No",
        ),
        (
            "Field boundary detection",
            "Detect field boundaries in satellite images.",
            "No",
        ),
        (
            "Secret Sentiment Engine",
            "Sentiment analysis for a confidential client.",
            "Yes",
        ),
        (
            "Robot Reporter",
            "Generate news articles from structured data.",
            "No",
        ),
    ]
}

/// Publish names, labels and metadata for `projects` under `root`.
fn publish(root: &Path, projects: &[(&str, &str, &str)]) -> ArtifactPaths {
    let paths = ArtifactPaths::under(root);
    let csv = write_dataset(root, projects);
    let dataset = Dataset::load(&csv, &DatasetSchema::default()).unwrap();

    save_project_names(&dataset, false, &paths.project_names).unwrap();
    build_labelled_text_index(&dataset, false, &paths.labelled_text).unwrap();
    build_metadata(&dataset, &paths.metadata, false).unwrap();
    paths
}

fn open(paths: &ArtifactPaths) -> SearchService {
    SearchService::open(paths, Box::new(HashEmbedder)).unwrap()
}

// --- ranking ---

#[test]
fn sentiment_query_ranks_matching_project_first() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(tmp.path(), &catalog());
    let service = open(&paths);

    let outcome = service.search("sentiment analysis", 1).unwrap();
    assert_eq!(outcome.scored.len(), 1);
    assert_eq!(outcome.scored[0].name, SENTIMENT);
    assert!(outcome.scored[0].score > 0.0);

    assert_eq!(outcome.ranked.rows, vec![vec![
        SENTIMENT.to_string(),
        format!("{:.4}", outcome.scored[0].score),
    ]]);

    assert_eq!(outcome.metadata.len(), 1);
    assert_eq!(outcome.metadata.columns.len(), 5 + 1);
    assert_eq!(outcome.metadata.columns.last().unwrap(), PROJECT_NAME_COLUMN);
    assert_eq!(outcome.metadata.rows[0].last().unwrap(), SENTIMENT);
}

#[test]
fn result_length_and_order() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(tmp.path(), &catalog());
    let service = open(&paths);
    assert_eq!(service.project_count(), 3);

    for k in 0..6 {
        let outcome = service.search("satellite images of fields", k).unwrap();
        assert_eq!(outcome.scored.len(), k.min(3));
        assert!(outcome
            .scored
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
    }
}

#[test]
fn confidential_projects_never_returned() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(tmp.path(), &catalog());
    let service = open(&paths);

    let outcome = service.search("sentiment analysis confidential client", 10).unwrap();
    assert!(outcome
        .scored
        .iter()
        .all(|s| s.name != "Secret Sentiment Engine"));
}

#[test]
fn labelled_projects_outside_name_list_are_skipped() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(tmp.path(), &catalog());

    // labels rebuilt with confidential rows, names still filtered
    let dataset = Dataset::load(&tmp.path().join("projects.csv"), &DatasetSchema::default()).unwrap();
    build_labelled_text_index(&dataset, true, &paths.labelled_text).unwrap();

    let service = open(&paths);
    assert_eq!(service.project_count(), 3);
}

#[test]
fn hidden_scores_leave_json_and_tables() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(tmp.path(), &catalog());
    let service = open(&paths);

    let mut outcome = service.search("sentiment analysis", 2).unwrap();
    outcome.hide_scores();

    assert!(outcome.scored.is_empty());
    assert_eq!(outcome.ranked.columns, ["Project"]);
    assert_eq!(outcome.ranked.rows[0], [SENTIMENT]);
    assert_eq!(outcome.metadata.len(), 2);

    let json = serde_json::to_value(&outcome).unwrap();
    assert!(json.get("scored").is_none());
    assert!(!json.to_string().contains("Similarity score"));
}

// --- failures ---

#[test]
fn project_without_sentences_fails_query() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(
        tmp.path(),
        &[("Alpha", "Alpha does sentiment analysis.", "No"), ("Hollow", "", "No")],
    );
    let service = open(&paths);

    assert!(matches!(
        service.search("sentiment", 3),
        Err(PipelineError::EmptyCorpus(name)) if name == "Hollow"
    ));
}

#[test]
fn missing_artifacts_name_the_path() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::under(tmp.path());

    match SearchService::open(&paths, Box::new(HashEmbedder)) {
        Err(PipelineError::MissingArtifact(p)) => assert_eq!(p, paths.project_names),
        Err(e) => panic!("expected MissingArtifact, got {e:?}"),
        Ok(_) => panic!("expected MissingArtifact, got a service"),
    }

    let paths = publish(tmp.path(), &catalog());
    std::fs::remove_file(&paths.metadata).unwrap();
    match SearchService::open(&paths, Box::new(HashEmbedder)) {
        Err(PipelineError::MissingArtifact(p)) => assert_eq!(p, paths.metadata),
        Err(e) => panic!("expected MissingArtifact, got {e:?}"),
        Ok(_) => panic!("expected MissingArtifact, got a service"),
    }
}

// --- evaluation ---

#[test]
fn evaluation_counts_judged_hits() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = publish(tmp.path(), &catalog());
    let service = open(&paths);

    let judgments = vec![
        Judgment {
            query: "sentiment analysis".to_string(),
            mode: JudgmentMode::Single,
            expected: HashMap::from([(SENTIMENT.to_string(), 1)]),
        },
        Judgment {
            query: "sentiment analysis".to_string(),
            mode: JudgmentMode::Multi,
            expected: HashMap::from([
                (SENTIMENT.to_string(), 1),
                ("Field boundary detection".to_string(), -1),
                ("Robot Reporter".to_string(), 0),
            ]),
        },
    ];

    let report = evaluate(&service, &judgments, 3).unwrap();
    assert_eq!(report.queries.len(), 2);
    assert_eq!(report.queries[0].counts.correct, 1);

    let multi = &report.queries[1].counts;
    assert_eq!((multi.correct, multi.incorrect, multi.ambiguous), (1, 1, 1));
    assert_eq!(report.total.correct, 2);
    assert!(report.to_string().contains("total correct = 2"));
}
