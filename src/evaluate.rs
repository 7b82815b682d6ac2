//! Search quality check against hand-made relevance judgments.
//!
//! A judgments file is a JSON array of
//! `{"query": "...", "mode": "multi" | "single", "expected": {"<project>": 1 | 0 | -1}}`.
//! `multi` queries count correct (1), ambiguous (0) and incorrect (-1) hits in
//! the top-K; `single` queries only count whether the wanted project showed up.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, PipelineResult};
use crate::semantic::SearchService;
use crate::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgmentMode {
    Multi,
    Single,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Judgment {
    pub query: String,
    pub mode: JudgmentMode,
    pub expected: HashMap<String, i8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub correct: usize,
    pub ambiguous: usize,
    pub incorrect: usize,
    /// Returned projects without a judgment
    pub unjudged: usize,
}

impl Counts {
    fn add(&mut self, other: &Counts) {
        self.correct += other.correct;
        self.ambiguous += other.ambiguous;
        self.incorrect += other.incorrect;
        self.unjudged += other.unjudged;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub query: String,
    pub mode: JudgmentMode,
    pub projects: Vec<String>,
    pub counts: Counts,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub top_k: usize,
    pub queries: Vec<QueryReport>,
    pub total: Counts,
}

pub fn load_judgments(path: &Path) -> PipelineResult<Vec<Judgment>> {
    let bytes = storage::read_artifact(path)?;
    let judgments: Vec<Judgment> = serde_json::from_slice(&bytes)?;

    for judgment in &judgments {
        if let Some((project, value)) = judgment
            .expected
            .iter()
            .find(|(_, value)| !(-1..=1).contains(*value))
        {
            return Err(PipelineError::InvalidInput(format!(
                "judgment for {project:?} in query {:?} must be 1, 0 or -1, got {value}",
                judgment.query
            )));
        }
    }

    Ok(judgments)
}

/// Count the judged outcome of the returned `projects`.
pub fn judge<S: AsRef<str>>(mode: JudgmentMode, expected: &HashMap<String, i8>, projects: &[S]) -> Counts {
    let mut counts = Counts::default();
    for project in projects {
        match (mode, expected.get(project.as_ref())) {
            (_, Some(1)) => counts.correct += 1,
            (JudgmentMode::Multi, Some(0)) => counts.ambiguous += 1,
            (JudgmentMode::Multi, Some(-1)) => counts.incorrect += 1,
            (JudgmentMode::Multi, _) => counts.unjudged += 1,
            (JudgmentMode::Single, _) => {}
        }
    }
    counts
}

pub fn evaluate(
    service: &SearchService,
    judgments: &[Judgment],
    top_k: usize,
) -> PipelineResult<EvaluationReport> {
    let mut queries = Vec::with_capacity(judgments.len());
    let mut total = Counts::default();

    for judgment in judgments {
        let outcome = service.search(&judgment.query, top_k)?;
        let projects: Vec<String> = outcome.scored.into_iter().map(|s| s.name).collect();
        let counts = judge(judgment.mode, &judgment.expected, &projects);

        log::debug!("{:?}: {:?} -> {:?}", judgment.query, projects, counts);
        total.add(&counts);
        queries.push(QueryReport {
            query: judgment.query.clone(),
            mode: judgment.mode,
            projects,
            counts,
        });
    }

    Ok(EvaluationReport {
        top_k,
        queries,
        total,
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let k = self.top_k;
        for (idx, report) in self.queries.iter().enumerate() {
            let c = &report.counts;
            writeln!(f, "#{idx} [{:?}] {}", report.mode, report.query)?;
            match report.mode {
                JudgmentMode::Multi => writeln!(
                    f,
                    "  correct = {}/{k}; incorrect = {}/{k}; ambiguous = {}/{k}",
                    c.correct, c.incorrect, c.ambiguous
                )?,
                JudgmentMode::Single => writeln!(f, "  found = {}", c.correct > 0)?,
            }
            writeln!(f, "  projects: {}", report.projects.join(", "))?;
        }
        writeln!(
            f,
            "total correct = {}; total incorrect = {}; total ambiguous = {}",
            self.total.correct, self.total.incorrect, self.total.ambiguous
        )
    }
}
