use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainParams {
    pub epochs: u32,
    pub dimensions: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("trainer produced no vectors at {}", .0.display())]
    MissingOutput(PathBuf),
}

/// Unsupervised word-embedding training, offline and blocking.
///
/// Writes `<output_prefix>.vec` (and optionally `.bin`) and returns the `.vec` path.
pub trait EmbeddingTrainer {
    fn train(
        &self,
        corpus: &Path,
        output_prefix: &Path,
        params: TrainParams,
    ) -> Result<PathBuf, TrainingError>;
}

/// Skipgram training through the `fasttext` command line tool.
pub struct FastTextTrainer {
    program: String,
}

impl FastTextTrainer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl EmbeddingTrainer for FastTextTrainer {
    fn train(
        &self,
        corpus: &Path,
        output_prefix: &Path,
        params: TrainParams,
    ) -> Result<PathBuf, TrainingError> {
        let now = Instant::now();
        log::info!(
            "Training word vectors on {} ({} epochs, {} dimensions)",
            corpus.display(),
            params.epochs,
            params.dimensions
        );

        let output = Command::new(&self.program)
            .arg("skipgram")
            .arg("-input")
            .arg(corpus)
            .arg("-output")
            .arg(output_prefix)
            .arg("-epoch")
            .arg(params.epochs.to_string())
            .arg("-dim")
            .arg(params.dimensions.to_string())
            .output()
            .map_err(|source| TrainingError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(TrainingError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let vectors = vectors_path(output_prefix);
        if !vectors.exists() {
            return Err(TrainingError::MissingOutput(vectors));
        }

        log::info!(
            "Training finished in {:.1}s",
            now.elapsed().as_millis() as f64 / 1000.0
        );
        Ok(vectors)
    }
}

/// `<prefix>.vec`
pub fn vectors_path(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".vec");
    PathBuf::from(name)
}
