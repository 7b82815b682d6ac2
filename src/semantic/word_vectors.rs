use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use rust_stemmers::Stemmer;

use super::embeddings::{EmbeddingError, SentenceEmbedder};
use super::preprocess::{english_stemmer, training_tokens};
use crate::errors::{PipelineError, PipelineResult};

/// Word vectors in the fastText `.vec` text format, averaged per sentence.
///
/// The vocabulary was learned on the cleaned corpus, so sentence tokens go
/// through the same cleanup and stemming before lookup.
pub struct WordVectorModel {
    vectors: HashMap<String, Vec<f32>>,
    dimensions: usize,
    stemmer: Stemmer,
}

impl WordVectorModel {
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let now = Instant::now();
        let file = File::open(path).map_err(|e| PipelineError::from_io_at(e, path))?;
        let model = Self::parse(BufReader::new(file))?;

        log::debug!(
            "took {}ms to load {} word vectors ({}d) from {}",
            now.elapsed().as_micros() as f64 / 1000.0,
            model.vectors.len(),
            model.dimensions,
            path.display()
        );
        Ok(model)
    }

    /// Parse `<count> <dim>` followed by one `<word> <v1> ... <vdim>` line per word.
    pub fn parse(reader: impl BufRead) -> PipelineResult<Self> {
        let mut lines = reader.lines();

        let header = lines.next().transpose()?.ok_or(EmbeddingError::MalformedVectors {
            line: 1,
            message: "empty file".to_string(),
        })?;
        let (expected_count, dimensions) = parse_header(&header)?;

        let mut vectors = HashMap::with_capacity(expected_count);
        for (idx, line) in lines.enumerate() {
            let line = line?;
            let line_no = idx + 2;
            if line.trim().is_empty() {
                continue;
            }

            let mut parts = line.split_whitespace();
            let word = parts.next().unwrap_or_default().to_string();
            let values = parts
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| EmbeddingError::MalformedVectors {
                    line: line_no,
                    message: e.to_string(),
                })?;

            if let Some(value) = values.iter().find(|v| !v.is_finite()) {
                return Err(EmbeddingError::MalformedVectors {
                    line: line_no,
                    message: format!("non-finite value {value} for {word:?}"),
                }
                .into());
            }

            if values.len() != dimensions {
                return Err(EmbeddingError::MalformedVectors {
                    line: line_no,
                    message: format!("expected {dimensions} values, found {}", values.len()),
                }
                .into());
            }

            vectors.insert(word, l2_normalized(values));
        }

        if vectors.len() != expected_count {
            log::warn!(
                "word vector header announces {expected_count} words, file has {}",
                vectors.len()
            );
        }

        Ok(Self {
            vectors,
            dimensions,
            stemmer: english_stemmer(),
        })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectors.len()
    }
}

fn parse_header(header: &str) -> Result<(usize, usize), EmbeddingError> {
    let malformed = || EmbeddingError::MalformedVectors {
        line: 1,
        message: format!("expected `<count> <dimensions>`, found {header:?}"),
    };

    let mut parts = header.split_whitespace();
    let count = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    let dimensions: usize = parts.next().and_then(|v| v.parse().ok()).ok_or_else(malformed)?;
    if dimensions == 0 || parts.next().is_some() {
        return Err(malformed());
    }
    Ok((count, dimensions))
}

fn l2_normalized(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

impl SentenceEmbedder for WordVectorModel {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Mean of the normalized vectors of known tokens; zero vector when none is known.
    fn embed(&self, sentence: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut sum = vec![0f32; self.dimensions];
        let mut known = 0usize;

        for token in training_tokens(sentence, &self.stemmer) {
            if let Some(vector) = self.vectors.get(&token) {
                sum.iter_mut().zip(vector).for_each(|(s, v)| *s += v);
                known += 1;
            }
        }

        if known > 0 {
            let n = known as f32;
            sum.iter_mut().for_each(|s| *s /= n);
        }
        Ok(sum)
    }
}
