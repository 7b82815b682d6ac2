//! Corpus construction from the project dataset.
//!
//! - `extract_sentences`: normalized sentences of the selected text columns
//! - `append_to_corpus`: base corpus + frequency-boosted new sentences + cleaned variant
//! - `labelled`: project -> description sentences, the scorer's comparison basis
//! - `metadata`: project -> display fields
//! - `names`: confidentiality-filtered project list

pub mod labelled;
pub mod metadata;
pub mod names;
mod ordered;

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::ArtifactPaths;
use crate::dataset::Dataset;
use crate::errors::{PipelineError, PipelineResult};
use crate::semantic::preprocess::{clean_for_training, english_stemmer, normalize, split_sentences};
use crate::storage;

pub use labelled::{build_labelled_text_index, LabelledTextIndex};
pub use metadata::{build_metadata, MetadataIndex};
pub use names::{save_project_names, ProjectNames};

/// Line counts of the corpus files written by `append_to_corpus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusStats {
    pub base_lines: usize,
    pub boosted_lines: usize,
    pub cleaned_lines: usize,
}

/// Normalized sentences of every selected corpus column of the retained rows.
pub fn extract_sentences(dataset: &Dataset, include_confidential: bool) -> Vec<String> {
    let sentences: Vec<String> = dataset
        .visible(include_confidential)
        .flat_map(|record| record.corpus_fields.iter())
        .flat_map(|field| split_sentences(field))
        .map(normalize)
        .filter(|sentence| !sentence.trim().is_empty())
        .collect();

    log::debug!("extracted {} sentences from {}", sentences.len(), dataset.path());
    sentences
}

/// Copy the base corpus, append `round(base_lines * boosting_percentage)` lines
/// cycling through `sentences`, then write the stemmed training variant.
///
/// The boost is proportional to the base corpus, not to the number of new
/// sentences. The base corpus itself is only read.
pub fn append_to_corpus(
    sentences: &[String],
    boosting_percentage: f64,
    paths: &ArtifactPaths,
) -> PipelineResult<CorpusStats> {
    if !boosting_percentage.is_finite() || boosting_percentage < 0.0 {
        return Err(PipelineError::InvalidInput(format!(
            "boosting percentage must be a finite number >= 0, got {boosting_percentage}"
        )));
    }
    if paths.base_corpus == paths.boosted_corpus {
        return Err(PipelineError::InvalidInput(format!(
            "boosted corpus would overwrite the base corpus at {}",
            paths.base_corpus.display()
        )));
    }

    storage::ensure_parent(&paths.boosted_corpus)?;
    std::fs::copy(&paths.base_corpus, &paths.boosted_corpus)
        .map_err(|e| PipelineError::from_io_at(e, &paths.base_corpus))?;

    let (base_lines, ends_with_newline) = line_stats(&paths.boosted_corpus)?;
    let boost = (base_lines as f64 * boosting_percentage).round() as usize;

    let file = OpenOptions::new().append(true).open(&paths.boosted_corpus)?;
    let mut writer = BufWriter::new(file);
    if base_lines > 0 && !ends_with_newline {
        writer.write_all(b"\n")?;
    }

    let appended = if sentences.is_empty() {
        if boost > 0 {
            log::warn!("no new sentences to boost the corpus with");
        }
        0
    } else {
        for sentence in sentences.iter().cycle().take(boost) {
            writeln!(writer, "{}", sentence.replace(['\r', '\n'], " "))?;
        }
        boost
    };
    writer.flush()?;

    log::info!(
        "Boosted corpus {} -> {} lines ({} new sentences, {:.1}%)",
        base_lines,
        base_lines + appended,
        sentences.len(),
        boosting_percentage * 100.0
    );

    let cleaned_lines = make_clean_corpus_file(&paths.boosted_corpus, &paths.cleaned_corpus)?;

    Ok(CorpusStats {
        base_lines,
        boosted_lines: base_lines + appended,
        cleaned_lines,
    })
}

/// Rewrite every line of `corpus` as stemmed alphanumeric tokens into `cleaned`.
pub fn make_clean_corpus_file(corpus: &Path, cleaned: &Path) -> PipelineResult<usize> {
    let stemmer = english_stemmer();
    let mut reader = BufReader::new(
        File::open(corpus).map_err(|e| PipelineError::from_io_at(e, corpus))?,
    );

    storage::ensure_parent(cleaned)?;
    let mut writer = BufWriter::new(File::create(cleaned)?);

    let mut lines = 0;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        writeln!(writer, "{}", clean_for_training(&line, &stemmer))?;
        lines += 1;
    }
    writer.flush()?;

    log::debug!("wrote {lines} cleaned lines to {}", cleaned.display());
    Ok(lines)
}

/// Number of lines in `path` (a last line without terminator counts) and
/// whether the file ends with a newline.
pub fn line_stats(path: &Path) -> std::io::Result<(usize, bool)> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut chunk = [0u8; 64 * 1024];
    let mut newlines = 0;
    let mut last = None;

    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        newlines += chunk[..read].iter().filter(|&&b| b == b'\n').count();
        last = Some(chunk[read - 1]);
    }

    Ok(match last {
        None => (0, false),
        Some(b'\n') => (newlines, true),
        Some(_) => (newlines + 1, false),
    })
}
