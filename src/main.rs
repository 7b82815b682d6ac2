use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use homedir::my_home;
use inquire::error::InquireResult;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod corpus;
mod dataset;
mod errors;
mod evaluate;
mod format;
mod pipeline;
mod scrape;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;

use cli::{BuildTarget, Command};
use config::{Config, EmbeddingBackend};
use pipeline::{BuildStep, RetrainOptions};
use semantic::{FastTextTrainer, SearchService, TrainParams};

fn get_base_path() -> anyhow::Result<PathBuf> {
    if let Ok(base_path) = std::env::var("PROJSEARCH_BASE_PATH") {
        return Ok(PathBuf::from(base_path));
    }

    let home = my_home()
        .context("Could not determine home directory")?
        .context("Home directory path is empty")?;
    Ok(home.join(".local/share/projsearch"))
}

fn confirm(message: String) -> anyhow::Result<bool> {
    match inquire::prompt_confirmation(message) {
        InquireResult::Ok(answer) => Ok(answer),
        InquireResult::Err(err) => bail!("An error occurred: {}", err),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let base_path = get_base_path()?;
    let config = Config::load_with(&base_path)
        .with_context(|| format!("Failed to load config from {}", base_path.display()))?;
    let paths = config.paths();

    match args.command {
        Command::Retrain {
            dataset,
            boosting,
            yes,
        } => {
            let published: Vec<_> = paths.outputs().into_iter().filter(|p| p.exists()).collect();
            if !yes
                && !published.is_empty()
                && !confirm(format!(
                    "Retraining replaces {} published artifacts in {}. Continue?",
                    published.len(),
                    paths.root.display()
                ))?
            {
                return Ok(());
            }

            let options = RetrainOptions {
                include_confidential: dataset.include_confidential
                    || config.training.include_confidential,
                boosting_percentage: boosting.unwrap_or(config.training.boosting_percentage),
                params: TrainParams {
                    epochs: config.training.epochs,
                    dimensions: config.training.dimensions,
                },
            };

            let fasttext = FastTextTrainer::new(&config.training.fasttext_bin);
            let trainer: Option<&dyn semantic::EmbeddingTrainer> = match config.embedding.backend {
                EmbeddingBackend::WordVectors => Some(&fasttext),
                EmbeddingBackend::Fastembed => None,
            };

            let report =
                pipeline::retrain(&dataset.dataset, &config.dataset, &paths, &options, trainer)?;

            println!(
                "{} projects, {} sentences, corpus {} -> {} lines",
                report.projects,
                report.sentences,
                report.corpus.base_lines,
                report.corpus.boosted_lines
            );
            if let Some(manifest) = &report.manifest {
                println!(
                    "trained {} vectors ({}d, {} epochs) on corpus {}",
                    manifest.backend, manifest.dimensions, manifest.epochs, manifest.corpus_sha256
                );
            }
            for path in &report.published {
                println!("published {}", path.display());
            }
        }

        Command::Build {
            target,
            dataset,
            append,
            boosting,
        } => {
            let step = match target {
                BuildTarget::Corpus => BuildStep::Corpus,
                BuildTarget::Metadata => BuildStep::Metadata { append },
                BuildTarget::Names => BuildStep::Names,
                BuildTarget::Labels => BuildStep::Labels,
            };

            let summary = pipeline::build_step(
                step,
                &dataset.dataset,
                &config.dataset,
                &paths,
                dataset.include_confidential || config.training.include_confidential,
                boosting.unwrap_or(config.training.boosting_percentage),
            )?;
            println!("{summary}");
        }

        Command::Search {
            query,
            top_k,
            no_scores,
            json,
        } => {
            let embedder = semantic::load_embedder(&config.embedding, &paths)?;
            let service = SearchService::open(&paths, embedder)?;
            let mut outcome = service.search(&query, top_k.unwrap_or(config.search.top_k))?;

            if no_scores {
                outcome.hide_scores();
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.ranked);
                print!("{}", outcome.metadata);
            }
        }

        Command::Scrape { dataset, merge } => {
            let dataset = crate::dataset::Dataset::load(&dataset, &config.dataset)?;
            let fetcher = scrape::HttpFetcher::new(Duration::from_secs(config.scrape.timeout_secs))?;

            let report = scrape::run_scrape(&fetcher, &dataset, &config.scrape, &paths, merge)?;
            println!(
                "{} tags, {} links, {} batch files in {}",
                report.tags.len(),
                report.links,
                report.batch_files.len(),
                paths.scrape_dir.display()
            );
        }

        Command::Evaluate {
            judgments,
            top_k,
            json,
        } => {
            let judgments = evaluate::load_judgments(&judgments)?;
            let embedder = semantic::load_embedder(&config.embedding, &paths)?;
            let service = SearchService::open(&paths, embedder)?;

            let report =
                evaluate::evaluate(&service, &judgments, top_k.unwrap_or(config.search.top_k))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
    }

    Ok(())
}
