use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DatasetArgs {
    /// Project dataset (.csv)
    #[clap(short, long)]
    pub dataset: PathBuf,

    /// Keep rows marked confidential in the public outputs
    #[clap(long, default_value = "false")]
    pub include_confidential: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildTarget {
    /// Boosted and cleaned training corpus
    Corpus,
    /// Project metadata index
    Metadata,
    /// Project name list
    Names,
    /// Labelled description sentences
    Labels,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild every artifact from the dataset and train new word vectors.
    Retrain {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Share of the base corpus size appended as project sentences
        #[clap(long)]
        boosting: Option<f64>,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Run a single corpus build step against the published artifacts.
    Build {
        #[clap(value_enum)]
        target: BuildTarget,

        #[command(flatten)]
        dataset: DatasetArgs,

        /// Merge into the stored metadata instead of replacing it
        #[clap(long, default_value = "false")]
        append: bool,

        /// Share of the base corpus size appended as project sentences
        #[clap(long)]
        boosting: Option<f64>,
    },

    /// Rank projects by similarity to a free-text query.
    Search {
        query: String,

        /// Number of projects to return
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Hide the similarity score column
        #[clap(long, default_value = "false")]
        no_scores: bool,

        /// Print the outcome as json
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Scrape StackOverflow questions for the dataset technologies.
    Scrape {
        /// Project dataset (.csv)
        #[clap(short, long)]
        dataset: PathBuf,

        /// Append the scraped batches to the base corpus
        #[clap(long, default_value = "false")]
        merge: bool,
    },

    /// Score the search against a relevance judgments file.
    Evaluate {
        /// Judgments (.json)
        #[clap(short, long)]
        judgments: PathBuf,

        /// Number of projects per query
        #[clap(short = 'k', long)]
        top_k: Option<usize>,

        /// Print the report as json
        #[clap(long, default_value = "false")]
        json: bool,
    },
}
