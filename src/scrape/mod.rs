//! Best-effort collection of StackOverflow questions to grow the base corpus.
//!
//! Requests are sequential with a fixed pause before each one and are never
//! retried; a failed page is logged and skipped.

mod fetch;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

pub use fetch::{HttpFetcher, PageFetcher, ScrapeError};

use crate::config::{ArtifactPaths, ScrapeConfig};
use crate::dataset::Dataset;
use crate::semantic::preprocess::{normalize_scraped, split_sentences};
use crate::storage;

static TECH_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\r\n,]").expect("Invalid separator regex pattern"));

// greedy, like "Natural Language Processing (NLP)" -> "NLP"
static ABBREVIATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((.*)\)").expect("Invalid abbreviation regex pattern"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex pattern"));

#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    pub tags: Vec<String>,
    pub links: usize,
    pub batch_files: Vec<PathBuf>,
}

/// Tag slugs for every technology of the dataset, then `extra_tags`.
///
/// A parenthesised abbreviation wins over the full name, words are joined
/// with `-` and duplicates keep their first position.
pub fn technologies(dataset: &Dataset, extra_tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tags = vec![];

    let candidates = dataset
        .records()
        .iter()
        .flat_map(|record| TECH_SEPARATOR.split(&record.technologies))
        .map(|entry| {
            if entry.contains('(') {
                ABBREVIATION
                    .captures_iter(entry)
                    .map(|c| c[1].to_string())
                    .collect::<String>()
            } else {
                entry.to_string()
            }
        })
        .map(|entry| WHITESPACE.replace_all(entry.trim(), "-").to_lowercase())
        .chain(extra_tags.iter().map(|t| t.trim().to_lowercase()));

    for tag in candidates {
        if tag.is_empty() {
            continue;
        }
        if seen.insert(tag.clone()) {
            tags.push(tag);
        }
    }

    tags
}

/// `{base}/questions/tagged/{tag}?tab=newest&page={page}`
pub fn tag_page_url(base_url: &str, tag: &str, page: u32) -> Result<Url, ScrapeError> {
    let invalid = |message: String| ScrapeError::InvalidUrl {
        url: base_url.to_string(),
        message,
    };

    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("cannot be a base".to_string()))?
        .pop_if_empty()
        .extend(["questions", "tagged", tag]);
    url.query_pairs_mut()
        .append_pair("tab", "newest")
        .append_pair("page", &page.to_string());
    Ok(url)
}

fn selector(raw: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(raw).map_err(|e| ScrapeError::Selector(format!("{raw:?}: {e:?}")))
}

/// Absolute question links of one tag listing page.
pub fn parse_question_links(
    html: &str,
    page_url: &Url,
    config: &ScrapeConfig,
) -> Result<Vec<String>, ScrapeError> {
    let summary_selector = selector(&config.summary_selector)?;
    let link_selector = selector(&config.link_selector)?;

    let document = Html::parse_document(html);
    let links = document
        .select(&summary_selector)
        .filter_map(|summary| summary.select(&link_selector).next())
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .map(|url| url.to_string())
        .collect();

    Ok(links)
}

/// Corpus lines of one question page: the title, then every paragraph
/// sentence, cleaned. Blank lines are dropped.
pub fn parse_question_page(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let mut raw = vec![];
    if let Ok(title) = Selector::parse("title") {
        if let Some(title) = document.select(&title).next() {
            raw.push(title.text().collect::<String>());
        }
    }
    if let Ok(paragraph) = Selector::parse("p") {
        for p in document.select(&paragraph) {
            let inner = p.inner_html();
            raw.extend(split_sentences(&inner).into_iter().map(str::to_string));
        }
    }

    raw.iter()
        .map(|text| normalize_scraped(text))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

fn progress_bar(len: usize, prefix: &str) -> ProgressBar {
    let style = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let bar = ProgressBar::new(len as u64).with_style(style);
    bar.set_prefix(prefix.to_string());
    bar
}

/// Question links for the first `pages_per_tag` listing pages of every tag.
pub fn question_links(
    fetcher: &dyn PageFetcher,
    tags: &[String],
    config: &ScrapeConfig,
) -> Result<Vec<String>, ScrapeError> {
    let delay = Duration::from_millis(config.delay_ms);
    let mut seen = HashSet::new();
    let mut links = vec![];

    let bar = progress_bar(tags.len(), "tags");
    for tag in tags {
        bar.set_message(tag.clone());
        let mut found = 0;

        for page in 1..=config.pages_per_tag {
            let url = tag_page_url(&config.base_url, tag, page)?;
            sleep(delay);

            let html = match fetcher.fetch(url.as_str()) {
                Ok(html) => html,
                Err(err) => {
                    log::warn!("skipping {url}: {err}");
                    continue;
                }
            };

            for link in parse_question_links(&html, &url, config)? {
                found += 1;
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }
        }

        if found == 0 {
            log::info!("tag {tag:?} has no questions");
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    log::info!("Collected {} question links for {} tags", links.len(), tags.len());
    Ok(links)
}

/// Fetch `links` in `config.batches` batches, writing `corpus{i}.txt` per batch.
///
/// Batches are as even as possible and together cover every link. Returns
/// the written files in batch order.
pub fn scrape_batches(
    fetcher: &dyn PageFetcher,
    links: &[String],
    out_dir: &Path,
    config: &ScrapeConfig,
) -> Result<Vec<PathBuf>, ScrapeError> {
    if links.is_empty() {
        log::warn!("no question links to scrape");
        return Ok(vec![]);
    }

    let delay = Duration::from_millis(config.delay_ms);
    let batch_size = links.len().div_ceil(config.batches.max(1));
    let mut files = vec![];

    for (idx, batch) in links.chunks(batch_size).enumerate() {
        let number = idx + 1;
        sleep(delay);

        let bar = progress_bar(batch.len(), &format!("batch {number}"));
        let mut lines = vec![];
        for link in batch {
            sleep(delay);
            match fetcher.fetch(link) {
                Ok(html) => lines.extend(parse_question_page(&html)),
                Err(err) => log::warn!("skipping {link}: {err}"),
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        let path = out_dir.join(format!("corpus{number}.txt"));
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        storage::write_atomic(&path, content.as_bytes())?;

        log::info!("Batch {number}: {} lines from {} pages", lines.len(), batch.len());
        files.push(path);
    }

    Ok(files)
}

/// Append every batch file to the base corpus, rewriting it atomically.
///
/// A missing base corpus starts empty. Returns the number of appended lines.
pub fn merge_batches(batch_files: &[PathBuf], base_corpus: &Path) -> Result<usize, ScrapeError> {
    let mut content = match std::fs::read_to_string(base_corpus) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }

    let mut appended = 0;
    for file in batch_files {
        for line in std::fs::read_to_string(file)?.lines() {
            content.push_str(line);
            content.push('\n');
            appended += 1;
        }
    }

    storage::write_atomic(base_corpus, content.as_bytes())?;
    log::info!(
        "Merged {appended} lines from {} batches into {}",
        batch_files.len(),
        base_corpus.display()
    );
    Ok(appended)
}

/// Full scrape: tags from the dataset, question links, batch files, and
/// optionally the merge into the base corpus.
pub fn run_scrape(
    fetcher: &dyn PageFetcher,
    dataset: &Dataset,
    config: &ScrapeConfig,
    paths: &ArtifactPaths,
    merge: bool,
) -> Result<ScrapeReport, ScrapeError> {
    let _span = tracing::info_span!("scrape", dataset = dataset.path()).entered();

    let tags = technologies(dataset, &config.extra_tags);
    log::info!("Scraping {} tags: {}", tags.len(), tags.join(", "));

    let links = question_links(fetcher, &tags, config)?;
    let batch_files = scrape_batches(fetcher, &links, &paths.scrape_dir, config)?;

    if merge {
        merge_batches(&batch_files, &paths.base_corpus)?;
    }

    Ok(ScrapeReport {
        tags,
        links: links.len(),
        batch_files,
    })
}
