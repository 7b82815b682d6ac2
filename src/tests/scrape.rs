use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use crate::config::{ArtifactPaths, DatasetSchema, ScrapeConfig};
use crate::dataset::Dataset;
use crate::scrape::{
    merge_batches, parse_question_links, parse_question_page, question_links, run_scrape,
    scrape_batches, tag_page_url, technologies, PageFetcher, ScrapeError,
};
use crate::tests::support::write_rows;

const BASE: &str = "https://so.test";

/// Serves canned pages and records every requested url.
struct StubFetcher {
    pages: HashMap<String, String>,
    requested: RefCell<Vec<String>>,
}

impl StubFetcher {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            requested: RefCell::new(vec![]),
        }
    }

    fn listing(mut self, tag: &str, page: u32, hrefs: &[&str]) -> Self {
        let url = tag_page_url(BASE, tag, page).unwrap().to_string();
        self.pages.insert(url, listing_html(hrefs));
        self
    }

    fn question(mut self, id: u32, title: &str, body: &str) -> Self {
        self.pages.insert(
            format!("{BASE}/questions/{id}"),
            format!("<html><head><title>{title}</title></head><body><p>{body}</p></body></html>"),
        );
        self
    }
}

impl PageFetcher for StubFetcher {
    fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.requested.borrow_mut().push(url.to_string());
        self.pages.get(url).cloned().ok_or_else(|| ScrapeError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

fn listing_html(hrefs: &[&str]) -> String {
    let summaries: String = hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<div class="question-summary"><h3><a class="question-hyperlink" href="{href}">Q</a></h3></div>"#
            )
        })
        .collect();
    format!("<html><body><div class=\"sidebar\"><a class=\"question-hyperlink\" href=\"/questions/999\">hot</a></div>{summaries}</body></html>")
}

fn config(pages_per_tag: u32, batches: usize) -> ScrapeConfig {
    ScrapeConfig {
        base_url: BASE.to_string(),
        pages_per_tag,
        batches,
        delay_ms: 0,
        extra_tags: vec![],
        ..Default::default()
    }
}

fn dataset_with_technologies(dir: &Path, technologies: &[&str]) -> Dataset {
    let names: Vec<String> = (0..technologies.len()).map(|i| format!("P{i}")).collect();
    let rows: Vec<[&str; 10]> = technologies
        .iter()
        .zip(&names)
        .map(|(tech, name)| {
            ["1", "Area", name.as_str(), "d.", *tech, "C", "S", "2020", "T", "Yes"]
        })
        .collect();
    let path = write_rows(dir, &rows);
    Dataset::load(&path, &DatasetSchema::default()).unwrap()
}

// --- tags ---

#[test]
fn technologies_become_tag_slugs() {
    let tmp = tempfile::tempdir().unwrap();
    let dataset = dataset_with_technologies(
        tmp.path(),
        &[
            "Python, Natural Language Processing (NLP)",
            "Computer  Vision\nPython",
            "Machine Learning, ",
        ],
    );

    let tags = technologies(&dataset, &["NLP".to_string(), "cv".to_string()]);
    assert_eq!(
        tags,
        ["python", "nlp", "computer-vision", "machine-learning", "cv"]
    );
}

#[test]
fn tag_page_url_layout() {
    let url = tag_page_url("https://stackoverflow.com", "nlp", 2).unwrap();
    assert_eq!(
        url.as_str(),
        "https://stackoverflow.com/questions/tagged/nlp?tab=newest&page=2"
    );

    let url = tag_page_url("https://stackoverflow.com/", "c#", 1).unwrap();
    assert_eq!(url.path(), "/questions/tagged/c%23");

    assert!(matches!(
        tag_page_url("not a url", "nlp", 1),
        Err(ScrapeError::InvalidUrl { .. })
    ));
}

// --- parsing ---

#[test]
fn question_links_only_inside_summaries() {
    let page = tag_page_url(BASE, "rust", 1).unwrap();
    let html = listing_html(&["/questions/1", "https://other.test/questions/2"]);

    let links = parse_question_links(&html, &page, &config(1, 1)).unwrap();
    assert_eq!(
        links,
        ["https://so.test/questions/1", "https://other.test/questions/2"]
    );
}

#[test]
fn invalid_selector_is_reported() {
    let page = tag_page_url(BASE, "rust", 1).unwrap();
    let mut config = config(1, 1);
    config.summary_selector = "div[".to_string();

    assert!(matches!(
        parse_question_links("<html></html>", &page, &config),
        Err(ScrapeError::Selector(_))
    ));
}

#[test]
fn question_page_lines() {
    let html = "<html><head><title>Parse JSON in Rust - Stack Overflow</title></head><body>\
        <p>I have a <code>String</code>. How do I parse it?</p>\
        <p>Thanks for contributing an answer to Stack Overflow</p>\
        </body></html>";

    let lines = parse_question_page(html);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("parse json in rust"));
    assert!(!lines[0].contains("stack overflow"));
    assert_eq!(lines[1], "i have a string.");
    assert_eq!(lines[2], "how do i parse it?");
}

// --- fetching ---

#[test]
fn links_are_collected_deduplicated_and_failures_skipped() {
    let fetcher = StubFetcher::new()
        .listing("rust", 1, &["/questions/1", "/questions/2"])
        .listing("rust", 2, &["/questions/2", "/questions/3"])
        .listing("nlp", 2, &["/questions/4"]);
    let tags = vec!["rust".to_string(), "nlp".to_string()];

    let links = question_links(&fetcher, &tags, &config(2, 1)).unwrap();
    assert_eq!(
        links,
        [
            "https://so.test/questions/1",
            "https://so.test/questions/2",
            "https://so.test/questions/3",
            "https://so.test/questions/4",
        ]
    );
    // nlp page 1 failed and was not retried
    assert_eq!(fetcher.requested.borrow().len(), 4);
}

#[test]
fn batches_cover_every_link() {
    let tmp = tempfile::tempdir().unwrap();
    let fetcher = StubFetcher::new()
        .question(1, "First", "One.")
        .question(2, "Second", "Two.")
        .question(4, "Fourth", "Four.");
    let links: Vec<String> = (1..=4).map(|i| format!("{BASE}/questions/{i}")).collect();

    let files = scrape_batches(&fetcher, &links, tmp.path(), &config(1, 3)).unwrap();
    assert_eq!(
        files,
        [tmp.path().join("corpus1.txt"), tmp.path().join("corpus2.txt")]
    );
    assert_eq!(fetcher.requested.borrow().len(), 4);

    assert_eq!(
        std::fs::read_to_string(&files[0]).unwrap(),
        "first\none.\nsecond\ntwo.\n"
    );
    // question 3 is missing
    assert_eq!(std::fs::read_to_string(&files[1]).unwrap(), "fourth\nfour.\n");
}

#[test]
fn no_links_no_batches() {
    let tmp = tempfile::tempdir().unwrap();
    let files = scrape_batches(&StubFetcher::new(), &[], tmp.path(), &config(1, 3)).unwrap();
    assert!(files.is_empty());
}

// --- merging ---

#[test]
fn merge_appends_batches_to_base() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("corpus/base.txt");
    crate::storage::write_atomic(&base, b"existing").unwrap();

    let first = tmp.path().join("corpus1.txt");
    let second = tmp.path().join("corpus2.txt");
    std::fs::write(&first, "a\nb\n").unwrap();
    std::fs::write(&second, "c\n").unwrap();

    let appended = merge_batches(&[first, second], &base).unwrap();
    assert_eq!(appended, 3);
    assert_eq!(std::fs::read_to_string(&base).unwrap(), "existing\na\nb\nc\n");
}

#[test]
fn merge_into_missing_base_starts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let base = tmp.path().join("base.txt");
    let batch = tmp.path().join("corpus1.txt");
    std::fs::write(&batch, "only\n").unwrap();

    merge_batches(&[batch], &base).unwrap();
    assert_eq!(std::fs::read_to_string(&base).unwrap(), "only\n");
}

#[test]
fn full_scrape_merges_into_base_corpus() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::under(tmp.path());
    crate::storage::write_atomic(&paths.base_corpus, b"base line\n").unwrap();

    let dataset = dataset_with_technologies(tmp.path(), &["Rust"]);
    let fetcher = StubFetcher::new()
        .listing("rust", 1, &["/questions/7"])
        .question(7, "Borrowing", "The borrow checker complains.");

    let report = run_scrape(&fetcher, &dataset, &config(1, 2), &paths, true).unwrap();
    assert_eq!(report.tags, ["rust"]);
    assert_eq!(report.links, 1);
    assert_eq!(report.batch_files, [paths.scrape_dir.join("corpus1.txt")]);

    assert_eq!(
        std::fs::read_to_string(&paths.base_corpus).unwrap(),
        "base line\nborrowing\nthe borrow checker complains.\n"
    );
}
