use std::error::Error;
use std::time::Duration;

use reqwest::StatusCode;

const USER_AGENT_DEFAULT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:124.0) Gecko/20100101 Firefox/124.0";

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("{url}: request failed: {message}")]
    Http { url: String, message: String },

    #[error("{url}: unexpected status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),
}

/// Fetches the HTML body of a page. One attempt per call.
pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<String, ScrapeError>;
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT_DEFAULT)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| ScrapeError::Http {
                url: String::new(),
                message: get_error(&err),
            })?;

        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        log::debug!("{url}: requesting");

        let resp = self.client.get(url).send().map_err(|err| ScrapeError::Http {
            url: url.to_string(),
            message: get_error(&err),
        })?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.text().map_err(|err| ScrapeError::Http {
            url: url.to_string(),
            message: get_error(&err),
        })
    }
}
