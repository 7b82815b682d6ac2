pub mod support;

mod scrape;
mod search;
