use std::fmt;
use std::time::Duration;

use chromiumoxide::error::CdpError;
use thiserror::Error;

/// Fatal conditions of a scrape run. Anything here ends the run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid browser configuration: {0}")]
    BrowserConfig(String),

    #[error("browser error: {0}")]
    Browser(#[from] CdpError),

    #[error("failed to enumerate cards: {0}")]
    Enumerate(#[from] LookupError),

    #[error(
        "no element with class `{marker}` appeared within {}s{}",
        .waited.as_secs_f64(),
        last_error_suffix(.last_error)
    )]
    GateTimeout {
        marker: String,
        waited: Duration,
        /// The last lookup failure seen while polling, if any.
        last_error: Option<String>,
    },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(e) => format!(" (last lookup error: {e})"),
        None => String::new(),
    }
}

/// A single sub-element lookup that failed inside a card.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no child with class `{0}`")]
    NotFound(String),

    #[error("browser error: {0}")]
    Browser(#[from] CdpError),
}

/// Which of a card's fields could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Link,
    Details,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Title => "title",
            Field::Link => "link",
            Field::Details => "details",
        })
    }
}

/// A card that was abandoned. Recoverable: the loop logs it and moves on.
#[derive(Debug, Error)]
#[error("card #{ordinal}: {field} lookup failed: {source}")]
pub struct CardFault {
    pub ordinal: usize,
    pub field: Field,
    #[source]
    pub source: LookupError,
}

/// Problems with the shape of a lessons CSV file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("missing column `{0}` in header")]
    MissingColumn(&'static str),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
