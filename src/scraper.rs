use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::error::{CardFault, Field, LookupError, ScrapeError};
use crate::parser::details::normalize_details;
use crate::store::LessonRow;

pub const LESSONS_URL: &str = "https://www.engvid.com/english-lessons/";

const CARD_CLASS: &str = "lessonlinks_all_row";
const TITLE_CLASS: &str = "lessonlinks_all_lessontitle";
const LINK_CLASS: &str = "lessonlinks_all_lesson_link";
const DETAILS_CLASS: &str = "lessonlinks_all_category_list";

pub const RENDER_TIMEOUT: Duration = Duration::from_secs(20);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const PROGRESS_EVERY: usize = 200;

/// A loaded page whose elements can be looked up by class.
#[allow(async_fn_in_trait)]
pub trait Document {
    type Element: Card;

    /// All elements carrying `class`, in document order.
    async fn find_all(&self, class: &str) -> Result<Vec<Self::Element>, LookupError>;
}

/// One lesson card on the page.
#[allow(async_fn_in_trait)]
pub trait Card {
    /// Rendered text of the first descendant with `class`.
    async fn child_text(&self, class: &str) -> Result<String, LookupError>;

    /// Raw attribute of the first descendant with `class`; `None` if the
    /// element exists but lacks the attribute.
    async fn child_attribute(&self, class: &str, attr: &str) -> Result<Option<String>, LookupError>;
}

/// A browser session that can open pages and must be closed when done.
#[allow(async_fn_in_trait)]
pub trait Session: Sized {
    type Page: Document;

    async fn open(&self, url: &str) -> Result<Self::Page, ScrapeError>;

    /// Release the session. Never fails; problems are logged.
    async fn close(self);
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub url: String,
    pub render_timeout: Duration,
    pub poll_interval: Duration,
    pub headless: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: LESSONS_URL.to_string(),
            render_timeout: RENDER_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            headless: true,
        }
    }
}

/// Everything one pass over the cards produced.
#[derive(Debug, Default)]
pub struct ScrapeOutcome {
    pub total: usize,
    pub rows: Vec<LessonRow>,
    pub faults: Vec<CardFault>,
}

impl ScrapeOutcome {
    fn new(total: usize) -> Self {
        Self {
            total,
            rows: Vec::with_capacity(total),
            faults: Vec::new(),
        }
    }

    fn record(&mut self, result: Result<LessonRow, CardFault>) {
        match result {
            Ok(row) => self.rows.push(row),
            Err(fault) => {
                warn!("Skipping {}", fault);
                self.faults.push(fault);
            }
        }
    }
}

/// Launch a browser, scrape the lesson listing, and shut the browser down
/// whether or not the scrape succeeded.
pub async fn scrape_lessons(config: &ScrapeConfig) -> Result<ScrapeOutcome, ScrapeError> {
    let session = BrowserSession::launch(config.headless).await?;
    scrape_with_session(session, config).await
}

/// Scrape `config.url` through `session`, closing it on every path.
pub async fn scrape_with_session<S: Session>(
    session: S,
    config: &ScrapeConfig,
) -> Result<ScrapeOutcome, ScrapeError> {
    let result = async {
        let page = session.open(&config.url).await?;
        scrape_document(&page, config).await
    }
    .await;

    session.close().await;
    result
}

/// Wait for the cards to render, then extract every one of them.
pub async fn scrape_document<D: Document>(
    doc: &D,
    config: &ScrapeConfig,
) -> Result<ScrapeOutcome, ScrapeError> {
    wait_for_render(doc, CARD_CLASS, config.render_timeout, config.poll_interval).await?;

    let cards = doc.find_all(CARD_CLASS).await?;
    info!("Found {} lessons, extracting", cards.len());
    if cards.is_empty() {
        warn!("Card list is empty after render");
    }

    Ok(extract_cards(&cards).await)
}

/// Poll until at least one element with `marker` exists or `limit` elapses.
pub async fn wait_for_render<D: Document>(
    doc: &D,
    marker: &str,
    limit: Duration,
    poll: Duration,
) -> Result<(), ScrapeError> {
    info!("Waiting up to {:.0}s for .{} to render", limit.as_secs_f64(), marker);
    let start = Instant::now();
    let mut last_error: Option<LookupError> = None;

    let ready = tokio::time::timeout(limit, async {
        loop {
            match doc.find_all(marker).await {
                Ok(found) if !found.is_empty() => return found.len(),
                Ok(_) => {}
                Err(e) => {
                    if last_error.is_none() {
                        warn!("Render check failed, will keep polling: {}", e);
                    } else {
                        debug!("Render check failed: {}", e);
                    }
                    last_error = Some(e);
                }
            }
            tokio::time::sleep(poll).await;
        }
    })
    .await;

    match ready {
        Ok(count) => {
            info!(
                "Content rendered after {:.2}s ({} elements)",
                start.elapsed().as_secs_f64(),
                count
            );
            Ok(())
        }
        Err(_) => Err(ScrapeError::GateTimeout {
            marker: marker.to_string(),
            waited: limit,
            last_error: last_error.map(|e| e.to_string()),
        }),
    }
}

/// Extract cards strictly in order. A bad card is logged and skipped; its
/// ordinal is not reused, so ids gap where cards failed.
pub async fn extract_cards<C: Card>(cards: &[C]) -> ScrapeOutcome {
    let total = cards.len();
    let mut outcome = ScrapeOutcome::new(total);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    for (ordinal, card) in (1..).zip(cards) {
        outcome.record(extract_card(ordinal, card).await);
        if ordinal % PROGRESS_EVERY == 0 {
            info!("... processed {} of {}", ordinal, total);
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Extracted {} lessons ({} ok, {} skipped)",
        outcome.total,
        outcome.rows.len(),
        outcome.faults.len()
    );
    outcome
}

/// Read title, link and details from one card. Any failed lookup abandons the card.
pub async fn extract_card<C: Card>(ordinal: usize, card: &C) -> Result<LessonRow, CardFault> {
    let fault = |field: Field| move |source: LookupError| CardFault { ordinal, field, source };

    let title = card.child_text(TITLE_CLASS).await.map_err(fault(Field::Title))?;
    let url = card
        .child_attribute(LINK_CLASS, "href")
        .await
        .map_err(fault(Field::Link))?
        .unwrap_or_default();
    let details = card.child_text(DETAILS_CLASS).await.map_err(fault(Field::Details))?;

    Ok(LessonRow {
        id: ordinal,
        title: title.trim().to_string(),
        details: normalize_details(&details),
        url,
    })
}
