use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{LookupError, ScrapeError};
use crate::scraper::{Card, Document, Session};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CLOSE_GRACE: Duration = Duration::from_secs(10);

/// A running Chromium process plus the task pumping its CDP events.
///
/// Callers must hand the session back through [`Session::close`] on
/// every path, including errors.
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(headless: bool) -> Result<Self, ScrapeError> {
        info!("Starting browser (headless: {})", headless);

        let mut builder = BrowserConfig::builder().request_timeout(REQUEST_TIMEOUT);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(ScrapeError::BrowserConfig)?;

        let (browser, mut events) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        Ok(Self { browser, handler })
    }
}

impl Session for BrowserSession {
    type Page = Page;

    /// Open a tab and navigate it to `url`, returning once the document has loaded.
    async fn open(&self, url: &str) -> Result<Page, ScrapeError> {
        info!("Loading {}", url);
        Ok(self.browser.new_page(url).await?)
    }

    async fn close(mut self) {
        info!("Closing browser");
        shut_down(&mut self.browser, CLOSE_GRACE).await;
        self.handler.abort();
    }
}

/// Shutdown steps of a child browser process.
trait Process {
    async fn request_close(&mut self) -> anyhow::Result<()>;
    async fn wait_exit(&mut self) -> anyhow::Result<()>;
    async fn force_kill(&mut self) -> anyhow::Result<()>;
}

impl Process for Browser {
    async fn request_close(&mut self) -> anyhow::Result<()> {
        self.close().await?;
        Ok(())
    }

    async fn wait_exit(&mut self) -> anyhow::Result<()> {
        self.wait().await?;
        Ok(())
    }

    async fn force_kill(&mut self) -> anyhow::Result<()> {
        match self.kill().await {
            Some(result) => Ok(result?),
            None => Ok(()),
        }
    }
}

/// Ask the process to close, then wait at most `grace` for it to exit. The
/// process is killed if the close request fails or the wait runs out.
async fn shut_down<P: Process>(process: &mut P, grace: Duration) {
    if let Err(e) = process.request_close().await {
        warn!("Browser did not close cleanly ({}), killing it", e);
        if let Err(e) = process.force_kill().await {
            warn!("Failed to kill browser: {}", e);
        }
    }

    match tokio::time::timeout(grace, process.wait_exit()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed waiting for browser process: {}", e),
        Err(_) => {
            warn!("Browser still running after {:.0}s, killing it", grace.as_secs_f64());
            if let Err(e) = process.force_kill().await {
                warn!("Failed to kill browser: {}", e);
            }
        }
    }
}

fn class_selector(class: &str) -> String {
    format!(".{class}")
}

impl Document for Page {
    type Element = Element;

    async fn find_all(&self, class: &str) -> Result<Vec<Element>, LookupError> {
        Ok(self.find_elements(class_selector(class)).await?)
    }
}

impl Card for Element {
    async fn child_text(&self, class: &str) -> Result<String, LookupError> {
        let child = find_child(self, class).await?;
        Ok(child.inner_text().await?.unwrap_or_default())
    }

    async fn child_attribute(&self, class: &str, attr: &str) -> Result<Option<String>, LookupError> {
        let child = find_child(self, class).await?;
        Ok(child.attribute(attr).await?)
    }
}

async fn find_child(parent: &Element, class: &str) -> Result<Element, LookupError> {
    parent
        .find_element(class_selector(class))
        .await
        .map_err(|e| {
            debug!("Lookup of .{} failed: {}", class, e);
            LookupError::NotFound(class.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeProcess {
        close_fails: bool,
        ignores_close: bool,
        closed: bool,
        kills: usize,
    }

    impl Process for FakeProcess {
        async fn request_close(&mut self) -> anyhow::Result<()> {
            if self.close_fails {
                anyhow::bail!("connection reset");
            }
            self.closed = true;
            Ok(())
        }

        async fn wait_exit(&mut self) -> anyhow::Result<()> {
            if self.kills == 0 && !(self.closed && !self.ignores_close) {
                futures::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn force_kill(&mut self) -> anyhow::Result<()> {
            self.kills += 1;
            Ok(())
        }
    }

    async fn shut_down_quickly(process: &mut FakeProcess) {
        tokio::time::timeout(Duration::from_secs(5), shut_down(process, Duration::from_millis(20)))
            .await
            .expect("shutdown hung");
    }

    #[tokio::test]
    async fn clean_close_does_not_kill() {
        let mut process = FakeProcess::default();
        shut_down_quickly(&mut process).await;
        assert!(process.closed);
        assert_eq!(process.kills, 0);
    }

    #[tokio::test]
    async fn failed_close_kills_process() {
        let mut process = FakeProcess {
            close_fails: true,
            ..FakeProcess::default()
        };
        shut_down_quickly(&mut process).await;
        assert_eq!(process.kills, 1);
    }

    #[tokio::test]
    async fn process_that_never_exits_is_killed_after_grace() {
        let mut process = FakeProcess {
            ignores_close: true,
            ..FakeProcess::default()
        };
        shut_down_quickly(&mut process).await;
        assert!(process.closed);
        assert_eq!(process.kills, 1);
    }
}
