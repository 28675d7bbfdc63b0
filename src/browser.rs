//! Page rendering for the old site
//!
//! Old site pages only contain the player and episode links after their
//! scripts ran, so they are fetched through a [`PageRenderer`]. A renderer is
//! opened per resolution as a [`RenderSession`], which closes it again when
//! dropped, whichever way the resolution ends.

use crate::http::{FetchError, HttpClient};
use crate::temp::{TempGuard, create_temp_dir};
use scraper::{Html, Selector};
use std::io;
use std::ops::Deref;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use thiserror::Error;

/// Virtual time budgets (ms) given to the page scripts on successive attempts
const RENDER_BUDGETS_MS: &[u32] = &[2_000, 5_000, 10_000];

/// Errors that can occur while rendering a page
#[derive(Debug, Error)]
pub enum RenderError {
    /// The browser binary could not be started
    #[error("Failed to launch browser {binary}: {source}")]
    Launch { binary: PathBuf, source: io::Error },

    /// The throwaway browser profile could not be created
    #[error("Failed to create browser profile: {0}")]
    Profile(#[source] io::Error),

    /// The page could not be rendered
    #[error("Failed to render {url}: {reason}")]
    Failed { url: String, reason: String },

    /// The awaited element never appeared
    #[error("Timed out waiting for '{selector}' on {url}")]
    Timeout { url: String, selector: String },

    /// The page could not be fetched
    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] FetchError),
}

/// Produces the markup of a page after its scripts ran
pub trait PageRenderer {
    /// Renders `url`, waiting until an element matching the CSS selector
    /// `wait_for` is present when one is given.
    fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String, RenderError>;

    /// Releases whatever the renderer holds
    fn close(&mut self) {}
}

/// Opens renderers
pub trait RendererFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn PageRenderer>, RenderError>;
}

/// An open renderer, closed when dropped
pub struct RenderSession {
    renderer: Box<dyn PageRenderer>,
}

impl RenderSession {
    pub fn open(factory: &dyn RendererFactory) -> Result<Self, RenderError> {
        tracing::debug!("opening render session");
        Ok(Self {
            renderer: factory.open()?,
        })
    }
}

impl Deref for RenderSession {
    type Target = dyn PageRenderer;

    fn deref(&self) -> &Self::Target {
        self.renderer.as_ref()
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.renderer.close();
        tracing::debug!("render session closed");
    }
}

/// True if `html` contains an element matching `selector`
///
/// An invalid selector matches nothing.
pub fn page_contains(html: &str, selector: &str) -> bool {
    match Selector::parse(selector) {
        Ok(selector) => Html::parse_document(html).select(&selector).next().is_some(),
        Err(_) => false,
    }
}

/// Renderer returning the page source as served, without running scripts
pub struct HttpPageRenderer {
    http: Arc<dyn HttpClient>,
}

impl HttpPageRenderer {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

impl PageRenderer for HttpPageRenderer {
    fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String, RenderError> {
        let html = self.http.get_text(url)?;

        if let Some(selector) = wait_for {
            if !page_contains(&html, selector) {
                return Err(RenderError::Timeout {
                    url: url.to_string(),
                    selector: selector.to_string(),
                });
            }
        }

        Ok(html)
    }
}

/// Renderer driving a Chromium compatible browser in headless mode
///
/// Each page is rendered with `--dump-dom` in a throwaway profile directory
/// that lives as long as the renderer.
pub struct HeadlessBrowser {
    binary: PathBuf,
    /// Hide the browser's own diagnostic output
    silent: bool,
    profile: Option<TempGuard>,
}

impl HeadlessBrowser {
    /// Checks that `binary` runs and prepares a profile directory
    pub fn launch(binary: PathBuf, silent: bool) -> Result<Self, RenderError> {
        Command::new(&binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| RenderError::Launch {
                binary: binary.clone(),
                source: e,
            })?;

        let profile = create_temp_dir("nrk_downloader_profile").map_err(RenderError::Profile)?;

        Ok(Self {
            binary,
            silent,
            profile: Some(profile),
        })
    }

    fn dump_dom(&self, url: &str, budget_ms: u32) -> Result<String, RenderError> {
        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--disable-gpu")
            .arg(format!("--virtual-time-budget={budget_ms}"))
            .arg("--dump-dom");

        if let Some(profile) = &self.profile {
            command.arg(format!("--user-data-dir={}", profile.display()));
        }

        let output = command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(if self.silent {
                Stdio::null()
            } else {
                Stdio::inherit()
            })
            .output()
            .map_err(|e| RenderError::Launch {
                binary: self.binary.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                url: url.to_string(),
                reason: format!("browser exited with {:?}", output.status.code()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Renders with each budget in turn until `selector` matches
fn render_until<F>(
    url: &str,
    selector: &str,
    budgets: &[u32],
    mut render: F,
) -> Result<String, RenderError>
where
    F: FnMut(u32) -> Result<String, RenderError>,
{
    for &budget in budgets {
        let html = render(budget)?;
        if page_contains(&html, selector) {
            return Ok(html);
        }
        tracing::debug!(url, selector, budget, "element not rendered yet");
    }

    Err(RenderError::Timeout {
        url: url.to_string(),
        selector: selector.to_string(),
    })
}

impl PageRenderer for HeadlessBrowser {
    fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String, RenderError> {
        match wait_for {
            Some(selector) => render_until(url, selector, RENDER_BUDGETS_MS, |budget| {
                self.dump_dom(url, budget)
            }),
            None => self.dump_dom(url, RENDER_BUDGETS_MS[0]),
        }
    }

    fn close(&mut self) {
        // Dropping the guard removes the profile directory
        self.profile.take();
    }
}

/// Which renderer legacy resolutions use
#[derive(Clone)]
pub enum RendererKind {
    /// Plain HTTP fetches
    Http(Arc<dyn HttpClient>),
    /// A headless browser binary
    Browser { binary: PathBuf, silent: bool },
}

impl RendererFactory for RendererKind {
    fn open(&self) -> Result<Box<dyn PageRenderer>, RenderError> {
        match self {
            RendererKind::Http(http) => Ok(Box::new(HttpPageRenderer::new(Arc::clone(http)))),
            RendererKind::Browser { binary, silent } => {
                Ok(Box::new(HeadlessBrowser::launch(binary.clone(), *silent)?))
            }
        }
    }
}
