//! In-memory collaborators for tests

use crate::browser::{PageRenderer, RenderError, RendererFactory, page_contains};
use crate::http::{FetchError, HttpClient};
use crate::orchestrator::CancellationToken;
use crate::remux::{RemuxError, RemuxOutput, Remuxer};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// HTTP client answering from a fixed URL → body table; unknown URLs are 404
#[derive(Default)]
pub(crate) struct FakeHttp {
    responses: HashMap<String, Result<String, u16>>,
    requests: Mutex<Vec<String>>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.responses.insert(url.to_string(), Err(status));
        self
    }

    /// Cancels `token` when a requested URL contains `pattern`
    pub fn cancelling_on(mut self, pattern: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((pattern.to_string(), token));
        self
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpClient for FakeHttp {
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        if let Some((pattern, token)) = &self.cancel_on {
            if url.contains(pattern.as_str()) {
                token.cancel();
            }
        }

        match self.responses.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::NotFound(url.to_string())),
        }
    }
}

/// Remuxer recording its calls, optionally failing or cancelling on a given call
///
/// Like ffmpeg it writes the destination file, also on a failing call.
#[derive(Default)]
pub(crate) struct FakeRemuxer {
    calls: Mutex<Vec<(String, PathBuf)>>,
    fail_on_call: Option<usize>,
    cancel_after_call: Option<(usize, CancellationToken)>,
}

impl FakeRemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the n-th call (1-based)
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Cancels `token` once the n-th call (1-based) has completed
    pub fn cancelling_after(mut self, call: usize, token: CancellationToken) -> Self {
        self.cancel_after_call = Some((call, token));
        self
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Remuxer for FakeRemuxer {
    fn remux(&self, source: &str, destination: &Path) -> Result<RemuxOutput, RemuxError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((source.to_string(), destination.to_path_buf()));
            calls.len()
        };

        fs::write(destination, source).unwrap();

        if let Some((after, token)) = &self.cancel_after_call {
            if call >= *after {
                token.cancel();
            }
        }

        if self.fail_on_call == Some(call) {
            return Err(RemuxError::ExitStatus {
                tool: "ffmpeg".to_string(),
                code: Some(1),
                stderr: "Server returned 403 Forbidden".to_string(),
            });
        }

        Ok(RemuxOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Renderer answering from a fixed URL → page table
///
/// A page without the awaited element times out, as with the real renderers.
pub(crate) struct FakeRenderer {
    pages: HashMap<String, String>,
    closed: Arc<AtomicBool>,
}

impl FakeRenderer {
    pub fn new(closed: Arc<AtomicBool>) -> Self {
        Self {
            pages: HashMap::new(),
            closed,
        }
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

impl PageRenderer for FakeRenderer {
    fn render(&self, url: &str, wait_for: Option<&str>) -> Result<String, RenderError> {
        let html = self.pages.get(url).ok_or_else(|| RenderError::Failed {
            url: url.to_string(),
            reason: "no such page".to_string(),
        })?;

        match wait_for {
            Some(selector) if !page_contains(html, selector) => Err(RenderError::Timeout {
                url: url.to_string(),
                selector: selector.to_string(),
            }),
            _ => Ok(html.clone()),
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory opening a [`FakeRenderer`] over the same pages each time
pub(crate) struct FakeRendererFactory {
    pages: Vec<(String, String)>,
    closed: Arc<AtomicBool>,
}

impl FakeRendererFactory {
    pub fn new(closed: Arc<AtomicBool>) -> Self {
        Self {
            pages: Vec::new(),
            closed,
        }
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.push((url.to_string(), html.to_string()));
        self
    }
}

impl RendererFactory for FakeRendererFactory {
    fn open(&self) -> Result<Box<dyn PageRenderer>, RenderError> {
        let renderer = self
            .pages
            .iter()
            .fold(FakeRenderer::new(Arc::clone(&self.closed)), |renderer, (url, html)| {
                renderer.with_page(url, html)
            });
        Ok(Box::new(renderer))
    }
}
