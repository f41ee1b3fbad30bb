//! Scripted browser surface for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::automation::{AutomationSurface, Key, SurfaceError, SurfaceLauncher};

/// An interaction recorded by [`MockSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Navigate(String),
    Click(String),
    Fill(String, String),
    Press(String, Key),
    Select(String, String),
    Screenshot(Option<String>),
}

#[derive(Debug, Default)]
struct Script {
    present: HashSet<String>,
    texts: HashMap<String, String>,
    failing: HashMap<String, String>,
    url_reached: bool,
    screenshot: Vec<u8>,
    calls: Vec<SurfaceCall>,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    launches: AtomicUsize,
    closes: AtomicUsize,
    fail_launch: AtomicBool,
}

impl Shared {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Mock implementation of the [`SurfaceLauncher`] trait.
///
/// Every launched [`MockSurface`] shares one script:
/// - selectors marked present match immediately, all others never appear
/// - selectors marked failing return a protocol error from any call
/// - every action is recorded for assertions
///
/// Waits never sleep, so a missing selector reports a timeout at once.
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    shared: Arc<Shared>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make selectors match.
    pub fn present<I, S>(&self, selectors: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut script = self.shared.script();
        script.present.extend(selectors.into_iter().map(Into::into));
        self
    }

    pub fn remove(&self, selector: &str) -> &Self {
        self.shared.script().present.remove(selector);
        self
    }

    /// Text returned for a selector; also marks it present.
    pub fn set_text(&self, selector: &str, text: &str) -> &Self {
        let mut script = self.shared.script();
        script.present.insert(selector.to_string());
        script.texts.insert(selector.to_string(), text.to_string());
        self
    }

    /// Any call targeting `selector` fails with `message`.
    pub fn fail_on(&self, selector: &str, message: &str) -> &Self {
        self.shared
            .script()
            .failing
            .insert(selector.to_string(), message.to_string());
        self
    }

    /// Whether `wait_for_url` succeeds.
    pub fn set_url_reached(&self, reached: bool) -> &Self {
        self.shared.script().url_reached = reached;
        self
    }

    pub fn set_screenshot(&self, png: Vec<u8>) -> &Self {
        self.shared.script().screenshot = png;
        self
    }

    pub fn set_fail_launch(&self, fail: bool) -> &Self {
        self.shared.fail_launch.store(fail, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.shared.script().calls.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SurfaceLauncher for MockLauncher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn launch(&self) -> Result<Box<dyn AutomationSurface>, SurfaceError> {
        if self.shared.fail_launch.load(Ordering::SeqCst) {
            return Err(SurfaceError::Launch("mock launch failure".to_string()));
        }
        self.shared.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSurface {
            shared: self.shared.clone(),
        }))
    }
}

/// Surface handed out by [`MockLauncher`].
#[derive(Debug)]
pub struct MockSurface {
    shared: Arc<Shared>,
}

impl MockSurface {
    /// Records the call unless the selector is scripted to fail.
    fn act(&self, selector: &str, call: SurfaceCall) -> Result<(), SurfaceError> {
        let mut script = self.shared.script();
        if let Some(message) = script.failing.get(selector) {
            return Err(SurfaceError::Protocol(message.clone()));
        }
        script.calls.push(call);
        Ok(())
    }

    fn check(&self, selector: &str) -> Result<bool, SurfaceError> {
        let script = self.shared.script();
        if let Some(message) = script.failing.get(selector) {
            return Err(SurfaceError::Protocol(message.clone()));
        }
        Ok(script.present.contains(selector))
    }
}

#[async_trait]
impl AutomationSurface for MockSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        self.act(url, SurfaceCall::Navigate(url.to_string()))
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        self.act(selector, SurfaceCall::Click(selector.to_string()))
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        self.act(
            selector,
            SurfaceCall::Fill(selector.to_string(), text.to_string()),
        )
    }

    async fn press(&self, selector: &str, key: Key) -> Result<(), SurfaceError> {
        self.act(selector, SurfaceCall::Press(selector.to_string(), key))
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), SurfaceError> {
        self.act(
            selector,
            SurfaceCall::Select(selector.to_string(), value.to_string()),
        )
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SurfaceError> {
        self.check(selector)
    }

    async fn text_content(&self, selector: &str) -> Result<String, SurfaceError> {
        if !self.check(selector)? {
            return Err(SurfaceError::not_found(selector));
        }
        Ok(self
            .shared
            .script()
            .texts
            .get(selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn screenshot(&self, selector: Option<&str>) -> Result<Vec<u8>, SurfaceError> {
        let mut script = self.shared.script();
        script
            .calls
            .push(SurfaceCall::Screenshot(selector.map(str::to_string)));
        Ok(script.screenshot.clone())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<bool, SurfaceError> {
        self.check(selector)
    }

    async fn wait_for_url(&self, _fragment: &str, _timeout: Duration) -> Result<bool, SurfaceError> {
        Ok(self.shared.script().url_reached)
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
