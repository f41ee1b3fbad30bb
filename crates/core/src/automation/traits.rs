//! Trait definitions for the automation surface.

use std::time::Duration;

use async_trait::async_trait;

use super::error::SurfaceError;

/// Keys that can be sent with [`AutomationSurface::press`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowDown,
    Enter,
    Tab,
}

/// One exclusively-owned browser session.
///
/// Selectors are CSS, or `text=<label>` to match an element by its visible text.
/// Every call may fail; callers treat any error as fatal for the current step.
#[async_trait]
pub trait AutomationSurface: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError>;

    async fn click(&self, selector: &str) -> Result<(), SurfaceError>;

    /// Replace the contents of an input.
    async fn fill(&self, selector: &str, text: &str) -> Result<(), SurfaceError>;

    async fn press(&self, selector: &str, key: Key) -> Result<(), SurfaceError>;

    /// Pick an option of a `<select>` by value.
    async fn select_option(&self, selector: &str, value: &str) -> Result<(), SurfaceError>;

    /// Whether a matching element is currently displayed. Missing counts as hidden.
    async fn is_visible(&self, selector: &str) -> Result<bool, SurfaceError>;

    async fn text_content(&self, selector: &str) -> Result<String, SurfaceError>;

    /// PNG bytes of the element, or of the whole page when `selector` is `None`.
    async fn screenshot(&self, selector: Option<&str>) -> Result<Vec<u8>, SurfaceError>;

    /// Wait until the selector matches. `Ok(false)` means the timeout elapsed.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, SurfaceError>;

    /// Wait until the current URL contains `fragment`. `Ok(false)` on timeout.
    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<bool, SurfaceError>;

    /// Release the session. Called exactly once by the owning run.
    async fn close(&self) -> Result<(), SurfaceError>;
}

/// Starts browser sessions.
#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    /// Returns the name of this launcher implementation.
    fn name(&self) -> &str;

    async fn launch(&self) -> Result<Box<dyn AutomationSurface>, SurfaceError>;
}
