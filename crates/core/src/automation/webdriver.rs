//! W3C WebDriver backed browser sessions.
//!
//! Talks plain JSON over HTTP to a driver (chromedriver, geckodriver or a
//! Selenium grid) at `browser.webdriver_url`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;

use super::{AutomationSurface, Key, SurfaceError, SurfaceLauncher};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Envelope of every WebDriver response.
#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// How an element is located.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Locator {
    using: &'static str,
    value: String,
}

/// Translate a surface selector into a WebDriver locator.
///
/// `text=Foo` matches any element whose trimmed text is exactly `Foo`.
fn locator(selector: &str) -> Locator {
    match selector.strip_prefix("text=") {
        Some(text) => {
            let literal = if text.contains('\'') {
                format!("\"{}\"", text)
            } else {
                format!("'{}'", text)
            };
            Locator {
                using: "xpath",
                value: format!("//*[normalize-space(text())={}]", literal),
            }
        }
        None => Locator {
            using: "css selector",
            value: selector.to_string(),
        },
    }
}

fn key_code(key: Key) -> &'static str {
    match key {
        Key::ArrowDown => "\u{E015}",
        Key::Enter => "\u{E007}",
        Key::Tab => "\u{E004}",
    }
}

fn wire_error(value: Value) -> SurfaceError {
    match serde_json::from_value::<WireError>(value) {
        Ok(err) if err.error == "no such element" => SurfaceError::not_found(err.message),
        Ok(err) if err.error == "timeout" => SurfaceError::timeout(err.message, 0),
        Ok(err) => SurfaceError::Protocol(format!("{}: {}", err.error, err.message)),
        Err(e) => SurfaceError::Protocol(format!("unreadable error response: {}", e)),
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, SurfaceError> {
    let mut request = client.request(method.clone(), url);
    if method == Method::POST {
        request = request.json(&body.unwrap_or_else(|| json!({})));
    }

    let response = request.send().await?;
    let status = response.status();
    let payload: WireResponse = response
        .json()
        .await
        .map_err(|e| SurfaceError::Protocol(format!("invalid response from {}: {}", url, e)))?;

    if status.is_success() {
        Ok(payload.value)
    } else {
        Err(wire_error(payload.value))
    }
}

/// Starts WebDriver sessions.
pub struct WebDriverLauncher {
    client: Client,
    config: BrowserConfig,
}

impl WebDriverLauncher {
    pub fn new(config: BrowserConfig) -> Result<Self, SurfaceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config.webdriver_url.trim_end_matches('/')
    }

    fn capabilities(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--no-first-run".to_string(),
            "--disable-extensions".to_string(),
            "--disable-default-apps".to_string(),
            format!(
                "--window-size={},{}",
                self.config.window_width, self.config.window_height
            ),
        ];
        if self.config.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(ref agent) = self.config.user_agent {
            args.push(format!("--user-agent={}", agent));
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "timeouts": {
                        "implicit": 0,
                        "pageLoad": self.config.page_load_timeout_secs * 1000,
                    },
                    "goog:chromeOptions": { "args": args },
                }
            }
        })
    }
}

#[async_trait]
impl SurfaceLauncher for WebDriverLauncher {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn launch(&self) -> Result<Box<dyn AutomationSurface>, SurfaceError> {
        let url = format!("{}/session", self.base_url());
        let value = send(&self.client, Method::POST, &url, Some(self.capabilities()))
            .await
            .map_err(|e| SurfaceError::Launch(e.to_string()))?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| SurfaceError::Launch("driver returned no session id".to_string()))?;

        info!("Started WebDriver session {}", session_id);

        Ok(Box::new(WebDriverSurface {
            client: self.client.clone(),
            session_url: format!(
                "{}/session/{}",
                self.base_url(),
                urlencoding::encode(session_id)
            ),
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
        }))
    }
}

/// One WebDriver session.
pub struct WebDriverSurface {
    client: Client,
    session_url: String,
    poll_interval: Duration,
}

impl WebDriverSurface {
    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, SurfaceError> {
        let url = format!("{}{}", self.session_url, path);
        send(&self.client, method, &url, body).await
    }

    async fn find(&self, selector: &str) -> Result<String, SurfaceError> {
        let locator = locator(selector);
        let value = self
            .call(
                Method::POST,
                "/element",
                Some(json!({ "using": locator.using, "value": locator.value })),
            )
            .await
            .map_err(|e| match e {
                SurfaceError::NotFound { .. } => SurfaceError::not_found(selector),
                other => other,
            })?;

        value
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| urlencoding::encode(id).into_owned())
            .ok_or_else(|| SurfaceError::Protocol("element reference missing".to_string()))
    }

    async fn element_call(
        &self,
        method: Method,
        element: &str,
        action: &str,
        body: Option<Value>,
    ) -> Result<Value, SurfaceError> {
        self.call(method, &format!("/element/{}/{}", element, action), body)
            .await
    }

    fn decode_png(value: Value) -> Result<Vec<u8>, SurfaceError> {
        let encoded = value
            .as_str()
            .ok_or_else(|| SurfaceError::Protocol("screenshot is not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SurfaceError::Protocol(format!("invalid screenshot data: {}", e)))
    }
}

#[async_trait]
impl AutomationSurface for WebDriverSurface {
    async fn navigate(&self, url: &str) -> Result<(), SurfaceError> {
        debug!("navigate {}", url);
        self.call(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn click(&self, selector: &str) -> Result<(), SurfaceError> {
        let element = self.find(selector).await?;
        self.element_call(Method::POST, &element, "click", None)
            .await
            .map(|_| ())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), SurfaceError> {
        let element = self.find(selector).await?;
        self.element_call(Method::POST, &element, "clear", None)
            .await?;
        self.element_call(Method::POST, &element, "value", Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    async fn press(&self, selector: &str, key: Key) -> Result<(), SurfaceError> {
        let element = self.find(selector).await?;
        self.element_call(
            Method::POST,
            &element,
            "value",
            Some(json!({ "text": key_code(key) })),
        )
        .await
        .map(|_| ())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<(), SurfaceError> {
        let select = self.find(selector).await?;
        let option = self
            .element_call(
                Method::POST,
                &select,
                "element",
                Some(json!({
                    "using": "css selector",
                    "value": format!("option[value='{}']", value),
                })),
            )
            .await
            .map_err(|e| match e {
                SurfaceError::NotFound { .. } => {
                    SurfaceError::not_found(format!("{} option[value='{}']", selector, value))
                }
                other => other,
            })?;
        let option_id = option
            .get(ELEMENT_KEY)
            .and_then(Value::as_str)
            .map(|id| urlencoding::encode(id).into_owned())
            .ok_or_else(|| SurfaceError::Protocol("element reference missing".to_string()))?;
        self.element_call(Method::POST, &option_id, "click", None)
            .await
            .map(|_| ())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SurfaceError> {
        let element = match self.find(selector).await {
            Ok(element) => element,
            Err(SurfaceError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        let value = self
            .element_call(Method::GET, &element, "displayed", None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text_content(&self, selector: &str) -> Result<String, SurfaceError> {
        let element = self.find(selector).await?;
        let value = self.element_call(Method::GET, &element, "text", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&self, selector: Option<&str>) -> Result<Vec<u8>, SurfaceError> {
        let value = match selector {
            Some(selector) => {
                let element = self.find(selector).await?;
                self.element_call(Method::GET, &element, "screenshot", None)
                    .await?
            }
            None => self.call(Method::GET, "/screenshot", None).await?,
        };
        Self::decode_png(value)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.find(selector).await {
                Ok(_) => return Ok(true),
                Err(SurfaceError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<bool, SurfaceError> {
        let deadline = Instant::now() + timeout;
        loop {
            let value = self.call(Method::GET, "/url", None).await?;
            if value.as_str().is_some_and(|url| url.contains(fragment)) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        match self.call(Method::DELETE, "", None).await {
            Ok(_) => {
                info!("Closed WebDriver session");
                Ok(())
            }
            Err(e) => {
                warn!("Failed to close WebDriver session: {}", e);
                Err(e)
            }
        }
    }
}
