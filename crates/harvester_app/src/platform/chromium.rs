//! Chromium-backed [`Document`] using chromiumoxide.
//!
//! Elements are tracked page-side in `window.__harvest`, a registry mapping
//! small integer ids to weakly held nodes, so handles survive between
//! evaluations without pinning detached nodes.
//! The registry is rebuilt lazily after every navigation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::page::Page;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures::StreamExt;
use harvester_engine::{Document, DocumentError, ElementHandle, Key, Query, ScriptAction};
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

const REGISTRY: &str = r#"
const reg = window.__harvest || (window.__harvest = { next: 1, ids: new WeakMap(), els: new Map() });
const idOf = (node) => {
  let id = reg.ids.get(node);
  if (id === undefined) { id = reg.next++; reg.ids.set(node, id); }
  reg.els.set(id, new WeakRef(node));
  return id;
};
const get = (id) => {
  const ref = reg.els.get(id);
  const node = ref && ref.deref();
  if (!node || !node.isConnected) {
    reg.els.delete(id);
    throw new Error('stale:' + id);
  }
  return node;
};
"#;

const STALE_MARKER: &str = "stale:";

/// Owns the browser process and the task pumping its CDP events.
pub struct ChromiumBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(headless: bool, executable: Option<&str>) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .window_size(1920, 1080);
        if !headless {
            builder = builder.with_head();
        }
        if let Some(path) = executable {
            builder = builder.chrome_executable(PathBuf::from(path));
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    engine_debug!("Browser event error: {}", err);
                }
            }
        });
        engine_info!("Chromium launched (headless: {})", headless);

        Ok(Self { browser, handler })
    }

    pub async fn open_document(&self, navigation_timeout: Duration) -> Result<ChromiumDocument> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        Ok(ChromiumDocument {
            page,
            navigation_timeout,
        })
    }

    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            engine_warn!("Browser did not close cleanly: {}", err);
        }
        let _ = self.browser.wait().await;
        self.handler.abort();
    }
}

pub struct ChromiumDocument {
    page: Page,
    navigation_timeout: Duration,
}

impl ChromiumDocument {
    /// Runs `body` inside a function that has the element registry in scope.
    async fn eval<T: DeserializeOwned>(&self, body: &str) -> Result<T, String> {
        let script = format!("(() => {{ {REGISTRY}\n{body} }})()");
        self.page
            .evaluate(script.as_str())
            .await
            .map_err(|err| err.to_string())?
            .into_value::<T>()
            .map_err(|err| err.to_string())
    }

    /// Like [`eval`](Self::eval) for scripts about one element.
    async fn eval_on<T: DeserializeOwned>(
        &self,
        element: ElementHandle,
        body: &str,
    ) -> Result<T, DocumentError> {
        let body = format!("const el = get({});\n{body}", element.0);
        self.eval(&body).await.map_err(|message| {
            if message.contains(STALE_MARKER) {
                DocumentError::StaleElement(element)
            } else {
                DocumentError::ElementLookupFailed(message)
            }
        })
    }

    async fn act(&self, element: ElementHandle, body: &str) -> Result<(), DocumentError> {
        let body = format!("{body}\nreturn true;");
        self.eval_on::<bool>(element, &body)
            .await
            .map(|_| ())
            .map_err(|err| match err {
                DocumentError::ElementLookupFailed(message) => DocumentError::ActionFailed(message),
                other => other,
            })
    }

    async fn dispatch_key(&self, kind: DispatchKeyEventType, key: Key) -> Result<(), DocumentError> {
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(key.name())
            .code(key.name())
            .windows_virtual_key_code(virtual_key_code(key))
            .native_virtual_key_code(virtual_key_code(key))
            .build()
            .map_err(DocumentError::ActionFailed)?;
        self.page
            .execute(params)
            .await
            .map(|_| ())
            .map_err(|err| DocumentError::ActionFailed(err.to_string()))
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn scope_expr(scope: Option<ElementHandle>) -> String {
    match scope {
        Some(handle) => format!("get({})", handle.0),
        None => "document".to_string(),
    }
}

fn virtual_key_code(key: Key) -> i64 {
    match key {
        Key::PageUp => 33,
        Key::PageDown => 34,
        Key::End => 35,
        Key::Home => 36,
        Key::ArrowLeft => 37,
        Key::ArrowUp => 38,
        Key::ArrowRight => 39,
        Key::ArrowDown => 40,
    }
}

#[async_trait]
impl Document for ChromiumDocument {
    async fn load(&self, url: &str) -> Result<(), DocumentError> {
        let load_error = |message: String| DocumentError::Load {
            url: url.to_string(),
            message,
        };
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => return Err(load_error(err.to_string())),
            Err(_) => {
                return Err(load_error(format!(
                    "navigation timed out after {:?}",
                    self.navigation_timeout
                )))
            }
        }
        if let Err(err) = self.page.wait_for_navigation().await {
            engine_debug!("Waiting for navigation to settle failed: {}", err);
        }
        Ok(())
    }

    async fn title(&self) -> Result<String, DocumentError> {
        self.eval("return document.title || '';")
            .await
            .map_err(DocumentError::ElementLookupFailed)
    }

    async fn query(
        &self,
        scope: Option<ElementHandle>,
        query: &Query,
    ) -> Result<Vec<ElementHandle>, DocumentError> {
        let root = scope_expr(scope);
        let body = match query {
            Query::Css(expr) => format!(
                "return Array.from({root}.querySelectorAll({})).map(idOf);",
                js_string(expr)
            ),
            Query::Path(expr) => format!(
                "const found = document.evaluate({}, {root}, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                 const ids = [];
                 for (let i = 0; i < found.snapshotLength; i++) {{
                   const node = found.snapshotItem(i);
                   if (node.nodeType === Node.ELEMENT_NODE) {{ ids.push(idOf(node)); }}
                 }}
                 return ids;",
                js_string(expr)
            ),
        };
        let ids: Vec<u64> = self.eval(&body).await.map_err(|message| {
            if message.contains(STALE_MARKER) {
                DocumentError::ElementLookupFailed(format!("scope for {query} is stale"))
            } else {
                DocumentError::InvalidQuery {
                    query: query.to_string(),
                    message,
                }
            }
        })?;
        Ok(ids.into_iter().map(ElementHandle).collect())
    }

    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DocumentError> {
        let body = format!(
            "const value = el.getAttribute({});\nreturn value === null ? [] : [value];",
            js_string(name)
        );
        let values: Vec<String> = self.eval_on(element, &body).await?;
        Ok(values.into_iter().next())
    }

    async fn text(&self, element: ElementHandle) -> Result<String, DocumentError> {
        self.eval_on(element, "return (el.innerText || el.textContent || '').trim();")
            .await
    }

    async fn tag_name(&self, element: ElementHandle) -> Result<String, DocumentError> {
        self.eval_on(element, "return el.tagName.toLowerCase();").await
    }

    async fn style(
        &self,
        element: ElementHandle,
        property: &str,
    ) -> Result<Option<String>, DocumentError> {
        let body = format!(
            "const value = window.getComputedStyle(el).getPropertyValue({}).trim();\nreturn value ? [value] : [];",
            js_string(property)
        );
        let values: Vec<String> = self.eval_on(element, &body).await?;
        Ok(values.into_iter().next())
    }

    async fn execute(
        &self,
        element: ElementHandle,
        action: &ScriptAction,
    ) -> Result<(), DocumentError> {
        self.act(element, &action.to_js()).await
    }

    async fn click(&self, element: ElementHandle) -> Result<(), DocumentError> {
        self.act(
            element,
            "el.scrollIntoView({ block: 'nearest', inline: 'nearest' });\nel.click();",
        )
        .await
    }

    async fn press_key(&self, element: ElementHandle, key: Key) -> Result<(), DocumentError> {
        self.act(
            element,
            "if (!el.hasAttribute('tabindex')) { el.setAttribute('tabindex', '-1'); }\nel.focus({ preventScroll: true });",
        )
        .await?;
        self.dispatch_key(DispatchKeyEventType::KeyDown, key).await?;
        self.dispatch_key(DispatchKeyEventType::KeyUp, key).await
    }
}
