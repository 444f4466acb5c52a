//! The query-and-inspect capability the harvester drives.
//!
//! Implementations wrap a rendering engine (a real browser, or a parsed
//! snapshot for offline runs and tests). Every call is awaited in sequence by
//! one controller; implementations need not support concurrent interaction.
use std::fmt;

use async_trait::async_trait;

/// Opaque reference to an element inside the current document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A structural lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Absolute element path such as `/html/body/div[3]/div`. Ignores scope.
    Path(String),
    /// CSS selector, matched against descendants of the scope.
    Css(String),
}

impl Query {
    pub fn path(expr: impl Into<String>) -> Self {
        Query::Path(expr.into())
    }

    pub fn css(expr: impl Into<String>) -> Self {
        Query::Css(expr.into())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Path(expr) => write!(f, "path {expr}"),
            Query::Css(expr) => write!(f, "css {expr}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowRight,
    ArrowLeft,
    ArrowDown,
    ArrowUp,
    PageDown,
    PageUp,
    End,
    Home,
}

impl Key {
    /// DOM `KeyboardEvent.key` value.
    pub fn name(self) -> &'static str {
        match self {
            Key::ArrowRight => "ArrowRight",
            Key::ArrowLeft => "ArrowLeft",
            Key::ArrowDown => "ArrowDown",
            Key::ArrowUp => "ArrowUp",
            Key::PageDown => "PageDown",
            Key::PageUp => "PageUp",
            Key::End => "End",
            Key::Home => "Home",
        }
    }
}

/// A script run against one element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptAction {
    /// Move the scroll offset by a pixel delta.
    ScrollBy { dx: i64, dy: i64 },
    /// Jump to a fraction (0.0..=1.0) of the scrollable extent on both axes.
    ScrollToFraction(f64),
    /// Dispatch a synthetic wheel event.
    Wheel { dx: i64, dy: i64 },
}

impl ScriptAction {
    /// JavaScript statements operating on a bound element `el`.
    pub fn to_js(&self) -> String {
        const TARGET: &str =
            "const t = (el === document.body || el === document.documentElement) ? (document.scrollingElement || el) : el;";
        match *self {
            ScriptAction::ScrollBy { dx, dy } => {
                format!("{TARGET} t.scrollBy({dx}, {dy});")
            }
            ScriptAction::ScrollToFraction(fraction) => {
                let fraction = fraction.clamp(0.0, 1.0);
                format!(
                    "{TARGET} t.scrollTo((t.scrollWidth - t.clientWidth) * {fraction}, (t.scrollHeight - t.clientHeight) * {fraction});"
                )
            }
            ScriptAction::Wheel { dx, dy } => format!(
                "el.dispatchEvent(new WheelEvent('wheel', {{ deltaX: {dx}, deltaY: {dy}, bubbles: true, cancelable: true }}));"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to load {url}: {message}")]
    Load { url: String, message: String },
    #[error("invalid query ({query}): {message}")]
    InvalidQuery { query: String, message: String },
    #[error("element lookup failed: {0}")]
    ElementLookupFailed(String),
    #[error("stale element handle {0}")]
    StaleElement(ElementHandle),
    #[error("action failed: {0}")]
    ActionFailed(String),
}

#[async_trait]
pub trait Document: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), DocumentError>;

    async fn title(&self) -> Result<String, DocumentError>;

    /// Runs `query`; CSS queries are scoped to descendants of `scope` when given.
    async fn query(
        &self,
        scope: Option<ElementHandle>,
        query: &Query,
    ) -> Result<Vec<ElementHandle>, DocumentError>;

    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DocumentError>;

    async fn text(&self, element: ElementHandle) -> Result<String, DocumentError>;

    async fn tag_name(&self, element: ElementHandle) -> Result<String, DocumentError>;

    /// Style property value, `None` when unset.
    async fn style(
        &self,
        element: ElementHandle,
        property: &str,
    ) -> Result<Option<String>, DocumentError>;

    async fn execute(
        &self,
        element: ElementHandle,
        action: &ScriptAction,
    ) -> Result<(), DocumentError>;

    async fn click(&self, element: ElementHandle) -> Result<(), DocumentError>;

    async fn press_key(&self, element: ElementHandle, key: Key) -> Result<(), DocumentError>;
}
