use std::fmt;

use url::Url;

pub const DEFAULT_ITEM_MARKERS: &[&str] = &["/asset/", "/artwork/"];
pub const DEFAULT_DENIED_SEGMENTS: &[&str] = &["search", "explore", "story", "exhibit", "theme"];

/// Why a candidate reference was not accepted as an item link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    Unparseable,
    ForeignOrigin,
    NotAnItem,
    CatalogRoot,
    Denylisted(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Empty => write!(f, "empty reference"),
            Rejection::Unparseable => write!(f, "unparseable reference"),
            Rejection::ForeignOrigin => write!(f, "foreign origin"),
            Rejection::NotAnItem => write!(f, "no item path marker"),
            Rejection::CatalogRoot => write!(f, "catalog root"),
            Rejection::Denylisted(segment) => write!(f, "denylisted segment {segment}"),
        }
    }
}

/// Decides which references count as item links for one catalog site.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    base: Url,
    catalog_root: Url,
    item_markers: Vec<String>,
    denied_segments: Vec<String>,
}

impl LinkPolicy {
    /// `base` supplies the accepted origin and resolves relative references;
    /// `catalog_root` is the catalog page itself, which is never an item.
    pub fn new(base: Url, catalog_root: Url) -> Self {
        Self {
            base,
            catalog_root,
            item_markers: DEFAULT_ITEM_MARKERS.iter().map(|m| m.to_string()).collect(),
            denied_segments: DEFAULT_DENIED_SEGMENTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_item_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.item_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_denied_segments<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denied_segments = segments.into_iter().map(Into::into).collect();
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn item_markers(&self) -> &[String] {
        &self.item_markers
    }

    pub fn is_valid_item_link(&self, reference: Option<&str>) -> bool {
        self.classify(reference).is_ok()
    }

    /// Returns the normalized absolute link, or `None` when the reference is rejected.
    pub fn normalize(&self, reference: Option<&str>) -> Option<String> {
        self.classify(reference).ok()
    }

    pub fn classify(&self, reference: Option<&str>) -> Result<String, Rejection> {
        let trimmed = reference.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return Err(Rejection::Empty);
        }

        let url = self.resolve(trimmed)?;
        if url.origin() != self.base.origin() {
            return Err(Rejection::ForeignOrigin);
        }

        let path = url.path();
        if !self.item_markers.iter().any(|marker| path.contains(marker.as_str())) {
            return Err(Rejection::NotAnItem);
        }
        if is_same_page(&url, &self.catalog_root) {
            return Err(Rejection::CatalogRoot);
        }
        let denied = url.path_segments().and_then(|mut segments| {
            segments.find_map(|segment| {
                self.denied_segments
                    .iter()
                    .find(|denied| denied.eq_ignore_ascii_case(segment))
                    .cloned()
            })
        });
        if let Some(segment) = denied {
            return Err(Rejection::Denylisted(segment));
        }

        Ok(url.to_string())
    }

    fn resolve(&self, reference: &str) -> Result<Url, Rejection> {
        match Url::parse(reference) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                self.base.join(reference).map_err(|_| Rejection::Unparseable)
            }
            Err(_) => Err(Rejection::Unparseable),
        }
    }
}

fn is_same_page(url: &Url, root: &Url) -> bool {
    url.origin() == root.origin()
        && url.path().trim_end_matches('/') == root.path().trim_end_matches('/')
}
