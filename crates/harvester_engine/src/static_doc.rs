use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use ego_tree::{NodeId, NodeRef};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

use crate::document::{Document, DocumentError, ElementHandle, Key, Query, ScriptAction};

/// Which interaction reveals the next stage of a [`StaticDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealTrigger {
    Click,
    Scroll,
    Key,
    Wheel,
}

/// An interaction recorded by a [`StaticDocument`].
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Load(String),
    Click(ElementHandle),
    Key(ElementHandle, Key),
    Script(ElementHandle, ScriptAction),
}

/// A [`Document`] backed by parsed HTML snapshots instead of a live browser.
///
/// A document may hold several stages; each interaction matching one of the
/// reveal triggers advances to the next stage, which is how captured snapshots
/// of a lazily-loading page are replayed. Element handles are the element's
/// position in document order, so handles stay valid across stages as long as
/// earlier markup is unchanged.
pub struct StaticDocument {
    state: Mutex<StaticState>,
}

struct StaticState {
    stages: Vec<String>,
    stage: usize,
    triggers: Vec<RevealTrigger>,
    interactions: Vec<Interaction>,
}

impl StaticDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self::staged(vec![html.into()], Vec::new())
    }

    pub fn staged(stages: Vec<String>, triggers: Vec<RevealTrigger>) -> Self {
        let stages = if stages.is_empty() {
            vec![String::new()]
        } else {
            stages
        };
        Self {
            state: Mutex::new(StaticState {
                stages,
                stage: 0,
                triggers,
                interactions: Vec::new(),
            }),
        }
    }

    pub fn stage(&self) -> usize {
        self.lock().stage
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.lock().interactions.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StaticState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot::parse(&state.stages[state.stage])
    }

    fn record(&self, interaction: Interaction, trigger: RevealTrigger) {
        let mut state = self.lock();
        state.interactions.push(interaction);
        if state.triggers.contains(&trigger) && state.stage + 1 < state.stages.len() {
            state.stage += 1;
        }
    }

    fn check_handle(&self, element: ElementHandle) -> Result<(), DocumentError> {
        self.snapshot().element(element).map(|_| ())
    }
}

struct Snapshot {
    html: Html,
    elements: Vec<NodeId>,
    positions: HashMap<NodeId, usize>,
}

impl Snapshot {
    fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);
        let elements: Vec<NodeId> = html
            .tree
            .root()
            .descendants()
            .filter(|node| node.value().is_element())
            .map(|node| node.id())
            .collect();
        let positions = elements
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();
        Self {
            html,
            elements,
            positions,
        }
    }

    fn element(&self, handle: ElementHandle) -> Result<ElementRef<'_>, DocumentError> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|position| self.elements.get(position))
            .and_then(|id| self.html.tree.get(*id))
            .and_then(ElementRef::wrap)
            .ok_or(DocumentError::StaleElement(handle))
    }

    fn handle(&self, id: NodeId) -> Option<ElementHandle> {
        self.positions
            .get(&id)
            .map(|position| ElementHandle(*position as u64))
    }

    fn css(
        &self,
        scope: Option<ElementHandle>,
        expr: &str,
    ) -> Result<Vec<ElementHandle>, DocumentError> {
        let selector = Selector::parse(expr).map_err(|err| DocumentError::InvalidQuery {
            query: expr.to_string(),
            message: format!("{err:?}"),
        })?;
        let found: Vec<NodeId> = match scope {
            Some(handle) => {
                let scope = self.element(handle)?;
                scope
                    .select(&selector)
                    .filter(|el| el.id() != scope.id())
                    .map(|el| el.id())
                    .collect()
            }
            None => self.html.select(&selector).map(|el| el.id()).collect(),
        };
        Ok(found.into_iter().filter_map(|id| self.handle(id)).collect())
    }

    fn path(&self, expr: &str) -> Result<Vec<ElementHandle>, DocumentError> {
        let steps = parse_path(expr)?;
        let mut current: Vec<NodeRef<'_, Node>> = vec![self.html.tree.root()];
        for (name, index) in steps {
            let mut next = Vec::new();
            for node in &current {
                let matching: Vec<NodeRef<'_, Node>> = node
                    .children()
                    .filter(|child| {
                        ElementRef::wrap(*child)
                            .map(|el| el.value().name().eq_ignore_ascii_case(&name))
                            .unwrap_or(false)
                    })
                    .collect();
                match index {
                    Some(n) => next.extend(matching.get(n - 1).copied()),
                    None => next.extend(matching),
                }
            }
            current = next;
        }
        Ok(current
            .into_iter()
            .filter_map(|node| self.handle(node.id()))
            .collect())
    }
}

/// Splits `/html/body/div[3]` into `[("html", None), ("body", None), ("div", Some(3))]`.
fn parse_path(expr: &str) -> Result<Vec<(String, Option<usize>)>, DocumentError> {
    let invalid = |message: &str| DocumentError::InvalidQuery {
        query: expr.to_string(),
        message: message.to_string(),
    };
    let rest = expr
        .strip_prefix('/')
        .ok_or_else(|| invalid("path must be absolute"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(invalid("unsupported path form"));
    }

    rest.split('/')
        .map(|step| {
            let (name, index) = match step.split_once('[') {
                Some((name, tail)) => {
                    let digits = tail
                        .strip_suffix(']')
                        .ok_or_else(|| invalid("unterminated index"))?;
                    let index: usize = digits
                        .parse()
                        .map_err(|_| invalid("index must be a positive integer"))?;
                    if index == 0 {
                        return Err(invalid("index must be a positive integer"));
                    }
                    (name, Some(index))
                }
                None => (step, None),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(invalid("bad step name"));
            }
            Ok((name.to_ascii_lowercase(), index))
        })
        .collect()
}

fn inline_style(element: ElementRef<'_>, property: &str) -> Option<String> {
    element.value().attr("style").and_then(|style| {
        style.split(';').find_map(|declaration| {
            let (name, value) = declaration.split_once(':')?;
            if name.trim().eq_ignore_ascii_case(property) {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
    })
}

fn collapsed_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl Document for StaticDocument {
    async fn load(&self, url: &str) -> Result<(), DocumentError> {
        self.lock().interactions.push(Interaction::Load(url.to_string()));
        Ok(())
    }

    async fn title(&self) -> Result<String, DocumentError> {
        let snapshot = self.snapshot();
        let title = snapshot
            .css(None, "title")?
            .first()
            .map(|handle| snapshot.element(*handle).map(collapsed_text))
            .transpose()?
            .unwrap_or_default();
        Ok(title)
    }

    async fn query(
        &self,
        scope: Option<ElementHandle>,
        query: &Query,
    ) -> Result<Vec<ElementHandle>, DocumentError> {
        let snapshot = self.snapshot();
        match query {
            Query::Css(expr) => snapshot.css(scope, expr),
            Query::Path(expr) => snapshot.path(expr),
        }
    }

    async fn attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DocumentError> {
        let snapshot = self.snapshot();
        let element = snapshot.element(element)?;
        Ok(element.value().attr(name).map(str::to_string))
    }

    async fn text(&self, element: ElementHandle) -> Result<String, DocumentError> {
        let snapshot = self.snapshot();
        snapshot.element(element).map(collapsed_text)
    }

    async fn tag_name(&self, element: ElementHandle) -> Result<String, DocumentError> {
        let snapshot = self.snapshot();
        snapshot
            .element(element)
            .map(|el| el.value().name().to_ascii_lowercase())
    }

    async fn style(
        &self,
        element: ElementHandle,
        property: &str,
    ) -> Result<Option<String>, DocumentError> {
        let snapshot = self.snapshot();
        snapshot
            .element(element)
            .map(|el| inline_style(el, property))
    }

    async fn execute(
        &self,
        element: ElementHandle,
        action: &ScriptAction,
    ) -> Result<(), DocumentError> {
        self.check_handle(element)?;
        let trigger = match action {
            ScriptAction::Wheel { .. } => RevealTrigger::Wheel,
            ScriptAction::ScrollBy { .. } | ScriptAction::ScrollToFraction(_) => {
                RevealTrigger::Scroll
            }
        };
        self.record(Interaction::Script(element, *action), trigger);
        Ok(())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), DocumentError> {
        self.check_handle(element)?;
        self.record(Interaction::Click(element), RevealTrigger::Click);
        Ok(())
    }

    async fn press_key(&self, element: ElementHandle, key: Key) -> Result<(), DocumentError> {
        self.check_handle(element)?;
        self.record(Interaction::Key(element, key), RevealTrigger::Key);
        Ok(())
    }
}
