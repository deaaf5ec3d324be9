use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::ir::{Genre, PersonId};

/// Position computed by the layout pipeline (tidy tree, collision resolver,
/// couple aligner). Never persisted; see `store::PositionOverride` for the
/// user-chosen counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLayout {
    pub id: PersonId,
    pub name: String,
    pub genre: Option<Genre>,
    pub description: Option<String>,
    pub date_naissance: Option<String>,
    pub date_deces: Option<String>,
    pub image: Option<String>,
    pub pere: Option<PersonId>,
    pub mere: Option<PersonId>,
    /// Rendered centre; equals `computed` unless an override is applied.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub generation: usize,
    pub computed: LayoutPosition,
    pub pinned: bool,
}

impl NodeLayout {
    pub fn is_deceased(&self) -> bool {
        self.date_deces
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }

    pub fn top(&self) -> f32 {
        self.y - self.height / 2.0
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn left(&self) -> f32 {
        self.x - self.width / 2.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Canonical, order-independent key of a couple: the two ids sorted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CoupleKey(PersonId, PersonId);

impl CoupleKey {
    pub fn new(a: &PersonId, b: &PersonId) -> Self {
        if a <= b {
            Self(a.clone(), b.clone())
        } else {
            Self(b.clone(), a.clone())
        }
    }

    pub fn members(&self) -> (&PersonId, &PersonId) {
        (&self.0, &self.1)
    }
}

impl fmt::Display for CoupleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.0, self.1)
    }
}

/// Two persons recorded together as `pere` and `mere` of at least one child.
#[derive(Debug, Clone, Serialize)]
pub struct Couple {
    pub key: CoupleKey,
    pub pere: PersonId,
    pub mere: PersonId,
    /// Shared children present in the diagram, in collection order.
    pub children: Vec<PersonId>,
    /// Whether this is the pairing used for alignment (a person belongs to at
    /// most one primary couple).
    pub primary: bool,
    /// Whether the aligner placed the partners side by side.
    pub aligned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Couple,
    ParentChild,
    Convergence,
    FanOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEnd {
    Person(PersonId),
    Junction(CoupleKey),
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkLayout {
    pub kind: LinkKind,
    pub from: LinkEnd,
    pub to: LinkEnd,
    pub points: Vec<(f32, f32)>,
    pub path: String,
    /// Presentation flag: the link ends at a deceased person.
    pub dashed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub nodes: BTreeMap<PersonId, NodeLayout>,
    pub couples: Vec<Couple>,
    pub links: Vec<LinkLayout>,
    pub width: f32,
    pub height: f32,
    /// Canvas extents after floors, before growing to fit the nodes.
    pub canvas_width: f32,
    pub canvas_height: f32,
    /// Set for the empty state.
    pub message: Option<String>,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn links_of_kind(&self, kind: LinkKind) -> impl Iterator<Item = &LinkLayout> {
        self.links.iter().filter(move |link| link.kind == kind)
    }
}
