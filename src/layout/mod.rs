//! Layout pipeline for the family tree.
//!
//! Persons are turned into a forest, placed with a tidy tree pass, spread by
//! the collision resolver, paired up by the couple aligner and finally
//! connected by link geometry. User overrides are applied on top of the
//! computed positions; links always follow the final positions.

mod collision;
mod couples;
mod empty;
mod links;
mod tidy;
pub(crate) mod types;
pub use empty::EMPTY_MESSAGE;
pub use links::points_to_path;
pub use tidy::{separation, tidy_positions};
pub use types::*;
use collision::*;
use couples::*;
use empty::*;
use links::*;

use crate::config::LayoutConfig;
use crate::ir::{Person, PersonId};
use crate::store::OverrideMap;
use crate::tree::{Forest, build_forest};
use std::collections::{BTreeMap, HashMap};

/// Working position of one arena slot while the passes run.
#[derive(Debug, Clone, Copy)]
struct Slot {
    x: f32,
    y: f32,
    generation: usize,
    /// False for the virtual root.
    active: bool,
}

/// Canvas geometry shared by the passes.
struct Grid {
    left: f32,
    band_width: f32,
    top: f32,
    level_height: f32,
}

impl Grid {
    fn new(config: &LayoutConfig, canvas_width: f32) -> Self {
        Self {
            left: config.padding + config.node_width / 2.0,
            band_width: (canvas_width - config.padding * 2.0 - config.node_width).max(0.0),
            top: config.padding + config.node_height / 2.0,
            level_height: config.node_height + config.level_gap,
        }
    }

    fn row_y(&self, generation: usize) -> f32 {
        self.top + generation as f32 * self.level_height
    }
}

/// Computes positions and links for a person collection, without overrides.
///
/// `canvas` is the container size; floors from the config keep tiny
/// containers from collapsing the layout. An empty collection yields the
/// empty-state layout.
pub fn compute_layout(persons: &[Person], config: &LayoutConfig, canvas: (f32, f32)) -> Layout {
    let Some(forest) = build_forest(persons) else {
        tracing::debug!("empty person collection, using empty-state layout");
        return compute_empty_layout(config, canvas);
    };
    let (canvas_width, canvas_height) = config.canvas_extent(canvas.0, canvas.1);
    let grid = Grid::new(config, canvas_width);

    let tidy = tidy_positions(&forest);
    let mut slots = place_on_canvas(&forest, &tidy, &grid);

    let min_distance = config.min_center_distance();
    let first_pass = resolve_collisions(&mut slots, &[], min_distance);
    let mut couples = detect_couples(persons, &forest);
    let pairs = align_couples(&mut slots, &forest, &mut couples, config, |g| grid.row_y(g));
    let second_pass = resolve_collisions(&mut slots, &pairs, min_distance);
    tracing::debug!(
        nodes = forest.person_count(),
        generations = forest.max_generation() + 1,
        couples = couples.len(),
        aligned = pairs.len(),
        first_pass,
        second_pass,
        "layout passes done"
    );

    let by_id: HashMap<&PersonId, &Person> =
        persons.iter().map(|person| (&person.id, person)).collect();
    let mut nodes = BTreeMap::new();
    for idx in forest.person_nodes() {
        let tree_node = forest.node(idx);
        let Some(id) = tree_node.person_id.clone() else {
            continue;
        };
        let person = by_id.get(&id);
        let slot = slots[idx];
        nodes.insert(
            id.clone(),
            NodeLayout {
                id,
                name: tree_node.name.clone(),
                genre: tree_node.genre,
                description: tree_node.description.clone(),
                date_naissance: tree_node.date_naissance.clone(),
                date_deces: tree_node.date_deces.clone(),
                image: tree_node.image.clone(),
                pere: person.and_then(|p| p.pere.clone()),
                mere: person.and_then(|p| p.mere.clone()),
                x: slot.x,
                y: slot.y,
                width: config.node_width,
                height: config.node_height,
                generation: slot.generation,
                computed: LayoutPosition {
                    x: slot.x,
                    y: slot.y,
                },
                pinned: false,
            },
        );
    }

    let mut layout = Layout {
        nodes,
        couples,
        links: Vec::new(),
        width: canvas_width,
        height: canvas_height,
        canvas_width,
        canvas_height,
        message: None,
    };
    refresh(&mut layout, config);
    layout
}

/// Maps tidy units into the canvas band, `d3.tree().size()` style: the
/// outermost nodes keep half a separation of margin and the rest scales
/// linearly. A lone node lands in the middle of the band.
fn place_on_canvas(forest: &Forest, tidy: &[f32], grid: &Grid) -> Vec<Slot> {
    let mut left: Option<usize> = None;
    let mut right: Option<usize> = None;
    for idx in forest.person_nodes() {
        if left.is_none_or(|l| tidy[idx] < tidy[l]) {
            left = Some(idx);
        }
        if right.is_none_or(|r| tidy[idx] > tidy[r]) {
            right = Some(idx);
        }
    }
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => (forest.root(), forest.root()),
    };
    let s = if left == right {
        1.0
    } else {
        separation(forest, left, right) / 2.0
    };
    let tx = s - tidy[left];
    let span = tidy[right] + s + tx;
    let kx = if span > 0.0 { grid.band_width / span } else { 0.0 };

    (0..forest.nodes().len())
        .map(|idx| {
            let generation = forest.generation(idx);
            Slot {
                x: grid.left + (tidy[idx] + tx) * kx,
                y: grid.row_y(generation),
                generation,
                active: !forest.node(idx).is_virtual(),
            }
        })
        .collect()
}

/// Rendered position wins over computed position for every node with an
/// override; nodes without one fall back to their computed position. Keys for
/// unknown persons are ignored. Returns the number of overrides applied.
pub fn apply_overrides(layout: &mut Layout, overrides: &OverrideMap, config: &LayoutConfig) -> usize {
    let mut applied = 0;
    for node in layout.nodes.values_mut() {
        match overrides.get(&node.id).filter(|pos| pos.is_finite()) {
            Some(pos) => {
                node.x = pos.x;
                node.y = pos.y;
                node.pinned = true;
                applied += 1;
            }
            None => {
                node.x = node.computed.x;
                node.y = node.computed.y;
                node.pinned = false;
            }
        }
    }
    let stale = overrides
        .keys()
        .filter(|id| !layout.nodes.contains_key(*id))
        .count();
    if stale > 0 {
        tracing::debug!(stale, "ignoring overrides for unknown persons");
    }
    refresh(layout, config);
    applied
}

/// Full pipeline: layout, then overrides, then links from final positions.
pub fn compute_diagram(
    persons: &[Person],
    overrides: &OverrideMap,
    config: &LayoutConfig,
    canvas: (f32, f32),
) -> Layout {
    let mut layout = compute_layout(persons, config, canvas);
    if !layout.is_empty() {
        apply_overrides(&mut layout, overrides, config);
    }
    layout
}

fn refresh(layout: &mut Layout, config: &LayoutConfig) {
    layout.links = compute_links(&layout.nodes, &layout.couples, config);
    let mut width = layout.canvas_width;
    let mut height = layout.canvas_height;
    for node in layout.nodes.values() {
        width = width.max(node.right() + config.padding);
        height = height.max(node.bottom() + config.padding);
    }
    layout.width = width;
    layout.height = height;
}
