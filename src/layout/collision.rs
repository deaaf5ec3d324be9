use super::Slot;
use std::collections::{BTreeMap, HashSet};

/// A single node, or a couple moved as one rigid block.
#[derive(Debug, Clone, Copy)]
struct Unit {
    left: usize,
    right: Option<usize>,
}

impl Unit {
    fn rightmost(&self) -> usize {
        self.right.unwrap_or(self.left)
    }
}

/// Enforces a minimum centre-to-centre distance between nodes of the same
/// generation with one left-to-right sweep per generation.
///
/// Nodes only ever move right, so a resolved neighbour is never disturbed
/// again within the sweep. `pairs` are aligned couples `(left, right)`; both
/// partners shift together so their inner gap is preserved. Returns the number
/// of units that moved.
pub(super) fn resolve_collisions(
    slots: &mut [Slot],
    pairs: &[(usize, usize)],
    min_distance: f32,
) -> usize {
    let mut paired: HashSet<usize> = HashSet::new();
    let mut rows: BTreeMap<usize, Vec<Unit>> = BTreeMap::new();

    for &(a, b) in pairs {
        if !slots[a].active || !slots[b].active || slots[a].generation != slots[b].generation {
            continue;
        }
        if a == b || paired.contains(&a) || paired.contains(&b) {
            continue;
        }
        paired.insert(a);
        paired.insert(b);
        let (left, right) = if slots[a].x <= slots[b].x { (a, b) } else { (b, a) };
        rows.entry(slots[left].generation).or_default().push(Unit {
            left,
            right: Some(right),
        });
    }
    for (idx, slot) in slots.iter().enumerate() {
        if slot.active && !paired.contains(&idx) {
            rows.entry(slot.generation)
                .or_default()
                .push(Unit { left: idx, right: None });
        }
    }

    let mut moved = 0;
    for (generation, mut units) in rows {
        units.sort_by(|a, b| {
            slots[a.left]
                .x
                .total_cmp(&slots[b.left].x)
                .then(a.left.cmp(&b.left))
        });
        let mut previous: Option<f32> = None;
        for unit in units {
            if let Some(prev_x) = previous {
                let required = prev_x + min_distance;
                let delta = required - slots[unit.left].x;
                if delta > 0.0 {
                    slots[unit.left].x += delta;
                    if let Some(right) = unit.right {
                        slots[right].x += delta;
                    }
                    moved += 1;
                    tracing::trace!(generation, slot = unit.left, delta, "pushed right");
                }
            }
            previous = Some(slots[unit.rightmost()].x);
        }
    }
    moved
}
