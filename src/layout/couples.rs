use super::Slot;
use super::types::{Couple, CoupleKey};
use crate::config::LayoutConfig;
use crate::ir::{Person, PersonId};
use crate::tree::Forest;
use std::collections::{HashMap, HashSet};

/// Finds every pair recorded as `pere` and `mere` of a common child, with
/// both partners and the child present in the forest.
///
/// Couples come out in order of their first shared child in the collection.
/// The first couple a person appears in is their primary pairing; later
/// pairings of the same person are kept for link geometry only.
pub(super) fn detect_couples(persons: &[Person], forest: &Forest) -> Vec<Couple> {
    let mut couples: Vec<Couple> = Vec::new();
    let mut by_key: HashMap<CoupleKey, usize> = HashMap::new();

    for child in persons {
        let (Some(pere), Some(mere)) = (child.pere.as_ref(), child.mere.as_ref()) else {
            continue;
        };
        if pere == mere || forest.find(&child.id).is_none() {
            continue;
        }
        if forest.find(pere).is_none() || forest.find(mere).is_none() {
            continue;
        }
        let key = CoupleKey::new(pere, mere);
        let idx = *by_key.entry(key.clone()).or_insert_with(|| {
            couples.push(Couple {
                key,
                pere: pere.clone(),
                mere: mere.clone(),
                children: Vec::new(),
                primary: false,
                aligned: false,
            });
            couples.len() - 1
        });
        couples[idx].children.push(child.id.clone());
    }

    let mut claimed: HashSet<&PersonId> = HashSet::new();
    let mut primary = vec![false; couples.len()];
    for (idx, couple) in couples.iter().enumerate() {
        if claimed.contains(&couple.pere) || claimed.contains(&couple.mere) {
            tracing::debug!(couple = %couple.key, "partner already paired, not aligning");
            continue;
        }
        claimed.insert(&couple.pere);
        claimed.insert(&couple.mere);
        primary[idx] = true;
    }
    for (couple, primary) in couples.iter_mut().zip(primary) {
        couple.primary = primary;
    }
    couples
}

/// Places each primary couple side by side, `pere` left and `mere` right,
/// centred over the midpoint of their shared children.
///
/// Partners at different generations are aligned only when the partner not
/// carrying the shared children is a childless root (a married-in spouse); it
/// moves to the other partner's row. Returns the aligned `(left, right)` slot
/// pairs for the collision pass.
pub(super) fn align_couples(
    slots: &mut [Slot],
    forest: &Forest,
    couples: &mut [Couple],
    config: &LayoutConfig,
    row_y: impl Fn(usize) -> f32,
) -> Vec<(usize, usize)> {
    let distance = config.couple_center_distance();
    let mut pairs = Vec::new();

    for couple in couples.iter_mut().filter(|couple| couple.primary) {
        let (Some(pere), Some(mere)) = (forest.find(&couple.pere), forest.find(&couple.mere))
        else {
            continue;
        };
        let child_slots: Vec<usize> = couple
            .children
            .iter()
            .filter_map(|id| forest.find(id))
            .collect();

        if slots[pere].generation != slots[mere].generation {
            let carrier = child_slots
                .first()
                .and_then(|child| forest.node(*child).parent)
                .unwrap_or(pere);
            let spouse = if carrier == mere { pere } else { mere };
            let anchor = if spouse == pere { mere } else { pere };
            if !is_married_in(forest, spouse) {
                tracing::debug!(
                    couple = %couple.key,
                    "partners on different generations, skipping alignment"
                );
                continue;
            }
            let generation = slots[anchor].generation;
            slots[spouse].generation = generation;
            slots[spouse].y = row_y(generation);
        }

        let midpoint = match child_slots
            .iter()
            .map(|idx| slots[*idx].x)
            .fold(None, |acc: Option<(f32, f32)>, x| match acc {
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
                None => Some((x, x)),
            }) {
            Some((lo, hi)) => (lo + hi) / 2.0,
            None => (slots[pere].x + slots[mere].x) / 2.0,
        };
        slots[pere].x = midpoint - distance / 2.0;
        slots[mere].x = midpoint + distance / 2.0;
        couple.aligned = true;
        pairs.push((pere, mere));
    }
    pairs
}

/// A root without children of its own in the tree: typically a partner who
/// married into the family and whose parents are not recorded.
fn is_married_in(forest: &Forest, idx: usize) -> bool {
    let node = forest.node(idx);
    let is_root = node
        .parent
        .is_none_or(|parent| forest.node(parent).is_virtual());
    is_root && node.children.is_empty()
}
