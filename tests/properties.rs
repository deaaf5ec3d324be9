use std::collections::{BTreeMap, HashMap};

use family_tree_renderer::config::LayoutConfig;
use family_tree_renderer::ir::{Person, PersonId};
use family_tree_renderer::layout::{compute_diagram, compute_layout};
use family_tree_renderer::store::{OverrideMap, PositionOverride};
use family_tree_renderer::tree::build_forest;
use proptest::prelude::*;
use proptest::sample::Index;

type Draw = (bool, Index, bool, Index, Option<i64>, Option<u16>);

/// Acyclic collections: parents always come from earlier records, then the
/// whole collection is shuffled so input order carries no hint.
fn families() -> impl Strategy<Value = Vec<Person>> {
    proptest::collection::vec(
        (
            any::<bool>(),
            any::<Index>(),
            any::<bool>(),
            any::<Index>(),
            proptest::option::of(1i64..4),
            proptest::option::of(1900u16..2000),
        ),
        1..28,
    )
    .prop_map(|draws: Vec<Draw>| {
        let ids: Vec<PersonId> = (0..draws.len())
            .map(|i| PersonId::new(format!("p{i}")).unwrap())
            .collect();
        draws
            .iter()
            .enumerate()
            .map(|(i, (has_pere, pere, has_mere, mere, ordre, year))| {
                let mut person = Person::new(ids[i].clone());
                let pere = (i > 0 && *has_pere).then(|| pere.index(i));
                let mere = (i > 0 && *has_mere)
                    .then(|| mere.index(i))
                    .filter(|m| Some(*m) != pere);
                person.pere = pere.map(|p| ids[p].clone());
                person.mere = mere.map(|m| ids[m].clone());
                person.ordre_naissance = *ordre;
                person.date_naissance = year.map(|y| format!("{y}-01-15"));
                person
            })
            .collect::<Vec<_>>()
    })
    .prop_shuffle()
}

type SiblingKey = (bool, i64, bool, Option<chrono::NaiveDate>);

fn sibling_key(person: &Person) -> SiblingKey {
    let birth = person.birth_date();
    (
        person.ordre_naissance.is_none(),
        person.ordre_naissance.unwrap_or(0),
        birth.is_none(),
        birth,
    )
}

proptest! {
    #[test]
    fn forest_holds_every_person_once(persons in families()) {
        let forest = build_forest(&persons).unwrap();
        prop_assert_eq!(forest.person_count(), persons.len());
        prop_assert!(forest.unplaced().is_empty());
        let extra = usize::from(forest.has_virtual_root());
        prop_assert_eq!(forest.nodes().len(), persons.len() + extra);
    }

    #[test]
    fn parentless_persons_are_exactly_the_roots(persons in families()) {
        let forest = build_forest(&persons).unwrap();
        let by_id: HashMap<&PersonId, &Person> = persons.iter().map(|p| (&p.id, p)).collect();
        let root_ids: Vec<&PersonId> = forest
            .roots()
            .iter()
            .filter_map(|idx| forest.node(*idx).person_id.as_ref())
            .collect();
        for person in &persons {
            prop_assert_eq!(person.is_root(), root_ids.contains(&&person.id));
        }
        for id in root_ids {
            let person = by_id[id];
            prop_assert!(person.pere.is_none() && person.mere.is_none());
        }
    }

    #[test]
    fn siblings_follow_birth_order(persons in families()) {
        let forest = build_forest(&persons).unwrap();
        let by_id: HashMap<&PersonId, &Person> = persons.iter().map(|p| (&p.id, p)).collect();
        for node in forest.nodes().iter().filter(|n| !n.is_virtual()) {
            let keys: Vec<SiblingKey> = node
                .children
                .iter()
                .filter_map(|c| forest.node(*c).person_id.as_ref())
                .map(|id| sibling_key(by_id[id]))
                .collect();
            for pair in keys.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }
    }

    #[test]
    fn nodes_of_one_generation_keep_their_distance(persons in families(), width in 0.0f32..2000.0) {
        let config = LayoutConfig::default();
        let layout = compute_layout(&persons, &config, (width, 600.0));
        let mut rows: BTreeMap<usize, Vec<f32>> = BTreeMap::new();
        for node in layout.nodes.values() {
            rows.entry(node.generation).or_default().push(node.x);
        }
        for xs in rows.values_mut() {
            xs.sort_by(f32::total_cmp);
            for pair in xs.windows(2) {
                prop_assert!(pair[1] - pair[0] >= config.min_center_distance() - 1e-2);
            }
        }
    }

    #[test]
    fn overrides_always_win(
        persons in families(),
        picks in proptest::collection::vec((any::<Index>(), -500.0f32..2000.0, -500.0f32..2000.0), 0..6),
    ) {
        let config = LayoutConfig::default();
        let overrides: OverrideMap = picks
            .iter()
            .map(|(idx, x, y)| (persons[idx.index(persons.len())].id.clone(), PositionOverride::new(*x, *y)))
            .collect();
        let layout = compute_diagram(&persons, &overrides, &config, (1200.0, 800.0));
        for (id, position) in &overrides {
            let node = &layout.nodes[id];
            prop_assert_eq!((node.x, node.y), (position.x, position.y));
            prop_assert!(node.pinned);
        }
        for node in layout.nodes.values().filter(|n| !overrides.contains_key(&n.id)) {
            prop_assert_eq!((node.x, node.y), (node.computed.x, node.computed.y));
        }
    }
}
