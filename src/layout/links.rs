use super::types::{Couple, CoupleKey, LinkEnd, LinkKind, LinkLayout, NodeLayout};
use crate::config::LayoutConfig;
use crate::ir::PersonId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Builds every connector from the final node positions.
///
/// Couples get a horizontal connector. A couple's single shared child is
/// joined to each parent by its own right-angle path; two or more shared
/// children hang off a junction below the couple instead. Children with one
/// rendered parent get a plain right-angle path.
pub(super) fn compute_links(
    nodes: &BTreeMap<PersonId, NodeLayout>,
    couples: &[Couple],
    config: &LayoutConfig,
) -> Vec<LinkLayout> {
    let mut links = Vec::new();
    let mut covered: HashSet<&PersonId> = HashSet::new();
    let by_key: HashMap<&CoupleKey, &Couple> =
        couples.iter().map(|couple| (&couple.key, couple)).collect();

    for couple in couples {
        let (Some(pere), Some(mere)) = (nodes.get(&couple.pere), nodes.get(&couple.mere)) else {
            continue;
        };
        links.push(couple_link(pere, mere));

        let children: Vec<&NodeLayout> = couple
            .children
            .iter()
            .filter_map(|id| nodes.get(id))
            .collect();
        covered.extend(children.iter().map(|child| &child.id));
        match children.as_slice() {
            [] => {}
            [child] => {
                links.push(parent_child_link(pere, child));
                links.push(parent_child_link(mere, child));
            }
            many => links.extend(junction_links(&couple.key, pere, mere, many, config)),
        }
    }

    for child in nodes.values() {
        if covered.contains(&child.id) {
            continue;
        }
        let parents = [child.pere.as_ref(), child.mere.as_ref()];
        let rendered: Vec<&NodeLayout> = parents
            .into_iter()
            .flatten()
            .filter_map(|id| nodes.get(id))
            .collect();
        if rendered.len() == 2 {
            let key = CoupleKey::new(&rendered[0].id, &rendered[1].id);
            if by_key.contains_key(&key) {
                continue;
            }
        }
        for parent in rendered {
            links.push(parent_child_link(parent, child));
        }
    }
    links
}

fn couple_link(pere: &NodeLayout, mere: &NodeLayout) -> LinkLayout {
    let (left, right) = if pere.x <= mere.x { (pere, mere) } else { (mere, pere) };
    let points = vec![(left.right(), left.y), (right.left(), right.y)];
    LinkLayout {
        kind: LinkKind::Couple,
        from: LinkEnd::Person(left.id.clone()),
        to: LinkEnd::Person(right.id.clone()),
        path: points_to_path(&points),
        points,
        dashed: false,
    }
}

fn parent_child_link(parent: &NodeLayout, child: &NodeLayout) -> LinkLayout {
    let points = right_angle((parent.x, parent.bottom()), (child.x, child.top()));
    LinkLayout {
        kind: LinkKind::ParentChild,
        from: LinkEnd::Person(parent.id.clone()),
        to: LinkEnd::Person(child.id.clone()),
        path: points_to_path(&points),
        points,
        dashed: child.is_deceased(),
    }
}

fn junction_links(
    key: &CoupleKey,
    pere: &NodeLayout,
    mere: &NodeLayout,
    children: &[&NodeLayout],
    config: &LayoutConfig,
) -> Vec<LinkLayout> {
    let lower_bottom = pere.bottom().max(mere.bottom());
    let highest_child_top = children
        .iter()
        .map(|child| child.top())
        .fold(f32::INFINITY, f32::min);
    let mut junction_y = lower_bottom + config.junction_drop;
    if highest_child_top > lower_bottom {
        junction_y = junction_y.min((lower_bottom + highest_child_top) / 2.0);
    }
    let junction = ((pere.x + mere.x) / 2.0, junction_y);

    let mut links = Vec::with_capacity(children.len() + 2);
    for parent in [pere, mere] {
        let points = simplify_points(vec![
            (parent.x, parent.bottom()),
            (parent.x, junction.1),
            junction,
        ]);
        links.push(LinkLayout {
            kind: LinkKind::Convergence,
            from: LinkEnd::Person(parent.id.clone()),
            to: LinkEnd::Junction(key.clone()),
            path: points_to_path(&points),
            points,
            dashed: false,
        });
    }
    for child in children {
        let points = right_angle(junction, (child.x, child.top()));
        links.push(LinkLayout {
            kind: LinkKind::FanOut,
            from: LinkEnd::Junction(key.clone()),
            to: LinkEnd::Person(child.id.clone()),
            path: points_to_path(&points),
            points,
            dashed: child.is_deceased(),
        });
    }
    links
}

/// Vertical, horizontal along a rail halfway down, vertical again.
fn right_angle(from: (f32, f32), to: (f32, f32)) -> Vec<(f32, f32)> {
    let rail = (from.1 + to.1) / 2.0;
    simplify_points(vec![from, (from.0, rail), (to.0, rail), to])
}

/// Drops repeated points and the middle of three points on one axis line.
fn simplify_points(points: Vec<(f32, f32)>) -> Vec<(f32, f32)> {
    let same = |a: f32, b: f32| (a - b).abs() < f32::EPSILON;
    let mut out: Vec<(f32, f32)> = Vec::with_capacity(points.len());
    for point in points {
        if out
            .last()
            .is_some_and(|last| same(last.0, point.0) && same(last.1, point.1))
        {
            continue;
        }
        if let [.., a, b] = out.as_slice()
            && ((same(a.0, b.0) && same(b.0, point.0)) || (same(a.1, b.1) && same(b.1, point.1)))
        {
            out.pop();
        }
        out.push(point);
    }
    out
}

pub fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::types::LayoutPosition;

    fn node(id: &str, x: f32, y: f32, pere: Option<&str>, mere: Option<&str>) -> NodeLayout {
        NodeLayout {
            id: PersonId::new(id).unwrap(),
            name: id.to_string(),
            genre: None,
            description: None,
            date_naissance: None,
            date_deces: None,
            image: None,
            pere: pere.map(|v| PersonId::new(v).unwrap()),
            mere: mere.map(|v| PersonId::new(v).unwrap()),
            x,
            y,
            width: 100.0,
            height: 40.0,
            generation: 0,
            computed: LayoutPosition { x, y },
            pinned: false,
        }
    }

    fn couple(pere: &str, mere: &str, children: &[&str]) -> Couple {
        let pere = PersonId::new(pere).unwrap();
        let mere = PersonId::new(mere).unwrap();
        Couple {
            key: CoupleKey::new(&pere, &mere),
            pere,
            mere,
            children: children.iter().map(|c| PersonId::new(*c).unwrap()).collect(),
            primary: true,
            aligned: true,
        }
    }

    fn nodes(list: Vec<NodeLayout>) -> BTreeMap<PersonId, NodeLayout> {
        list.into_iter().map(|n| (n.id.clone(), n)).collect()
    }

    #[test]
    fn single_child_gets_one_path_per_parent() {
        let mut child = node("c", 60.0, 200.0, Some("a"), Some("b"));
        child.date_deces = Some("2001-01-01".into());
        let map = nodes(vec![
            node("a", 0.0, 0.0, None, None),
            node("b", 120.0, 0.0, None, None),
            child,
        ]);
        let links = compute_links(&map, &[couple("a", "b", &["c"])], &LayoutConfig::default());
        let kinds: Vec<LinkKind> = links.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![LinkKind::Couple, LinkKind::ParentChild, LinkKind::ParentChild]);
        assert_eq!(links[0].points, vec![(50.0, 0.0), (70.0, 0.0)]);
        assert_eq!(links[1].points, vec![(0.0, 20.0), (0.0, 100.0), (60.0, 100.0), (60.0, 180.0)]);
        assert!(links[1].dashed && links[2].dashed);
        assert!(!links[0].dashed);
    }

    #[test]
    fn several_children_converge_then_fan_out() {
        let map = nodes(vec![
            node("a", 0.0, 0.0, None, None),
            node("b", 120.0, 0.0, None, None),
            node("c", -20.0, 200.0, Some("a"), Some("b")),
            node("d", 140.0, 200.0, Some("a"), Some("b")),
        ]);
        let config = LayoutConfig {
            junction_drop: 20.0,
            ..Default::default()
        };
        let links = compute_links(&map, &[couple("a", "b", &["c", "d"])], &config);
        let convergence: Vec<&LinkLayout> =
            links.iter().filter(|l| l.kind == LinkKind::Convergence).collect();
        let fan_out: Vec<&LinkLayout> = links.iter().filter(|l| l.kind == LinkKind::FanOut).collect();
        assert_eq!(convergence.len(), 2);
        assert_eq!(fan_out.len(), 2);
        assert!(links.iter().all(|l| l.kind != LinkKind::ParentChild));
        for link in &convergence {
            assert_eq!(*link.points.last().unwrap(), (60.0, 40.0));
        }
        assert_eq!(fan_out[0].points[0], (60.0, 40.0));
        assert_eq!(*fan_out[0].points.last().unwrap(), (-20.0, 180.0));
        assert_eq!(fan_out[0].path, "M 60.00 40.00 L 60.00 110.00 L -20.00 110.00 L -20.00 180.00");
    }

    #[test]
    fn lone_parent_links_directly() {
        let map = nodes(vec![node("a", 0.0, 0.0, None, None), node("c", 0.0, 200.0, Some("a"), None)]);
        let links = compute_links(&map, &[], &LayoutConfig::default());
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, LinkKind::ParentChild);
        assert_eq!(links[0].points, vec![(0.0, 20.0), (0.0, 180.0)]);
    }

    #[test]
    fn path_uses_two_decimals() {
        assert_eq!(points_to_path(&[(1.0, 2.0), (3.5, 4.25)]), "M 1.00 2.00 L 3.50 4.25");
        assert_eq!(points_to_path(&[]), "");
    }
}
