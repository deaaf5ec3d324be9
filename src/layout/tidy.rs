//! Tidy tree placement (Buchheim, Jünger and Leipert's linear-time take on
//! Walker's algorithm) over the forest arena.
//!
//! Produces abstract x coordinates in separation units; scaling to the
//! canvas happens in the caller.

use crate::tree::Forest;

/// Separation between two horizontally adjacent nodes, in abstract units.
///
/// Siblings get a full unit. Nodes from different parents get
/// `1 / (2 * generation + 1)`, so distant branches pack tighter the deeper
/// they sit.
pub fn separation(forest: &Forest, a: usize, b: usize) -> f32 {
    if forest.node(a).parent == forest.node(b).parent {
        1.0
    } else {
        1.0 / (2.0 * forest.generation(a) as f32 + 1.0)
    }
}

struct TidyState<'a> {
    forest: &'a Forest,
    prelim: Vec<f32>,
    modifier: Vec<f32>,
    change: Vec<f32>,
    shift: Vec<f32>,
    thread: Vec<Option<usize>>,
    ancestor: Vec<usize>,
    number: Vec<usize>,
    /// Default ancestor carried by each parent while its children are walked.
    default_ancestor: Vec<Option<usize>>,
}

impl<'a> TidyState<'a> {
    fn new(forest: &'a Forest) -> Self {
        let count = forest.nodes().len();
        let mut number = vec![0; count];
        for node in forest.nodes() {
            for (i, child) in node.children.iter().enumerate() {
                number[*child] = i;
            }
        }
        Self {
            forest,
            prelim: vec![0.0; count],
            modifier: vec![0.0; count],
            change: vec![0.0; count],
            shift: vec![0.0; count],
            thread: vec![None; count],
            ancestor: (0..count).collect(),
            number,
            default_ancestor: vec![None; count],
        }
    }

    fn children(&self, v: usize) -> &'a [usize] {
        &self.forest.node(v).children
    }

    /// Leftmost sibling of `v` (itself for the hierarchy root).
    fn first_sibling(&self, v: usize) -> usize {
        match self.forest.node(v).parent {
            Some(parent) => self.forest.node(parent).children[0],
            None => v,
        }
    }

    fn left_sibling(&self, v: usize) -> Option<usize> {
        let parent = self.forest.node(v).parent?;
        let i = self.number[v];
        (i > 0).then(|| self.forest.node(parent).children[i - 1])
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.children(v).first().copied().or(self.thread[v])
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.children(v).last().copied().or(self.thread[v])
    }

    fn first_walk(&mut self, v: usize) {
        let children = self.children(v);
        let w = self.left_sibling(v);
        if let (Some(first), Some(last)) = (children.first(), children.last()) {
            self.execute_shifts(v);
            let midpoint = (self.prelim[*first] + self.prelim[*last]) / 2.0;
            if let Some(w) = w {
                self.prelim[v] = self.prelim[w] + separation(self.forest, v, w);
                self.modifier[v] = self.prelim[v] - midpoint;
            } else {
                self.prelim[v] = midpoint;
            }
        } else if let Some(w) = w {
            self.prelim[v] = self.prelim[w] + separation(self.forest, v, w);
        }

        if let Some(parent) = self.forest.node(v).parent {
            let fallback = self.first_sibling(v);
            let ancestor = self.default_ancestor[parent].unwrap_or(fallback);
            self.default_ancestor[parent] = Some(self.apportion(v, w, ancestor));
        }
    }

    fn apportion(&mut self, v: usize, w: Option<usize>, mut default_ancestor: usize) -> usize {
        let Some(w) = w else {
            return default_ancestor;
        };
        let mut vip = v;
        let mut vop = v;
        let mut vim = w;
        let mut vom = self.first_sibling(v);
        let mut sip = self.modifier[vip];
        let mut sop = self.modifier[vop];
        let mut sim = self.modifier[vim];
        let mut som = self.modifier[vom];

        let mut next_im = self.next_right(vim);
        let mut next_ip = self.next_left(vip);
        while let (Some(im), Some(ip)) = (next_im, next_ip) {
            vim = im;
            vip = ip;
            let (Some(om), Some(op)) = (self.next_left(vom), self.next_right(vop)) else {
                break;
            };
            vom = om;
            vop = op;
            self.ancestor[vop] = v;
            let shift = self.prelim[vim] + sim - self.prelim[vip] - sip
                + separation(self.forest, vim, vip);
            if shift > 0.0 {
                let wm = self.next_ancestor(vim, v, default_ancestor);
                self.move_subtree(wm, v, shift);
                sip += shift;
                sop += shift;
            }
            sim += self.modifier[vim];
            sip += self.modifier[vip];
            som += self.modifier[vom];
            sop += self.modifier[vop];
            next_im = self.next_right(vim);
            next_ip = self.next_left(vip);
        }

        if let Some(im) = next_im
            && self.next_right(vop).is_none()
        {
            self.thread[vop] = Some(im);
            self.modifier[vop] += sim - sop;
        }
        if let Some(ip) = next_ip
            && self.next_left(vom).is_none()
        {
            self.thread[vom] = Some(ip);
            self.modifier[vom] += sip - som;
            default_ancestor = v;
        }
        default_ancestor
    }

    fn next_ancestor(&self, vim: usize, v: usize, default_ancestor: usize) -> usize {
        let candidate = self.ancestor[vim];
        if self.forest.node(candidate).parent == self.forest.node(v).parent {
            candidate
        } else {
            default_ancestor
        }
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f32) {
        let subtrees = self.number[wp].saturating_sub(self.number[wm]).max(1) as f32;
        let change = shift / subtrees;
        self.change[wp] -= change;
        self.shift[wp] += shift;
        self.change[wm] += change;
        self.prelim[wp] += shift;
        self.modifier[wp] += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        for w in self.children(v).iter().rev() {
            self.prelim[*w] += shift;
            self.modifier[*w] += shift;
            change += self.change[*w];
            shift += self.shift[*w] + change;
        }
    }
}

/// Abstract x per arena slot (virtual root included). The hierarchy root sits
/// at 0; siblings are at least one unit apart.
pub fn tidy_positions(forest: &Forest) -> Vec<f32> {
    let mut state = TidyState::new(forest);
    for v in forest.postorder() {
        state.first_walk(v);
    }

    let root = forest.root();
    let root_modifier = -state.prelim[root];
    let mut x = vec![0.0; forest.nodes().len()];
    for v in forest.preorder() {
        let parent_modifier = match forest.node(v).parent {
            Some(parent) => state.modifier[parent],
            None => root_modifier,
        };
        x[v] = state.prelim[v] + parent_modifier;
        state.modifier[v] += parent_modifier;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Person, PersonId};
    use crate::tree::build_forest;

    fn person(id: &str, pere: Option<&str>, ordre: i64) -> Person {
        let mut p = Person::new(PersonId::new(id).unwrap());
        p.pere = pere.map(|v| PersonId::new(v).unwrap());
        p.ordre_naissance = Some(ordre);
        p
    }

    fn x_of(forest: &Forest, xs: &[f32], id: &str) -> f32 {
        xs[forest.find(&PersonId::new(id).unwrap()).unwrap()]
    }

    #[test]
    fn parent_is_centered_over_children() {
        let persons = vec![
            person("root", None, 0),
            person("a", Some("root"), 1),
            person("b", Some("root"), 2),
            person("c", Some("root"), 3),
        ];
        let forest = build_forest(&persons).unwrap();
        let xs = tidy_positions(&forest);
        assert_eq!(x_of(&forest, &xs, "root"), 0.0);
        assert_eq!(x_of(&forest, &xs, "a"), -1.0);
        assert_eq!(x_of(&forest, &xs, "b"), 0.0);
        assert_eq!(x_of(&forest, &xs, "c"), 1.0);
    }

    #[test]
    fn cousins_use_depth_scaled_separation() {
        // root -> (a, b); a -> a1; b -> b1. a1 and b1 are cousins at generation 2.
        let persons = vec![
            person("root", None, 0),
            person("a", Some("root"), 1),
            person("b", Some("root"), 2),
            person("a1", Some("a"), 1),
            person("b1", Some("b"), 1),
        ];
        let forest = build_forest(&persons).unwrap();
        let xs = tidy_positions(&forest);
        let gap = x_of(&forest, &xs, "b1") - x_of(&forest, &xs, "a1");
        // Siblings a and b force a full unit; cousins need only 1/5.
        assert!((gap - 1.0).abs() < 1e-5, "gap {gap}");
        let sep = separation(
            &forest,
            forest.find(&PersonId::new("a1").unwrap()).unwrap(),
            forest.find(&PersonId::new("b1").unwrap()).unwrap(),
        );
        assert!((sep - 0.2).abs() < 1e-6);
    }

    #[test]
    fn wide_subtree_pushes_neighbour_apart() {
        let mut persons = vec![
            person("root", None, 0),
            person("a", Some("root"), 1),
            person("b", Some("root"), 2),
        ];
        for i in 0..4 {
            persons.push(person(&format!("a{i}"), Some("a"), i));
        }
        for i in 0..4 {
            persons.push(person(&format!("b{i}"), Some("b"), i));
        }
        let forest = build_forest(&persons).unwrap();
        let xs = tidy_positions(&forest);
        let a3 = x_of(&forest, &xs, "a3");
        let b0 = x_of(&forest, &xs, "b0");
        assert!(b0 - a3 >= 0.2 - 1e-5);
        // children of each parent stay one unit apart
        assert!((x_of(&forest, &xs, "a1") - x_of(&forest, &xs, "a0") - 1.0).abs() < 1e-5);
        // parents stay centred
        let a = x_of(&forest, &xs, "a");
        assert!((a - (x_of(&forest, &xs, "a0") + a3) / 2.0).abs() < 1e-5);
    }
}
