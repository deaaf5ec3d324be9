use crate::ir::{Genre, Person, PersonId};
use std::collections::HashMap;

/// Id shown for the synthetic node that joins several real roots into one
/// hierarchy. It never reaches the rendered diagram.
pub const VIRTUAL_ROOT_ID: &str = "__virtual_root__";

/// Render-oriented node derived from a [`Person`].
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// `None` only for the virtual root.
    pub person_id: Option<PersonId>,
    pub name: String,
    pub genre: Option<Genre>,
    pub description: Option<String>,
    pub date_naissance: Option<String>,
    pub date_deces: Option<String>,
    pub image: Option<String>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Depth inside the hierarchy, counting the virtual root when present.
    pub depth: usize,
}

impl TreeNode {
    fn from_person(person: &Person, parent: Option<usize>, depth: usize) -> Self {
        Self {
            person_id: Some(person.id.clone()),
            name: person.display_name(),
            genre: person.genre,
            description: person.description.clone(),
            date_naissance: person.date_naissance.clone(),
            date_deces: person.date_deces.clone(),
            image: person.image.clone(),
            parent,
            children: Vec::new(),
            depth,
        }
    }

    fn virtual_root() -> Self {
        Self {
            person_id: None,
            name: VIRTUAL_ROOT_ID.to_string(),
            genre: None,
            description: None,
            date_naissance: None,
            date_deces: None,
            image: None,
            parent: None,
            children: Vec::new(),
            depth: 0,
        }
    }

    pub fn is_virtual(&self) -> bool {
        self.person_id.is_none()
    }

    pub fn id_str(&self) -> &str {
        self.person_id
            .as_ref()
            .map(PersonId::as_str)
            .unwrap_or(VIRTUAL_ROOT_ID)
    }
}

/// Arena of [`TreeNode`]s forming exactly one hierarchy for the layout.
///
/// With two or more real roots the hierarchy is anchored on a virtual root;
/// otherwise the single real root is the hierarchy root.
#[derive(Debug, Clone)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    root: usize,
    roots: Vec<usize>,
    index: HashMap<PersonId, usize>,
    unplaced: Vec<PersonId>,
}

impl Forest {
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &TreeNode {
        &self.nodes[idx]
    }

    /// Root of the hierarchy handed to the layout engine.
    pub fn root(&self) -> usize {
        self.root
    }

    /// Real (person-backed) roots in collection order.
    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn has_virtual_root(&self) -> bool {
        self.nodes[self.root].is_virtual()
    }

    pub fn find(&self, id: &PersonId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Number of person-backed nodes.
    pub fn person_count(&self) -> usize {
        self.index.len()
    }

    /// Persons that could not be attached anywhere (dangling parent refs or
    /// cycles not reachable from a root).
    pub fn unplaced(&self) -> &[PersonId] {
        &self.unplaced
    }

    /// Generation of a node: real roots are generation 0.
    pub fn generation(&self, idx: usize) -> usize {
        let offset = usize::from(self.has_virtual_root());
        self.nodes[idx].depth.saturating_sub(offset)
    }

    pub fn max_generation(&self) -> usize {
        self.person_nodes()
            .map(|idx| self.generation(idx))
            .max()
            .unwrap_or(0)
    }

    /// Person-backed node indices in arena order.
    pub fn person_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(|idx| !self.nodes[*idx].is_virtual())
    }

    /// Parents before children, siblings left to right.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.nodes[idx].children.iter().rev().copied());
        }
        order
    }

    /// Children before parents, siblings left to right.
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.nodes[idx].children.iter().copied());
        }
        order.reverse();
        order
    }
}

struct ForestBuilder<'a> {
    persons: &'a [Person],
    children_of: HashMap<&'a PersonId, Vec<usize>>,
    nodes: Vec<TreeNode>,
    index: HashMap<PersonId, usize>,
}

impl<'a> ForestBuilder<'a> {
    fn new(persons: &'a [Person]) -> Self {
        let mut children_of: HashMap<&'a PersonId, Vec<usize>> = HashMap::new();
        for (idx, person) in persons.iter().enumerate() {
            if let Some(pere) = person.pere.as_ref() {
                children_of.entry(pere).or_default().push(idx);
            }
            if let Some(mere) = person.mere.as_ref()
                && person.pere.as_ref() != Some(mere)
            {
                children_of.entry(mere).or_default().push(idx);
            }
        }
        for list in children_of.values_mut() {
            list.sort_by_key(|idx| sibling_key(&persons[*idx]));
        }
        Self {
            persons,
            children_of,
            nodes: Vec::with_capacity(persons.len() + 1),
            index: HashMap::with_capacity(persons.len()),
        }
    }

    /// Places a person and every not yet placed descendant, depth first.
    ///
    /// A person id is placed at most once across the whole forest: the first
    /// root (in collection order) that reaches it claims it. This also stops
    /// the walk on cyclic parent links. An explicit stack keeps deep lineages
    /// off the call stack.
    fn place(&mut self, person_idx: usize, parent: Option<usize>, depth: usize) -> Option<usize> {
        let persons = self.persons;
        let mut top = None;
        let mut stack = vec![(person_idx, parent, depth)];
        while let Some((person_idx, parent, depth)) = stack.pop() {
            let person = &persons[person_idx];
            if self.index.contains_key(&person.id) {
                tracing::debug!(id = %person.id, "person already placed, skipping re-entry");
                continue;
            }
            let slot = self.nodes.len();
            self.nodes.push(TreeNode::from_person(person, parent, depth));
            self.index.insert(person.id.clone(), slot);
            match (top, parent) {
                (None, _) => top = Some(slot),
                (Some(_), Some(parent)) => self.nodes[parent].children.push(slot),
                (Some(_), None) => {}
            }
            if let Some(children) = self.children_of.get(&person.id) {
                stack.extend(children.iter().rev().map(|child| (*child, Some(slot), depth + 1)));
            }
        }
        top
    }
}

type SiblingKey = (bool, i64, bool, Option<chrono::NaiveDate>);

/// `ordreNaissance` ascending, then birth date ascending; missing values last.
fn sibling_key(person: &Person) -> SiblingKey {
    let birth = person.birth_date();
    (
        person.ordre_naissance.is_none(),
        person.ordre_naissance.unwrap_or(0),
        birth.is_none(),
        birth,
    )
}

/// Builds the forest for a person collection. Returns `None` for an empty
/// collection; callers render an empty state instead.
pub fn build_forest(persons: &[Person]) -> Option<Forest> {
    if persons.is_empty() {
        return None;
    }

    let mut root_persons: Vec<usize> = persons
        .iter()
        .enumerate()
        .filter(|(_, person)| person.is_root())
        .map(|(idx, _)| idx)
        .collect();
    if root_persons.is_empty() {
        tracing::warn!(
            id = %persons[0].id,
            "no person without parents; using the first person as root"
        );
        root_persons.push(0);
    }

    let mut builder = ForestBuilder::new(persons);
    let use_virtual_root = root_persons.len() >= 2;
    let (parent, depth) = if use_virtual_root {
        builder.nodes.push(TreeNode::virtual_root());
        (Some(0), 1)
    } else {
        (None, 0)
    };

    let mut roots = Vec::with_capacity(root_persons.len());
    for person_idx in root_persons {
        if let Some(slot) = builder.place(person_idx, parent, depth) {
            roots.push(slot);
        }
    }
    if use_virtual_root {
        builder.nodes[0].children = roots.clone();
    }

    let unplaced: Vec<PersonId> = persons
        .iter()
        .filter(|person| !builder.index.contains_key(&person.id))
        .map(|person| person.id.clone())
        .collect();
    if !unplaced.is_empty() {
        tracing::warn!(count = unplaced.len(), "persons unreachable from any root were left out");
    }
    tracing::debug!(
        persons = builder.index.len(),
        roots = roots.len(),
        virtual_root = use_virtual_root,
        "forest built"
    );

    Some(Forest {
        root: if use_virtual_root {
            0
        } else {
            roots.first().copied().unwrap_or(0)
        },
        nodes: builder.nodes,
        roots,
        index: builder.index,
        unplaced,
    })
}
