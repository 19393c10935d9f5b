//! Dependency graph between workflow items.
//!
//! Design:
//! - Forward edges: item -> parents it waits for
//! - Reverse edges: parent -> children waiting for it (declaration order)
//! - Invariant: edges and reverse_edges must be kept in sync
//! - Parents must be declared before their children, so the graph is acyclic
//!   by construction

use crate::domain::identity::Identity;
use crate::error::DefinitionError;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Declaration order.
    nodes: Vec<Identity>,

    /// Forward edges: item -> parents it waits for
    edges: HashMap<Identity, HashSet<Identity>>,

    /// Reverse edges: parent -> children, O(1) "who waits for this item?"
    reverse_edges: HashMap<Identity, Vec<Identity>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.edges.contains_key(identity)
    }

    /// Declares an item together with its parents.
    ///
    /// Every parent must already be declared; the parent set is not modified
    /// afterwards except through [`DependencyGraph::add_child_edge`].
    pub fn add_item(&mut self, identity: Identity, parents: &[Identity]) -> Result<(), DefinitionError> {
        if self.contains(&identity) {
            return Err(DefinitionError::DuplicateIdentity(identity));
        }
        if let Some(missing) = parents.iter().find(|p| !self.contains(p)) {
            return Err(DefinitionError::ParentNotFound {
                child: identity,
                parent: missing.clone(),
            });
        }
        self.nodes.push(identity.clone());
        self.edges.insert(identity.clone(), HashSet::new());
        for parent in parents {
            self.add_child_edge(&identity, parent)?;
        }
        Ok(())
    }

    /// Adds `child -> parent`. Fails with `ParentNotFound` when the parent was
    /// never declared.
    pub fn add_child_edge(&mut self, child: &Identity, parent: &Identity) -> Result<(), DefinitionError> {
        if !self.contains(parent) || child == parent {
            return Err(DefinitionError::ParentNotFound {
                child: child.clone(),
                parent: parent.clone(),
            });
        }
        let parents = self.edges.entry(child.clone()).or_default();
        if parents.insert(parent.clone()) {
            self.reverse_edges
                .entry(parent.clone())
                .or_default()
                .push(child.clone());
        }
        Ok(())
    }

    /// Children of `identity` in declaration order.
    pub fn children_of(&self, identity: &Identity) -> &[Identity] {
        self.reverse_edges
            .get(identity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn parents_of(&self, identity: &Identity) -> impl Iterator<Item = &Identity> + '_ {
        self.edges.get(identity).into_iter().flatten()
    }

    pub fn has_parents(&self, identity: &Identity) -> bool {
        self.edges
            .get(identity)
            .map(|parents| !parents.is_empty())
            .unwrap_or(false)
    }

    /// Items without parents, in declaration order.
    pub fn startup_items(&self) -> impl Iterator<Item = &Identity> + '_ {
        self.nodes.iter().filter(|identity| !self.has_parents(identity))
    }

    pub fn nodes(&self) -> &[Identity] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Identity {
        Identity::new(name, "1.0")
    }

    #[test]
    fn children_and_parents_are_kept_in_sync() {
        let mut graph = DependencyGraph::new();
        graph.add_item(id("A"), &[]).unwrap();
        graph.add_item(id("S"), &[]).unwrap();
        graph.add_item(id("B"), &[id("A"), id("S")]).unwrap();
        graph.add_item(id("C"), &[id("A")]).unwrap();

        assert_eq!(graph.children_of(&id("A")), &[id("B"), id("C")]);
        assert_eq!(graph.children_of(&id("S")), &[id("B")]);
        let parents: HashSet<_> = graph.parents_of(&id("B")).cloned().collect();
        assert_eq!(parents, HashSet::from([id("A"), id("S")]));
        assert!(graph.children_of(&id("C")).is_empty());
    }

    #[test]
    fn missing_parent_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_item(id("A"), &[]).unwrap();
        let result = graph.add_item(id("B"), &[id("A"), id("X")]);
        assert!(matches!(
            result,
            Err(DefinitionError::ParentNotFound { ref parent, .. }) if *parent == id("X")
        ));
        assert!(!graph.contains(&id("B")));
    }

    #[test]
    fn an_item_cannot_be_its_own_parent() {
        let mut graph = DependencyGraph::new();
        graph.add_item(id("A"), &[]).unwrap();
        assert!(graph.add_child_edge(&id("A"), &id("A")).is_err());
    }

    #[test]
    fn duplicate_identity_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_item(id("A"), &[]).unwrap();
        assert!(matches!(
            graph.add_item(id("A"), &[]),
            Err(DefinitionError::DuplicateIdentity(_))
        ));
    }

    #[test]
    fn repeated_edge_is_recorded_once() {
        let mut graph = DependencyGraph::new();
        graph.add_item(id("A"), &[]).unwrap();
        graph.add_item(id("B"), &[id("A"), id("A")]).unwrap();
        assert_eq!(graph.children_of(&id("A")), &[id("B")]);
    }

    #[test]
    fn startup_items_have_no_parents() {
        let mut graph = DependencyGraph::new();
        graph.add_item(id("A"), &[]).unwrap();
        graph.add_item(id("B"), &[id("A")]).unwrap();
        graph.add_item(id("T"), &[]).unwrap();
        let startup: Vec<_> = graph.startup_items().cloned().collect();
        assert_eq!(startup, vec![id("A"), id("T")]);
    }
}
