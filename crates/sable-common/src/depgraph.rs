//! Dependency tracking between opaque entities.
//!
//! The graph records "A depends on B" edges and produces an ordering in
//! which every entity appears after everything it depends on, or the
//! first back edge found when the graph is cyclic. The analyser keeps one
//! graph for module imports and one for top-level declarations.
//!
//! The walk is an iterative three-colour depth-first search; the depth of
//! real declaration graphs rules out recursion.

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Result of [`DependencyGraph::ordered_entities`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DependencyOrder<E> {
    /// Every entity appears after all of its dependencies.
    Ordered(Vec<E>),
    /// The first back edge found: `from` depends (transitively) on `to`,
    /// which is already on the active dependency chain.
    Cycle { from: E, to: E },
}

#[derive(Debug)]
struct Entry<E> {
    entity: E,
    dependencies: Vec<E>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the active DFS chain.
    OnStack,
    /// Fully resolved and already in the output order.
    Done,
}

/// Records dependencies between opaque entities and orders them.
#[derive(Debug)]
pub struct DependencyGraph<E> {
    entries: Vec<Entry<E>>,
    index: FxHashMap<E, usize>,
}

impl<E> Default for DependencyGraph<E>
where
    E: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> DependencyGraph<E>
where
    E: Copy + Eq + Hash,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    fn entry_mut(&mut self, entity: E) -> &mut Entry<E> {
        let slot = match self.index.get(&entity) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.entries.push(Entry {
                    entity,
                    dependencies: Vec::new(),
                });
                self.index.insert(entity, i);
                i
            }
        };
        &mut self.entries[slot]
    }

    /// Add `entity` as a node with no dependencies (if not yet present).
    pub fn ensure_tracked(&mut self, entity: E) {
        let _ = self.entry_mut(entity);
    }

    /// Record that `entity` depends on `dependency`. Duplicate edges are
    /// ignored; edge order is otherwise preserved.
    pub fn add_dependency(&mut self, entity: E, dependency: E) {
        let entry = self.entry_mut(entity);
        if !entry.dependencies.contains(&dependency) {
            entry.dependencies.push(dependency);
        }
    }

    /// Number of tracked entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dependencies recorded for `entity`, in edge-insertion order.
    #[must_use]
    pub fn dependencies(&self, entity: E) -> &[E] {
        self.index
            .get(&entity)
            .map_or(&[], |&i| self.entries[i].dependencies.as_slice())
    }

    /// Produce a dependency-respecting order over every tracked entity
    /// (and every entity referenced as a dependency), or the first back
    /// edge when the graph is cyclic.
    ///
    /// Entities are visited in tracking order and each entity's
    /// dependencies in edge order, so the result is deterministic.
    #[must_use]
    pub fn ordered_entities(&self) -> DependencyOrder<E> {
        let mut color: FxHashMap<E, Color> = FxHashMap::default();
        let mut order: Vec<E> = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            if let Some((from, to)) = self.visit(entry.entity, &mut color, &mut order) {
                return DependencyOrder::Cycle { from, to };
            }
        }

        DependencyOrder::Ordered(order)
    }

    /// Iterative DFS from `root`. Returns the back edge on cycle.
    fn visit(
        &self,
        root: E,
        color: &mut FxHashMap<E, Color>,
        order: &mut Vec<E>,
    ) -> Option<(E, E)> {
        if color.get(&root) == Some(&Color::Done) {
            return None;
        }

        // (entity, index of the next dependency to look at)
        let mut stack: Vec<(E, usize)> = vec![(root, 0)];
        color.insert(root, Color::OnStack);

        while let Some(&mut (entity, ref mut next)) = stack.last_mut() {
            let deps = self.dependencies(entity);
            if *next < deps.len() {
                let dep = deps[*next];
                *next += 1;
                match color.get(&dep) {
                    Some(Color::Done) => {}
                    Some(Color::OnStack) => return Some((entity, dep)),
                    None => {
                        color.insert(dep, Color::OnStack);
                        stack.push((dep, 0));
                    }
                }
            } else {
                color.insert(entity, Color::Done);
                order.push(entity);
                stack.pop();
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_entity_with_no_dependencies_appears() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.ensure_tracked(7);
        assert_eq!(graph.ordered_entities(), DependencyOrder::Ordered(vec![7]));
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 3);
        match graph.ordered_entities() {
            DependencyOrder::Ordered(order) => assert_eq!(order, vec![3, 2, 1]),
            DependencyOrder::Cycle { .. } => panic!("unexpected cycle"),
        }
    }

    #[test]
    fn duplicate_edges_are_ignored() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(1, 2);
        assert_eq!(graph.dependencies(1), &[2]);
    }

    #[test]
    fn fan_in_preserves_edge_order() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_dependency(1, 10);
        graph.add_dependency(1, 11);
        graph.add_dependency(1, 12);
        match graph.ordered_entities() {
            DependencyOrder::Ordered(order) => assert_eq!(order, vec![10, 11, 12, 1]),
            DependencyOrder::Cycle { .. } => panic!("unexpected cycle"),
        }
    }

    #[test]
    fn two_cycle_reports_the_back_edge() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(2, 1);
        assert_eq!(
            graph.ordered_entities(),
            DependencyOrder::Cycle { from: 2, to: 1 }
        );
    }

    #[test]
    fn self_cycle_is_detected() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_dependency(4, 4);
        assert_eq!(
            graph.ordered_entities(),
            DependencyOrder::Cycle { from: 4, to: 4 }
        );
    }

    #[test]
    fn untracked_dependencies_are_still_ordered() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        // 2 is never explicitly tracked, only referenced.
        graph.add_dependency(1, 2);
        match graph.ordered_entities() {
            DependencyOrder::Ordered(order) => assert_eq!(order, vec![2, 1]),
            DependencyOrder::Cycle { .. } => panic!("unexpected cycle"),
        }
    }

    #[test]
    fn diamond_is_ordered_once() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        graph.add_dependency(1, 2);
        graph.add_dependency(1, 3);
        graph.add_dependency(2, 4);
        graph.add_dependency(3, 4);
        match graph.ordered_entities() {
            DependencyOrder::Ordered(order) => {
                assert_eq!(order, vec![4, 2, 3, 1]);
            }
            DependencyOrder::Cycle { .. } => panic!("unexpected cycle"),
        }
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let mut graph: DependencyGraph<u32> = DependencyGraph::new();
        for i in 0..100_000u32 {
            graph.add_dependency(i, i + 1);
        }
        match graph.ordered_entities() {
            DependencyOrder::Ordered(order) => {
                assert_eq!(order.len(), 100_001);
                assert_eq!(order[0], 100_000);
                assert_eq!(*order.last().unwrap(), 0);
            }
            DependencyOrder::Cycle { .. } => panic!("unexpected cycle"),
        }
    }
}
