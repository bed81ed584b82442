//! Join-path resolution over the relationship graph.
//!
//! Breadth-first search finds the shortest relationship path between two
//! models; the first edge reaching each target wins, with no cost-based
//! selection. Multi-target queries collapse their paths into a
//! deduplicated join tree.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use super::EntityGraph;
use crate::error::{SemanticError, SemanticResult};
use crate::model::Cardinality;

/// One join step: `from_model.from_column = to_model.to_column`.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinStep {
    pub from_model: String,
    pub to_model: String,
    pub from_column: String,
    pub to_column: String,
    pub cardinality: Cardinality,
}

impl JoinStep {
    /// Whether this step can multiply rows on the `from` side.
    pub fn fans_out(&self) -> bool {
        self.cardinality.fans_out()
    }
}

/// An ordered sequence of join steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinPath {
    pub steps: Vec<JoinStep>,
}

impl JoinPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every model touched by the path, in traversal order.
    pub fn models(&self) -> Vec<&str> {
        let mut seen = vec![];
        for step in &self.steps {
            for name in [step.from_model.as_str(), step.to_model.as_str()] {
                if !seen.contains(&name) {
                    seen.push(name);
                }
            }
        }
        seen
    }
}

/// Parent pointer stored during BFS so paths reconstruct in O(V) memory
/// instead of cloning a path per frontier node.
struct ParentInfo {
    parent: NodeIndex,
    edge_idx: EdgeIndex,
}

impl EntityGraph {
    /// Shortest relationship path between two models.
    pub fn find_path(&self, from: &str, to: &str) -> SemanticResult<JoinPath> {
        if from == to {
            return Ok(JoinPath::new());
        }

        let from_idx = self
            .node_indices
            .get(from)
            .ok_or_else(|| SemanticError::UnknownModel(from.into()))?;
        let to_idx = self
            .node_indices
            .get(to)
            .ok_or_else(|| SemanticError::UnknownModel(to.into()))?;

        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut parents: HashMap<NodeIndex, ParentInfo> = HashMap::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();

        queue.push_back(*from_idx);
        visited.insert(*from_idx);

        while let Some(current) = queue.pop_front() {
            for edge_ref in self.entity_graph.edges(current) {
                let neighbor = edge_ref.target();
                if visited.contains(&neighbor) {
                    continue;
                }

                parents.insert(
                    neighbor,
                    ParentInfo {
                        parent: current,
                        edge_idx: edge_ref.id(),
                    },
                );

                if neighbor == *to_idx {
                    return Ok(self.reconstruct_path(*from_idx, neighbor, &parents));
                }

                visited.insert(neighbor);
                queue.push_back(neighbor);
            }
        }

        Err(SemanticError::UnreachableJoin {
            from: from.into(),
            to: to.into(),
        })
    }

    /// Walk parent pointers backward from the destination, then reverse.
    fn reconstruct_path(
        &self,
        from_idx: NodeIndex,
        to_idx: NodeIndex,
        parents: &HashMap<NodeIndex, ParentInfo>,
    ) -> JoinPath {
        let mut steps = vec![];
        let mut current = to_idx;

        while current != from_idx {
            let info = &parents[&current];
            let edge = &self.entity_graph[info.edge_idx];
            steps.push(JoinStep {
                from_model: self.entity_graph[info.parent].name.clone(),
                to_model: self.entity_graph[current].name.clone(),
                from_column: edge.from_column.clone(),
                to_column: edge.to_column.clone(),
                cardinality: edge.cardinality,
            });
            current = info.parent;
        }

        steps.reverse();
        JoinPath { steps }
    }

    pub fn has_path(&self, from: &str, to: &str) -> bool {
        self.find_path(from, to).is_ok()
    }

    /// Resolve the join tree from a base model to every target model.
    ///
    /// Steps are deduplicated across targets so a shared intermediate
    /// relation is joined once.
    pub fn resolve_joins(&self, base: &str, targets: &[&str]) -> SemanticResult<Vec<JoinStep>> {
        let mut steps: Vec<JoinStep> = vec![];
        let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

        for target in targets {
            if *target == base {
                continue;
            }
            let path = self.find_path(base, target)?;
            for step in path.steps {
                let pair = (step.from_model.clone(), step.to_model.clone());
                if seen_pairs.insert(pair) {
                    steps.push(step);
                }
            }
        }

        Ok(steps)
    }
}
