//! Evolution lineage trees
//!
//! The evolution-chain resource is a recursive `{species: {name}, evolves_to: [...]}`
//! document. It is copied into an array-backed tree without recursion, with
//! hard caps on depth and size, then flattened in pre-order.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Deepest chain accepted; real chains are at most three stages.
pub const MAX_LINEAGE_DEPTH: usize = 32;

/// Largest number of nodes accepted in one chain.
pub const MAX_LINEAGE_NODES: usize = 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LineageError {
    #[error("node at depth {depth} has no species name")]
    MissingName { depth: usize },

    #[error("node '{name}' has a non-list evolves_to")]
    BadChildren { name: String },

    #[error("chain deeper than {MAX_LINEAGE_DEPTH} levels")]
    TooDeep,

    #[error("chain larger than {MAX_LINEAGE_NODES} nodes")]
    TooLarge,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageNode {
    pub name: String,
    pub children: Vec<usize>,
}

/// Owned lineage tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageTree {
    nodes: Vec<LineageNode>,
}

impl LineageTree {
    /// Build a tree from the `chain` object of an evolution-chain response.
    pub fn from_chain(chain: &Value) -> Result<Self, LineageError> {
        let mut nodes: Vec<LineageNode> = Vec::new();
        // (node, parent index, depth)
        let mut pending: Vec<(&Value, Option<usize>, usize)> = vec![(chain, None, 1)];

        while let Some((value, parent, depth)) = pending.pop() {
            if depth > MAX_LINEAGE_DEPTH {
                return Err(LineageError::TooDeep);
            }
            if nodes.len() >= MAX_LINEAGE_NODES {
                return Err(LineageError::TooLarge);
            }

            let name = value
                .get("species")
                .and_then(|species| species.get("name"))
                .and_then(Value::as_str)
                .ok_or(LineageError::MissingName { depth })?;

            let index = nodes.len();
            nodes.push(LineageNode {
                name: name.to_string(),
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }

            match value.get("evolves_to") {
                None => {},
                Some(Value::Array(children)) => {
                    // Reversed so the first child is popped first.
                    for child in children.iter().rev() {
                        pending.push((child, Some(index), depth + 1));
                    }
                },
                Some(_) => {
                    return Err(LineageError::BadChildren {
                        name: name.to_string(),
                    })
                },
            }
        }

        Ok(Self { nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&LineageNode> {
        self.nodes.first()
    }

    /// Names in pre-order: each node before its descendants, siblings in order.
    pub fn pre_order(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.nodes.len());
        let mut stack = if self.is_empty() { vec![] } else { vec![0usize] };

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            names.push(node.name.clone());
            stack.extend(node.children.iter().rev().copied());
        }

        names
    }
}

/// Flatten a `chain` object to pre-order names; malformed chains yield an
/// empty lineage.
pub fn flatten_chain(chain: &Value) -> Vec<String> {
    match LineageTree::from_chain(chain) {
        Ok(tree) => tree.pre_order(),
        Err(e) => {
            debug!(error = %e, "Malformed evolution chain, using empty lineage");
            Vec::new()
        },
    }
}

/// A creature is evolved unless it is the root of its own lineage.
/// An empty lineage is never evolved.
pub fn is_evolved(name: &str, lineage: &[String]) -> bool {
    lineage.first().is_some_and(|root| root != name)
}
