//! Deterministic depth-first topological sort

use std::collections::HashSet;
use std::hash::Hash;

/// The successor relation handed to [`topologically_sorted`] loops back on itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycle detected at `{node}`")]
pub struct CycleDetected {
    pub node: String,
}

/// Sort everything reachable from `roots` so that every node comes after all
/// of its successors.
///
/// Roots and successor lists are visited in ascending `key` order, which makes
/// the output identical across runs for identical inputs. Nodes reachable
/// from several places appear once, at their first completed visit.
pub fn topologically_sorted<T, N, I, K, S>(
    roots: I,
    key: K,
    successors: S,
) -> Result<Vec<T>, CycleDetected>
where
    T: Clone + Eq + Hash,
    N: Ord + ToString,
    I: IntoIterator<Item = T>,
    K: Fn(&T) -> N,
    S: Fn(&T) -> Vec<T>,
{
    let mut roots: Vec<T> = roots.into_iter().collect();
    roots.sort_by(|a, b| key(a).cmp(&key(b)));

    let mut walk = Walk {
        key: &key,
        successors: &successors,
        visiting: HashSet::new(),
        visited: HashSet::new(),
        order: Vec::new(),
    };
    for root in roots {
        walk.visit(root)?;
    }
    Ok(walk.order)
}

struct Walk<'a, T, K, S> {
    key: &'a K,
    successors: &'a S,
    visiting: HashSet<T>,
    visited: HashSet<T>,
    order: Vec<T>,
}

impl<T, N, K, S> Walk<'_, T, K, S>
where
    T: Clone + Eq + Hash,
    N: Ord + ToString,
    K: Fn(&T) -> N,
    S: Fn(&T) -> Vec<T>,
{
    fn visit(&mut self, node: T) -> Result<(), CycleDetected> {
        if self.visited.contains(&node) {
            return Ok(());
        }
        if !self.visiting.insert(node.clone()) {
            return Err(CycleDetected {
                node: (self.key)(&node).to_string(),
            });
        }

        let mut next = (self.successors)(&node);
        next.sort_by(|a, b| (self.key)(a).cmp(&(self.key)(b)));
        for successor in next {
            self.visit(successor)?;
        }

        self.visiting.remove(&node);
        self.visited.insert(node.clone());
        self.order.push(node);
        Ok(())
    }
}
