use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{qualified_display, ApplicationNode, DependencyEdge, DependencyTarget, QualifiedName};

/// Depth-first search reporting one cycle per back edge.
pub(super) fn find_cycles(
    nodes: &BTreeMap<QualifiedName, ApplicationNode>,
    outbound: &BTreeMap<QualifiedName, BTreeSet<DependencyEdge>>,
) -> Vec<Vec<String>> {
    let mut search = Search {
        outbound,
        visited: HashSet::new(),
        stack: Vec::new(),
        cycles: Vec::new(),
    };
    for name in nodes.keys() {
        if !search.visited.contains(name) {
            search.visit(name);
        }
    }
    search.cycles
}

struct Search<'a> {
    outbound: &'a BTreeMap<QualifiedName, BTreeSet<DependencyEdge>>,
    visited: HashSet<&'a QualifiedName>,
    stack: Vec<&'a QualifiedName>,
    cycles: Vec<Vec<String>>,
}

impl<'a> Search<'a> {
    fn visit(&mut self, node: &'a QualifiedName) {
        self.visited.insert(node);
        self.stack.push(node);

        let callees: BTreeSet<&'a QualifiedName> = self
            .outbound
            .get(node)
            .into_iter()
            .flatten()
            .filter_map(|edge| match &edge.target {
                DependencyTarget::Application(callee) => Some(callee),
                DependencyTarget::External(_) => None,
            })
            .collect();

        for callee in callees {
            if let Some(pos) = self.stack.iter().position(|n| *n == callee) {
                let mut cycle: Vec<String> = self.stack[pos..].iter().map(|n| qualified_display(n)).collect();
                cycle.push(qualified_display(callee));
                self.cycles.push(cycle);
            } else if !self.visited.contains(callee) {
                self.visit(callee);
            }
        }

        self.stack.pop();
    }
}
