//! Caller/callee graph recorded during semantic analysis

use serde::{Deserialize, Serialize};

/// Directed graph of caller → callee function names. Edges are deduplicated
/// and kept in first-insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.nodes.contains(&name) {
            self.nodes.push(name);
        }
    }

    pub fn add_edge(&mut self, caller: impl Into<String>, callee: impl Into<String>) {
        let caller = caller.into();
        let callee = callee.into();
        self.add_node(caller.clone());
        self.add_node(callee.clone());

        let edge = (caller, callee);
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
    }

    pub fn contains_edge(&self, caller: &str, callee: &str) -> bool {
        self.edges.iter().any(|(from, to)| from == caller && to == callee)
    }

    pub fn callees<'a>(&'a self, caller: &'a str) -> impl Iterator<Item = &'a str> {
        self.edges
            .iter()
            .filter(move |(from, _)| from == caller)
            .map(|(_, to)| to.as_str())
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_deduplicated() {
        let mut graph = CallGraph::new();
        graph.add_edge("main", "draw");
        graph.add_edge("main", "draw");
        graph.add_edge("main", "beep");

        assert_eq!(graph.edges().len(), 2);
        assert!(graph.contains_edge("main", "draw"));
        let callees: Vec<&str> = graph.callees("main").collect();
        assert_eq!(callees, vec!["draw", "beep"]);
    }

    #[test]
    fn self_edges_model_recursion() {
        let mut graph = CallGraph::new();
        graph.add_edge("factorial", "factorial");
        assert!(graph.contains_edge("factorial", "factorial"));
        assert_eq!(graph.nodes().len(), 1);
    }
}
