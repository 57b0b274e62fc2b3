//! Initialization ordering.
//!
//! Orders the declarations that request initialization so that a service's
//! initializer never runs before the initializers of the services it
//! references.
//!
//! Only edges between two initializing declarations constrain the order;
//! a reference to a service without an initializer adds no edge.
//!
//! # Algorithm
//! Kahn's algorithm over an adjacency matrix:
//! 1. Row `i`, column `j` is set if declaration `i` references `j`.
//! 2. Every row with no set cells is queued, in declaration order.
//! 3. Pop the queue front, emit it, clear its column in every remaining
//!    row; rows that become empty are queued (FIFO) as they empty,
//!    scanning rows in declaration order.
//! 4. Rows left over once the queue drains form at least one cycle.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::declaration::ServiceDeclaration;
use crate::error::CyclicDependencyError;

/// Builds the initialization order for a set of declarations.
#[derive(Debug, Default)]
pub struct InitializationGraph {
    declarations: Vec<Arc<ServiceDeclaration>>,
}

impl InitializationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration; a later declaration with the same id replaces
    /// the earlier one in place.
    pub fn add_declaration(&mut self, declaration: Arc<ServiceDeclaration>) {
        match self
            .declarations
            .iter_mut()
            .find(|existing| existing.id() == declaration.id())
        {
            Some(existing) => *existing = declaration,
            None => self.declarations.push(declaration),
        }
    }

    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Returns the declarations in a safe initialization order.
    ///
    /// Ties between declarations that become ready together are broken
    /// by the order in which they became ready, then by declaration order.
    ///
    /// # Errors
    /// Returns [`CyclicDependencyError`] if the references between the
    /// declarations form a cycle (including a self-reference).
    #[instrument(skip(self), fields(nodes = self.declarations.len()), name = "initialization_sort")]
    pub fn sorted(&self) -> Result<Vec<Arc<ServiceDeclaration>>, CyclicDependencyError> {
        let mut matrix = self.build_matrix();
        let n = matrix.len();

        // outgoing edge count per row
        let mut pending: Vec<usize> = matrix
            .iter()
            .map(|row| row.iter().filter(|&&edge| edge).count())
            .collect();
        let mut removed = vec![false; n];
        let mut ready = VecDeque::new();

        for node in 0..n {
            if pending[node] == 0 {
                removed[node] = true;
                ready.push_back(node);
            }
        }

        let mut order = Vec::with_capacity(n);

        while let Some(done) = ready.pop_front() {
            order.push(done);

            for row in 0..n {
                if removed[row] || !matrix[row][done] {
                    continue;
                }

                matrix[row][done] = false;
                pending[row] -= 1;

                if pending[row] == 0 {
                    removed[row] = true;
                    ready.push_back(row);
                }
            }
        }

        if order.len() < n {
            let chain = self.find_cycle(&matrix, &removed);
            warn!(cycle = ?chain, "Cyclic dependency between initializers");
            return Err(CyclicDependencyError { chain });
        }

        debug!(
            order = ?order.iter().map(|&i| self.declarations[i].id()).collect::<Vec<_>>(),
            "Initialization order resolved"
        );

        Ok(order
            .into_iter()
            .map(|i| Arc::clone(&self.declarations[i]))
            .collect())
    }

    /// `matrix[i][j]` is set iff declaration `i` references declaration `j`.
    fn build_matrix(&self) -> Vec<Vec<bool>> {
        let n = self.declarations.len();
        let index: HashMap<&str, usize> = self
            .declarations
            .iter()
            .enumerate()
            .map(|(i, decl)| (decl.id(), i))
            .collect();

        let mut matrix = vec![vec![false; n]; n];
        for (row, decl) in self.declarations.iter().enumerate() {
            for dep in decl.dependency_ids() {
                if let Some(&col) = index.get(dep) {
                    matrix[row][col] = true;
                }
            }
        }
        matrix
    }

    /// Walks leftover edges until a node repeats.
    ///
    /// Every leftover row still has an edge, and every leftover edge
    /// points at a leftover row, so the walk always closes a loop.
    fn find_cycle(&self, matrix: &[Vec<bool>], removed: &[bool]) -> Vec<String> {
        let Some(start) = removed.iter().position(|&r| !r) else {
            return Vec::new();
        };

        let mut path: Vec<usize> = Vec::new();
        let mut current = start;

        loop {
            if let Some(pos) = path.iter().position(|&node| node == current) {
                let mut chain: Vec<String> = path[pos..]
                    .iter()
                    .map(|&i| self.declarations[i].id().to_string())
                    .collect();
                chain.push(self.declarations[current].id().to_string());
                return chain;
            }

            path.push(current);

            match matrix[current]
                .iter()
                .enumerate()
                .position(|(col, &edge)| edge && !removed[col])
            {
                Some(next) => current = next,
                None => {
                    return path
                        .iter()
                        .map(|&i| self.declarations[i].id().to_string())
                        .collect();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn decl(id: &str, arguments: Value) -> Arc<ServiceDeclaration> {
        Arc::new(
            ServiceDeclaration::new(&json!({
                "id": id,
                "constructor": "initialization-service",
                "arguments": arguments,
                "initialization": {"method": "init", "hasCallback": true}
            }))
            .unwrap(),
        )
    }

    fn sorted_ids(graph: &InitializationGraph) -> Vec<String> {
        graph
            .sorted()
            .unwrap()
            .iter()
            .map(|d| d.id().to_string())
            .collect()
    }

    #[test]
    fn empty_graph() {
        let graph = InitializationGraph::new();
        assert!(graph.is_empty());
        assert!(graph.sorted().unwrap().is_empty());
    }

    #[test]
    fn independent_nodes_keep_declaration_order() {
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("b", json!([])));
        graph.add_declaration(decl("a", json!([])));
        graph.add_declaration(decl("c", json!([])));

        assert_eq!(sorted_ids(&graph), vec!["b", "a", "c"]);
    }

    #[test]
    fn dependencies_come_first() {
        // C and D both depend on A and B, declared before them
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("service.c", json!(["@service.a", "@service.b"])));
        graph.add_declaration(decl("service.d", json!(["@service.a", "@service.b"])));
        graph.add_declaration(decl("service.a", json!([])));
        graph.add_declaration(decl("service.b", json!([])));

        assert_eq!(
            sorted_ids(&graph),
            vec!["service.a", "service.b", "service.c", "service.d"]
        );
    }

    #[test]
    fn chain_is_ordered() {
        // a → b → c
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("a", json!(["@b"])));
        graph.add_declaration(decl("b", json!(["@c"])));
        graph.add_declaration(decl("c", json!([])));

        assert_eq!(sorted_ids(&graph), vec!["c", "b", "a"]);
    }

    #[test]
    fn ready_nodes_are_fifo() {
        // x and y both wait on z; z is ready first, x and y become
        // ready together and keep declaration order
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("free", json!([])));
        graph.add_declaration(decl("y", json!(["@z"])));
        graph.add_declaration(decl("x", json!(["@z"])));
        graph.add_declaration(decl("z", json!([])));

        assert_eq!(sorted_ids(&graph), vec!["free", "z", "y", "x"]);
    }

    #[test]
    fn references_outside_the_graph_add_no_edge() {
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("a", json!(["@not.initialized", "@service_container"])));

        assert_eq!(sorted_ids(&graph), vec!["a"]);
    }

    #[test]
    fn call_arguments_create_edges() {
        let with_call = Arc::new(
            ServiceDeclaration::new(&json!({
                "id": "a",
                "constructor": "c",
                "calls": [{"method": "setB", "arguments": ["@b"]}],
                "initialization": {"method": "init"}
            }))
            .unwrap(),
        );

        let mut graph = InitializationGraph::new();
        graph.add_declaration(with_call);
        graph.add_declaration(decl("b", json!([])));

        assert_eq!(sorted_ids(&graph), vec!["b", "a"]);
    }

    #[test]
    fn detect_cycle() {
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("a", json!(["@b"])));
        graph.add_declaration(decl("b", json!(["@a"])));
        graph.add_declaration(decl("c", json!([])));

        let err = graph.sorted().unwrap_err();
        assert_eq!(err.chain, vec!["a", "b", "a"]);
    }

    #[test]
    fn detect_self_reference() {
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("a", json!(["@a"])));

        let err = graph.sorted().unwrap_err();
        assert_eq!(err.chain, vec!["a", "a"]);
    }

    #[test]
    fn cycle_behind_a_dependent() {
        // d waits on the a ⇄ b cycle; the chain names only the cycle
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("d", json!(["@a"])));
        graph.add_declaration(decl("a", json!(["@b"])));
        graph.add_declaration(decl("b", json!(["@a"])));

        let err = graph.sorted().unwrap_err();
        assert_eq!(err.chain, vec!["a", "b", "a"]);
    }

    #[test]
    fn duplicate_ids_replace() {
        let mut graph = InitializationGraph::new();
        graph.add_declaration(decl("a", json!(["@b"])));
        graph.add_declaration(decl("b", json!([])));
        graph.add_declaration(decl("a", json!([])));

        assert_eq!(graph.len(), 2);
        assert_eq!(sorted_ids(&graph), vec!["a", "b"]);
    }
}
