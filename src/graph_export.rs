//! Export of the declared dependency graph for visualization.
//!
//! The graph is built from declarations only; nothing is constructed. Nodes
//! are identified by the key's debug form so that two tokens sharing a
//! description stay distinct.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::injector::Injector;
use crate::key::Key;

/// A key in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Unique identifier for this node
    pub id: String,
    /// Token description or class type name
    pub label: String,
    /// Binding kind: value, class, factory, async-factory, multi,
    /// implicit-class or unbound
    pub kind: String,
    /// Whether the key already has a cached instance
    pub resolved: bool,
}

/// A dependency edge: `from` needs `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
}

/// Declared dependency graph of one injector.
///
/// # Examples
///
/// ```
/// use ferrous_inject::{create_token, Injector};
///
/// let host = create_token::<String>("HOST");
/// let url = create_token::<String>("URL");
///
/// let injector = Injector::new();
/// injector.provide_value(&host, "localhost".to_string()).unwrap();
/// injector
///     .provide_factory(&url, vec![host.key()], |args| Ok(format!("http://{}", args.take::<String>()?)))
///     .unwrap();
///
/// let graph = injector.dependency_graph();
/// assert_eq!(graph.nodes.len(), 2);
/// assert_eq!(graph.edges.len(), 1);
/// assert!(graph.to_json().unwrap().contains("\"label\": \"HOST\""));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub injector: String,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl DependencyGraph {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Renders the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut output = String::new();
        output.push_str("digraph DependencyGraph {\n");
        output.push_str("  rankdir=TB;\n");
        output.push_str("  node [shape=box];\n\n");

        for node in &self.nodes {
            let color = match node.kind.as_str() {
                "value" => "lightblue",
                "multi" => "lightgreen",
                "unbound" => "salmon",
                _ => "white",
            };
            output.push_str(&format!(
                "  \"{}\" [label=\"{}\\n({})\", fillcolor={}, style=filled];\n",
                escape_dot(&node.id),
                escape_dot(&node.label),
                node.kind,
                color
            ));
        }

        output.push('\n');
        for edge in &self.edges {
            output.push_str(&format!(
                "  \"{}\" -> \"{}\";\n",
                escape_dot(&edge.from),
                escape_dot(&edge.to)
            ));
        }

        output.push_str("}\n");
        output
    }

    pub fn node(&self, label: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.label == label)
    }
}

impl Injector {
    /// Builds the declared dependency graph.
    pub fn dependency_graph(&self) -> DependencyGraph {
        let declared = self.declared_nodes();
        let mut seen: HashSet<Key> = declared.iter().map(|node| node.key).collect();
        let mut graph = DependencyGraph {
            injector: self.name().to_string(),
            ..DependencyGraph::default()
        };

        for node in &declared {
            graph.nodes.push(GraphNode {
                id: node_id(&node.key),
                label: node.key.description().to_string(),
                kind: node.kind.to_string(),
                resolved: self.is_resolved(&node.key),
            });
        }

        for node in &declared {
            for dep in &node.deps {
                if seen.insert(*dep) {
                    graph.nodes.push(GraphNode {
                        id: node_id(dep),
                        label: dep.description().to_string(),
                        kind: if dep.is_multi() { "multi" } else { "unbound" }.to_string(),
                        resolved: self.is_resolved(dep),
                    });
                }
                graph.edges.push(GraphEdge {
                    from: node_id(&node.key),
                    to: node_id(dep),
                });
            }
        }

        graph
    }
}

fn node_id(key: &Key) -> String {
    format!("{:?}", key)
}

/// Escapes text for use inside a quoted DOT string.
fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
