//! Graph validation without construction.
//!
//! Every binding declares its dependencies up front, so an injector can check
//! the whole graph for missing providers and cycles before anything is built.
//! This is the cheap way to fail fast at startup instead of on the first
//! request that happens to touch a broken key.

use std::collections::{HashMap, HashSet};

use crate::error::{DiError, DiResult};
use crate::injector::Injector;
use crate::key::Key;
use crate::registration::Strategy;

/// A declared dependency with no provider behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingDependency {
    /// The key whose binding declares the dependency
    pub dependent: Key,
    /// The unbound key
    pub missing: Key,
}

/// Outcome of [`Injector::validate`].
///
/// # Examples
///
/// ```
/// use ferrous_inject::{create_token, Injector};
///
/// let config = create_token::<String>("CONFIG");
/// let service = create_token::<usize>("SERVICE");
///
/// let injector = Injector::new();
/// injector
///     .provide_factory(&service, vec![config.key()], |args| Ok(args.take::<String>()?.len()))
///     .unwrap();
///
/// let report = injector.validate();
/// assert!(!report.is_valid());
/// assert_eq!(report.missing[0].missing, config.key());
///
/// injector.provide_value(&config, "debug".to_string()).unwrap();
/// assert!(injector.validate().is_valid());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub injector: String,
    pub missing: Vec<MissingDependency>,
    /// Each cycle starts and ends with the same key
    pub cycles: Vec<Vec<Key>>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.cycles.is_empty()
    }

    /// Converts the first problem into the error `inject()` would report.
    pub fn into_result(self) -> DiResult<()> {
        if let Some(cycle) = self.cycles.into_iter().next() {
            return Err(DiError::Circular { chain: cycle });
        }
        if let Some(problem) = self.missing.into_iter().next() {
            return Err(DiError::NoProvider {
                key: problem.missing,
                injector: self.injector,
            });
        }
        Ok(())
    }

    /// Formats all problems for display.
    pub fn format_issues(&self) -> String {
        let mut output = String::new();

        if !self.missing.is_empty() {
            output.push_str("Missing providers:\n");
            for problem in &self.missing {
                output.push_str(&format!(
                    "  - '{}' depends on unbound '{}'\n",
                    problem.dependent, problem.missing
                ));
            }
        }

        if !self.cycles.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str("Cycles:\n");
            for cycle in &self.cycles {
                let names: Vec<_> = cycle.iter().map(Key::description).collect();
                output.push_str(&format!("  - {}\n", names.join(" -> ")));
            }
        }

        output
    }
}

/// One key of the declared graph and its direct dependencies.
pub(crate) struct Node {
    pub(crate) key: Key,
    #[cfg_attr(not(feature = "graph-export"), allow(dead_code))]
    pub(crate) kind: &'static str,
    pub(crate) deps: Vec<Key>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

impl Injector {
    /// Checks every declared dependency without constructing anything.
    ///
    /// Multi tokens are never reported missing (they resolve to an empty
    /// list), and with implicit class construction enabled neither are class
    /// keys; their own declarations are checked instead.
    pub fn validate(&self) -> ValidationReport {
        let nodes = self.declared_nodes();
        let index: HashMap<Key, &Node> = nodes.iter().map(|node| (node.key, node)).collect();

        let mut missing = Vec::new();
        for node in &nodes {
            for dep in &node.deps {
                if !index.contains_key(dep) && !dep.is_multi() {
                    missing.push(MissingDependency {
                        dependent: node.key,
                        missing: *dep,
                    });
                }
            }
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut cycles = Vec::new();
        for node in &nodes {
            if !marks.contains_key(&node.key) {
                visit(node.key, &index, &mut marks, &mut stack, &mut cycles);
            }
        }

        let report = ValidationReport {
            injector: self.name().to_string(),
            missing,
            cycles,
        };
        tracing::debug!(
            injector = %self.name(),
            keys = nodes.len(),
            missing = report.missing.len(),
            cycles = report.cycles.len(),
            "validated dependency graph"
        );
        report
    }

    /// Bound keys, multi keys with contributions and reachable implicit
    /// class keys, sorted by description.
    pub(crate) fn declared_nodes(&self) -> Vec<Node> {
        let implicit_classes = self.config().implicit_classes;
        let mut nodes: Vec<Node> = self.with_registry(|registry| {
            let bound = registry.iter().map(|(key, strategy)| Node {
                key: *key,
                kind: strategy.kind(),
                deps: strategy.dependencies(),
            });
            let multi = registry.iter_contributions().map(|(key, items)| Node {
                key: *key,
                kind: "multi",
                deps: items.iter().flat_map(Strategy::dependencies).collect(),
            });
            bound.chain(multi).collect()
        });

        if implicit_classes {
            let mut known: HashSet<Key> = nodes.iter().map(|node| node.key).collect();
            let mut next = 0;
            while next < nodes.len() {
                let deps = nodes[next].deps.clone();
                for dep in deps {
                    if let Some(vtable) = dep.class_vtable() {
                        if known.insert(dep) {
                            nodes.push(Node {
                                key: dep,
                                kind: "implicit-class",
                                deps: (vtable.dependencies)(),
                            });
                        }
                    }
                }
                next += 1;
            }
        }

        nodes.sort_by(|a, b| a.key.description().cmp(b.key.description()));
        nodes
    }
}

fn visit(
    key: Key,
    index: &HashMap<Key, &Node>,
    marks: &mut HashMap<Key, Mark>,
    stack: &mut Vec<Key>,
    cycles: &mut Vec<Vec<Key>>,
) {
    marks.insert(key, Mark::Visiting);
    stack.push(key);

    if let Some(node) = index.get(&key) {
        for dep in &node.deps {
            match marks.get(dep) {
                Some(Mark::Visiting) => {
                    if let Some(pos) = stack.iter().position(|k| k == dep) {
                        let mut chain = stack[pos..].to_vec();
                        chain.push(*dep);
                        cycles.push(chain);
                    }
                }
                Some(Mark::Done) => {}
                None => visit(*dep, index, marks, stack, cycles),
            }
        }
    }

    stack.pop();
    marks.insert(key, Mark::Done);
}
