//! Graph diffing: what changes when a candidate replaces the active graph.
//!
//! Logged at swap time and shown by the `graph --diff` command.

use super::{Effect, Graph, Node};

/// A single change between two graphs.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphChange {
    TempoChanged {
        old: f64,
        new: f64,
    },
    KeyChanged {
        old: Option<String>,
        new: Option<String>,
    },
    NodeAdded {
        name: String,
    },
    NodeRemoved {
        name: String,
    },
    SourceChanged {
        name: String,
    },
    ChainChanged {
        name: String,
        old: Vec<Effect>,
        new: Vec<Effect>,
    },
    PlacementChanged {
        name: String,
        old: f64,
        new: f64,
    },
    FlagsChanged {
        name: String,
        muted: bool,
        solo: bool,
    },
    ExportAdded {
        file: String,
    },
    ExportRemoved {
        file: String,
    },
}

/// A structured diff between two graphs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphDiff {
    pub changes: Vec<GraphChange>,
}

impl GraphDiff {
    /// Compute the changes that turn `old` into `new`.
    pub fn between(old: &Graph, new: &Graph) -> Self {
        let mut changes = Vec::new();

        if (old.globals.bpm - new.globals.bpm).abs() > f64::EPSILON {
            changes.push(GraphChange::TempoChanged {
                old: old.globals.bpm,
                new: new.globals.bpm,
            });
        }
        if old.globals.key != new.globals.key {
            changes.push(GraphChange::KeyChanged {
                old: old.globals.key.clone(),
                new: new.globals.key.clone(),
            });
        }

        diff_nodes(&old.nodes, &new.nodes, &mut changes);

        let old_files: Vec<&str> = old.exports.iter().map(|e| e.file.as_str()).collect();
        let new_files: Vec<&str> = new.exports.iter().map(|e| e.file.as_str()).collect();
        for file in &old_files {
            if !new_files.contains(file) {
                changes.push(GraphChange::ExportRemoved {
                    file: file.to_string(),
                });
            }
        }
        for file in &new_files {
            if !old_files.contains(file) {
                changes.push(GraphChange::ExportAdded {
                    file: file.to_string(),
                });
            }
        }

        GraphDiff { changes }
    }

    /// Whether this diff contains no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Generate human-readable summaries for each change.
    pub fn summaries(&self) -> Vec<String> {
        self.changes.iter().map(summary_for_change).collect()
    }
}

fn diff_nodes(old: &[Node], new: &[Node], changes: &mut Vec<GraphChange>) {
    for n in old {
        if !new.iter().any(|m| m.name == n.name) {
            changes.push(GraphChange::NodeRemoved {
                name: n.name.clone(),
            });
        }
    }

    for n in new {
        if !old.iter().any(|m| m.name == n.name) {
            changes.push(GraphChange::NodeAdded {
                name: n.name.clone(),
            });
        }
    }

    // Nodes present in both
    for new_node in new {
        let Some(old_node) = old.iter().find(|n| n.name == new_node.name) else {
            continue;
        };
        let name = || new_node.name.clone();

        if old_node.kind != new_node.kind {
            changes.push(GraphChange::SourceChanged { name: name() });
        }

        let old_chain: Vec<Effect> = old_node.effects().cloned().collect();
        let new_chain: Vec<Effect> = new_node.effects().cloned().collect();
        if old_chain != new_chain {
            changes.push(GraphChange::ChainChanged {
                name: name(),
                old: old_chain,
                new: new_chain,
            });
        }

        if (old_node.placement - new_node.placement).abs() > f64::EPSILON {
            changes.push(GraphChange::PlacementChanged {
                name: name(),
                old: old_node.placement,
                new: new_node.placement,
            });
        }

        if old_node.muted != new_node.muted || old_node.solo != new_node.solo {
            changes.push(GraphChange::FlagsChanged {
                name: name(),
                muted: new_node.muted,
                solo: new_node.solo,
            });
        }
    }
}

fn summary_for_change(change: &GraphChange) -> String {
    match change {
        GraphChange::TempoChanged { old, new } => format!("tempo {old} → {new} bpm"),
        GraphChange::KeyChanged { old, new } => format!(
            "key {} → {}",
            old.as_deref().unwrap_or("none"),
            new.as_deref().unwrap_or("none")
        ),
        GraphChange::NodeAdded { name } => format!("+ {name}"),
        GraphChange::NodeRemoved { name } => format!("- {name}"),
        GraphChange::SourceChanged { name } => format!("{name}: source changed"),
        GraphChange::ChainChanged { name, old, new } => {
            format!("{name}: [{}] → [{}]", join(old), join(new))
        }
        GraphChange::PlacementChanged { name, old, new } => {
            format!("{name}: at {old:.3}s → {new:.3}s")
        }
        GraphChange::FlagsChanged { name, muted, solo } => {
            let mut flags = Vec::new();
            if *muted {
                flags.push("muted");
            }
            if *solo {
                flags.push("solo");
            }
            if flags.is_empty() {
                format!("{name}: audible")
            } else {
                format!("{name}: {}", flags.join(", "))
            }
        }
        GraphChange::ExportAdded { file } => format!("+ export {file}"),
        GraphChange::ExportRemoved { file } => format!("- export {file}"),
    }
}

fn join(effects: &[Effect]) -> String {
    effects
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
