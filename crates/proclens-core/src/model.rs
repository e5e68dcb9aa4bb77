use crate::error::ProclensError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a process within a snapshot
pub type Pid = u32;

/// Lifecycle state of a process as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Running,
    Paused,
    Stopped,
}

/// One OS process known to the backend, with its child processes nested
/// beneath it. Within a snapshot, pids are unique across the entire forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessNode {
    pub pid: Pid,
    pub name: String,
    pub status: ProcessStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_pid: Option<Pid>,
    #[serde(default)]
    pub cmdline: String,
    #[serde(default)]
    pub children: Vec<ProcessNode>,
}

impl ProcessNode {
    /// Number of nodes in this subtree, including the node itself
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(ProcessNode::subtree_len).sum::<usize>()
    }

    /// Find a node by pid in this subtree
    pub fn find(&self, pid: Pid) -> Option<&ProcessNode> {
        if self.pid == pid {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(pid))
    }
}

/// Process trees belonging to one logical project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectProcesses {
    pub project_name: String,
    pub processes: Vec<ProcessNode>,
    /// Backend-computed count of all nodes under this project, descendants
    /// included. Trusted by the layer; verified against the trees in tests.
    pub total_count: usize,
}

impl ProjectProcesses {
    /// Recompute the node count from the trees themselves
    pub fn recursive_count(&self) -> usize {
        self.processes.iter().map(ProcessNode::subtree_len).sum()
    }

    /// Whether the backend-supplied `total_count` matches the trees
    pub fn counts_consistent(&self) -> bool {
        self.total_count == self.recursive_count()
    }
}

/// A complete, self-contained description of all known process state at one
/// instant. Every update, poll or push, is a full replacement of the view;
/// there is no delta protocol.
pub type Snapshot = Vec<ProjectProcesses>;

/// Sum of `total_count` over all projects in a snapshot
pub fn snapshot_process_count(snapshot: &Snapshot) -> usize {
    snapshot.iter().map(|project| project.total_count).sum()
}

/// Find a process by pid anywhere in a snapshot
pub fn find_process(snapshot: &Snapshot, pid: Pid) -> Option<&ProcessNode> {
    snapshot
        .iter()
        .flat_map(|project| project.processes.iter())
        .find_map(|root| root.find(pid))
}

/// Flat pre-order traversal over every node in every tree
pub fn flatten(snapshot: &Snapshot) -> Vec<&ProcessNode> {
    fn walk<'a>(node: &'a ProcessNode, out: &mut Vec<&'a ProcessNode>) {
        out.push(node);
        for child in &node.children {
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    for project in snapshot {
        for root in &project.processes {
            walk(root, &mut out);
        }
    }
    out
}

/// Message shape delivered by the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub processes: Snapshot,
}

impl PushEvent {
    /// Parse a raw push payload. The caller decides whether a failure is
    /// discarded (the listener does) or surfaced.
    pub fn from_json(payload: &str) -> Result<Self, ProclensError> {
        serde_json::from_str(payload).map_err(|e| ProclensError::MalformedPush(e.to_string()))
    }
}
