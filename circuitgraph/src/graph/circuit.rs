//! Circuit Graph Implementation
//!
//! Bipartite component/net graph built on petgraph. Every component and
//! every net becomes exactly one node; an undirected edge joins a component
//! to a net when at least one of its pins lands on that net and records all
//! such pins in source order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::power::PowerClassifier;
use crate::core::GraphError;
use crate::netlist::{ComponentInfo, Netlist};

/// Kind of a graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Component,
    Net,
}

/// Node in the circuit graph, keyed by component reference or net name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphNode {
    Component { reference: String },
    Net { name: String },
}

impl GraphNode {
    pub fn id(&self) -> &str {
        match self {
            GraphNode::Component { reference } => reference,
            GraphNode::Net { name } => name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::Component { .. } => NodeKind::Component,
            GraphNode::Net { .. } => NodeKind::Net,
        }
    }

    pub fn is_component(&self) -> bool {
        matches!(self, GraphNode::Component { .. })
    }

    pub fn is_net(&self) -> bool {
        matches!(self, GraphNode::Net { .. })
    }
}

/// Component <-> net edge. `pins` is the exact multiset of pin numbers by
/// which the component touches the net, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub pins: Vec<String>,
}

/// Problems found while building that did not stop construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildDiagnostic {
    /// A net lists a pin on a component the netlist never declared.
    UnknownComponent {
        net: String,
        component: String,
        pin: String,
    },
}

/// Full record of a component, as reported in query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDetails {
    pub reference: String,
    #[serde(flatten)]
    pub info: ComponentInfo,
}

/// Full record of any node, as reported in neighborhood results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeDetails {
    Component(ComponentDetails),
    Net {
        name: String,
        is_power_net: bool,
        connection_count: usize,
    },
}

impl NodeDetails {
    pub fn id(&self) -> &str {
        match self {
            NodeDetails::Component(c) => &c.reference,
            NodeDetails::Net { name, .. } => name,
        }
    }
}

/// Statistics about a circuit graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub component_count: usize,
    pub net_count: usize,
    pub edge_count: usize,
    pub pin_connection_count: usize,
    pub power_net_count: usize,
    pub diagnostic_count: usize,
}

/// Serializable export of the whole graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub build_id: Uuid,
    pub built_at: DateTime<Utc>,
    pub nodes: IndexMap<String, GraphNode>,
    pub edges: Vec<SnapshotEdge>,
    pub adjacency: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub component: String,
    pub net: String,
    pub pins: Vec<String>,
}

/// Immutable bipartite graph of one schematic's components and nets.
#[derive(Debug, Clone)]
pub struct CircuitGraph {
    pub(super) graph: UnGraph<GraphNode, GraphEdge>,
    /// Component references and net names share one key space
    pub(super) indices: HashMap<String, NodeIndex>,
    netlist: Arc<Netlist>,
    classifier: PowerClassifier,
    diagnostics: Vec<BuildDiagnostic>,
    build_id: Uuid,
    built_at: DateTime<Utc>,
}

impl CircuitGraph {
    /// Build with the stock power classifier.
    pub fn build(netlist: impl Into<Arc<Netlist>>) -> Result<Self, GraphError> {
        Self::build_with_classifier(netlist, PowerClassifier::new())
    }

    /// Build from a netlist. Fails only when a component reference is also
    /// used as a net name; connections to undeclared components are skipped
    /// and recorded in [`CircuitGraph::diagnostics`].
    pub fn build_with_classifier(
        netlist: impl Into<Arc<Netlist>>,
        classifier: PowerClassifier,
    ) -> Result<Self, GraphError> {
        let netlist = netlist.into();
        let mut graph = UnGraph::with_capacity(
            netlist.components.len() + netlist.nets.len(),
            netlist.nets.values().map(|c| c.len()).sum(),
        );
        let mut indices = HashMap::with_capacity(netlist.components.len() + netlist.nets.len());
        let mut diagnostics = Vec::new();

        // Pass 1: component nodes
        for reference in netlist.components.keys() {
            let idx = graph.add_node(GraphNode::Component {
                reference: reference.clone(),
            });
            indices.insert(reference.clone(), idx);
        }

        // Pass 2: net nodes and their edges
        let mut edge_of: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();
        for (net_name, connections) in &netlist.nets {
            if indices.contains_key(net_name) {
                return Err(GraphError::NameCollision(net_name.clone()));
            }
            let net_idx = graph.add_node(GraphNode::Net {
                name: net_name.clone(),
            });
            indices.insert(net_name.clone(), net_idx);

            for conn in connections {
                let comp_idx = match indices.get(&conn.component) {
                    Some(&idx) if graph[idx].is_component() => idx,
                    _ => {
                        warn!(
                            "Net {} references undeclared component {} (pin {}), skipping",
                            net_name, conn.component, conn.pin
                        );
                        diagnostics.push(BuildDiagnostic::UnknownComponent {
                            net: net_name.clone(),
                            component: conn.component.clone(),
                            pin: conn.pin.clone(),
                        });
                        continue;
                    }
                };

                let edge_idx = *edge_of
                    .entry((comp_idx, net_idx))
                    .or_insert_with(|| graph.add_edge(comp_idx, net_idx, GraphEdge::default()));
                graph[edge_idx].pins.push(conn.pin.clone());
            }
        }

        debug!(
            "Built circuit graph: {} nodes, {} edges, {} diagnostics",
            graph.node_count(),
            graph.edge_count(),
            diagnostics.len()
        );

        Ok(Self {
            graph,
            indices,
            netlist,
            classifier,
            diagnostics,
            build_id: Uuid::new_v4(),
            built_at: Utc::now(),
        })
    }

    pub fn netlist(&self) -> &Arc<Netlist> {
        &self.netlist
    }

    pub fn classifier(&self) -> &PowerClassifier {
        &self.classifier
    }

    pub fn diagnostics(&self) -> &[BuildDiagnostic] {
        &self.diagnostics
    }

    /// Unique per build; a rebuilt graph for the same schematic gets a new id.
    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn contains(&self, id: &str) -> bool {
        self.indices.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.indices.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn node_kind(&self, id: &str) -> Option<NodeKind> {
        self.node(id).map(GraphNode::kind)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn component_count(&self) -> usize {
        self.netlist.components.len()
    }

    pub fn net_count(&self) -> usize {
        self.graph.node_count() - self.component_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every (component, net, edge) triple in creation order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &GraphEdge)> {
        self.graph.edge_references().map(move |e| {
            (
                self.graph[e.source()].id(),
                self.graph[e.target()].id(),
                e.weight(),
            )
        })
    }

    /// Directly connected nodes of the opposite kind, in declaration order.
    /// Empty for isolated nodes, `None` for unknown ids.
    pub fn neighbors(&self, id: &str) -> Option<Vec<&str>> {
        let idx = *self.indices.get(id)?;
        Some(
            self.ordered_neighbors(idx)
                .into_iter()
                .map(|n| self.graph[n].id())
                .collect(),
        )
    }

    /// Pins by which `component` touches `net`.
    pub fn edge_pins(&self, component: &str, net: &str) -> Option<&[String]> {
        let (comp_idx, net_idx) = self.component_net_pair(component, net)?;
        self.graph
            .find_edge(comp_idx, net_idx)
            .map(|e| self.graph[e].pins.as_slice())
    }

    pub fn is_power_net(&self, net_name: &str) -> bool {
        self.classifier.is_power_net(net_name)
    }

    /// `true` if any pin on the component/net edge is typed power-in or
    /// power-out in the source netlist. Argument order does not matter;
    /// anything other than exactly one component and one net is `false`.
    pub fn is_power_edge(&self, a: &str, b: &str) -> bool {
        match (self.indices.get(a), self.indices.get(b)) {
            (Some(&a_idx), Some(&b_idx)) => self.is_power_edge_idx(a_idx, b_idx),
            _ => false,
        }
    }

    pub(super) fn is_power_edge_idx(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let (comp_idx, net_idx) = match (&self.graph[a], &self.graph[b]) {
            (GraphNode::Component { .. }, GraphNode::Net { .. }) => (a, b),
            (GraphNode::Net { .. }, GraphNode::Component { .. }) => (b, a),
            _ => return false,
        };
        let Some(edge) = self.graph.find_edge(comp_idx, net_idx) else {
            return false;
        };

        let component = self.graph[comp_idx].id();
        let net = self.graph[net_idx].id();
        self.graph[edge].pins.iter().any(|pin| {
            self.netlist
                .pin_type(component, net, pin)
                .map(PowerClassifier::is_power_pin)
                .unwrap_or(false)
        })
    }

    pub(super) fn is_power_net_idx(&self, idx: NodeIndex) -> bool {
        match &self.graph[idx] {
            GraphNode::Net { name } => self.classifier.is_power_net(name),
            GraphNode::Component { .. } => false,
        }
    }

    /// Neighbor indices sorted by insertion order, which keeps traversal
    /// tie-breaking reproducible.
    pub(super) fn ordered_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors(idx).collect();
        neighbors.sort_unstable();
        neighbors
    }

    fn component_net_pair(&self, component: &str, net: &str) -> Option<(NodeIndex, NodeIndex)> {
        let comp_idx = *self.indices.get(component)?;
        let net_idx = *self.indices.get(net)?;
        (self.graph[comp_idx].is_component() && self.graph[net_idx].is_net())
            .then_some((comp_idx, net_idx))
    }

    pub fn component_details(&self, reference: &str) -> Option<ComponentDetails> {
        self.netlist.component(reference).map(|info| ComponentDetails {
            reference: reference.to_string(),
            info: info.clone(),
        })
    }

    pub fn node_details(&self, id: &str) -> Option<NodeDetails> {
        match self.node(id)? {
            GraphNode::Component { reference } => {
                self.component_details(reference).map(NodeDetails::Component)
            }
            GraphNode::Net { name } => Some(NodeDetails::Net {
                name: name.clone(),
                is_power_net: self.classifier.is_power_net(name),
                connection_count: self.netlist.connections(name).len(),
            }),
        }
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            component_count: self.component_count(),
            net_count: self.net_count(),
            edge_count: self.edge_count(),
            pin_connection_count: self.graph.edge_weights().map(|e| e.pins.len()).sum(),
            power_net_count: self
                .netlist
                .nets
                .keys()
                .filter(|n| self.classifier.is_power_net(n))
                .count(),
            diagnostic_count: self.diagnostics.len(),
        }
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx].id().to_string(), self.graph[idx].clone()))
            .collect();

        let edges = self
            .edges()
            .map(|(component, net, edge)| SnapshotEdge {
                component: component.to_string(),
                net: net.to_string(),
                pins: edge.pins.clone(),
            })
            .collect();

        let adjacency = self
            .graph
            .node_indices()
            .map(|idx| {
                let neighbors = self
                    .ordered_neighbors(idx)
                    .into_iter()
                    .map(|n| self.graph[n].id().to_string())
                    .collect();
                (self.graph[idx].id().to_string(), neighbors)
            })
            .collect();

        GraphSnapshot {
            build_id: self.build_id,
            built_at: self.built_at,
            nodes,
            edges,
            adjacency,
        }
    }
}
