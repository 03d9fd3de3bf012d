//! Shortest path and bounded neighborhood queries.
//!
//! Distances are counted in components; nets are free hops. Because the
//! graph is bipartite the component count of a path grows with its hop
//! count, so plain breadth-first order is also component-hop order.

use std::collections::{HashSet, VecDeque};

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use super::circuit::{CircuitGraph, ComponentDetails, NodeDetails, NodeKind};

/// Outcome of [`CircuitGraph::find_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub success: bool,
    /// Alternating component/net ids from start to end
    pub path: Option<Vec<String>>,
    /// Number of components on `path`
    pub path_length: usize,
    pub component_details: Vec<ComponentDetails>,
    /// Set when the path to `end` held more than `max_depth` components and
    /// `path` is its first `max_depth` components.
    #[serde(default)]
    pub truncated: bool,
}

impl PathResult {
    pub fn not_found() -> Self {
        Self {
            success: false,
            path: None,
            path_length: 0,
            component_details: Vec::new(),
            truncated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborhoodMember {
    pub id: String,
    pub kind: NodeKind,
    /// Component hops from the start component
    pub depth: usize,
}

/// Outcome of [`CircuitGraph::get_neighborhood`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodResult {
    pub success: bool,
    pub start: String,
    pub radius: usize,
    /// Members in discovery order; the start node is never a member
    pub neighborhood: Vec<NeighborhoodMember>,
    pub details: Vec<NodeDetails>,
}

impl NeighborhoodResult {
    pub fn member_ids(&self) -> Vec<&str> {
        self.neighborhood.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.neighborhood.iter().any(|m| m.id == id)
    }

    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.neighborhood.iter().find(|m| m.id == id).map(|m| m.depth)
    }
}

impl CircuitGraph {
    /// Shortest path from `start` to `end` in component hops.
    ///
    /// With `ignore_power` set, power nets and power edges are never
    /// traversed. When the path holds more than `max_depth` components it is
    /// cut after the `max_depth`-th one and `truncated` is set; an
    /// unreachable `end` is never reported as found.
    pub fn find_path(&self, start: &str, end: &str, ignore_power: bool, max_depth: usize) -> PathResult {
        let (Some(&start_idx), Some(&end_idx)) = (self.indices.get(start), self.indices.get(end)) else {
            return PathResult::not_found();
        };

        if start_idx == end_idx {
            return self.path_result(vec![start_idx], false);
        }
        if max_depth == 0 {
            return PathResult::not_found();
        }

        let Some(path) = self.shortest_path(start_idx, end_idx, ignore_power) else {
            return PathResult::not_found();
        };

        let total: usize = path.iter().map(|&idx| self.component_weight(idx)).sum();
        if total <= max_depth {
            return self.path_result(path, false);
        }

        // end just after the max_depth-th component
        let mut components = 0;
        let len = path
            .iter()
            .position(|&idx| {
                components += self.component_weight(idx);
                components == max_depth
            })
            .map_or(path.len(), |pos| pos + 1);
        self.path_result(path[..len].to_vec(), true)
    }

    fn shortest_path(&self, start: NodeIndex, end: NodeIndex, ignore_power: bool) -> Option<Vec<NodeIndex>> {
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([vec![start]]);

        while let Some(path) = queue.pop_front() {
            let Some(&current) = path.last() else {
                continue;
            };

            for neighbor in self.candidates(current, ignore_power, &visited) {
                visited.insert(neighbor);
                let mut next = path.clone();
                next.push(neighbor);

                if neighbor == end {
                    return Some(next);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Nodes within `radius` component hops of component `id`. A net id or
    /// an unknown id yields `success = false`.
    ///
    /// Every reached component is a member. Nets are members only when
    /// `ignore_power` is off and the net is a power net; other nets are
    /// traversed but not reported.
    pub fn get_neighborhood(&self, id: &str, ignore_power: bool, radius: usize) -> NeighborhoodResult {
        let Some(start_idx) = self.indices.get(id).copied().filter(|&idx| self.graph[idx].is_component()) else {
            return NeighborhoodResult {
                success: false,
                start: id.to_string(),
                radius,
                neighborhood: Vec::new(),
                details: Vec::new(),
            };
        };

        let mut visited = HashSet::from([start_idx]);
        let mut queue = VecDeque::from([(start_idx, 0usize)]);
        let mut members = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= radius {
                continue;
            }

            for neighbor in self.candidates(current, ignore_power, &visited) {
                visited.insert(neighbor);
                let node = &self.graph[neighbor];
                let neighbor_depth = depth + self.component_weight(neighbor);
                queue.push_back((neighbor, neighbor_depth));

                let reported = node.is_component() || (!ignore_power && self.is_power_net_idx(neighbor));
                if reported {
                    members.push(NeighborhoodMember {
                        id: node.id().to_string(),
                        kind: node.kind(),
                        depth: neighbor_depth,
                    });
                }
            }
        }

        let details = members
            .iter()
            .filter_map(|m| self.node_details(&m.id))
            .collect();

        NeighborhoodResult {
            success: true,
            start: id.to_string(),
            radius,
            neighborhood: members,
            details,
        }
    }

    /// Unvisited neighbors of `current` that survive the power filter.
    fn candidates(&self, current: NodeIndex, ignore_power: bool, visited: &HashSet<NodeIndex>) -> Vec<NodeIndex> {
        self.ordered_neighbors(current)
            .into_iter()
            .filter(|n| !visited.contains(n))
            .filter(|&n| {
                !ignore_power || !(self.is_power_net_idx(n) || self.is_power_edge_idx(current, n))
            })
            .collect()
    }

    fn component_weight(&self, idx: NodeIndex) -> usize {
        usize::from(self.graph[idx].is_component())
    }

    fn path_result(&self, path: Vec<NodeIndex>, truncated: bool) -> PathResult {
        let component_details: Vec<ComponentDetails> = path
            .iter()
            .filter(|&&idx| self.graph[idx].is_component())
            .filter_map(|&idx| self.component_details(self.graph[idx].id()))
            .collect();

        PathResult {
            success: true,
            path_length: component_details.len(),
            path: Some(path.iter().map(|&idx| self.graph[idx].id().to_string()).collect()),
            component_details,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::power::PowerClassifier;
    use crate::netlist::{ComponentInfo, ElectricalType, Netlist, PinConnection};

    fn resistor() -> ComponentInfo {
        ComponentInfo::new("Device:R").with_value("R").with_description("Resistor")
    }

    fn netlist_of(components: &[&str], nets: &[(&str, &[(&str, &str)])]) -> Netlist {
        let mut netlist = Netlist::new();
        for reference in components {
            netlist.add_component(*reference, resistor());
        }
        for (name, pins) in nets {
            netlist.add_net(*name);
            for (component, pin) in pins.iter() {
                netlist.connect(*name, PinConnection::new(*component, *pin));
            }
        }
        netlist
    }

    fn chain() -> CircuitGraph {
        let netlist = netlist_of(
            &["R1", "R2", "R3"],
            &[
                ("Net1", &[("R1", "2"), ("R2", "1")]),
                ("Net2", &[("R2", "2"), ("R3", "1")]),
            ],
        );
        CircuitGraph::build(netlist).unwrap()
    }

    /// R1 reaches U1 through VCC directly, or through C1 over signal nets.
    fn power_and_signal() -> CircuitGraph {
        let netlist = netlist_of(
            &["R1", "R2", "U1", "C1"],
            &[
                ("GND", &[("R2", "1"), ("U1", "4")]),
                ("Signal", &[("C1", "1"), ("U1", "12")]),
                ("Signal1", &[("C1", "2"), ("R1", "2")]),
                ("VCC", &[("R1", "1"), ("U1", "11")]),
            ],
        );
        CircuitGraph::build(netlist).unwrap()
    }

    #[test]
    fn test_chain_path() {
        let result = chain().find_path("R1", "R3", false, 10);
        assert!(result.success);
        assert!(!result.truncated);
        assert_eq!(
            result.path.unwrap(),
            vec!["R1", "Net1", "R2", "Net2", "R3"]
        );
        assert_eq!(result.path_length, 3);
        let refs: Vec<&str> = result.component_details.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn test_same_start_and_end() {
        let graph = chain();

        let component = graph.find_path("R2", "R2", true, 0);
        assert!(component.success);
        assert_eq!(component.path.unwrap(), vec!["R2"]);
        assert_eq!(component.path_length, 1);
        assert_eq!(component.component_details.len(), 1);

        let net = graph.find_path("Net1", "Net1", false, 10);
        assert!(net.success);
        assert_eq!(net.path.unwrap(), vec!["Net1"]);
        assert_eq!(net.path_length, 0);
        assert!(net.component_details.is_empty());
    }

    #[test]
    fn test_missing_endpoints() {
        let graph = chain();
        assert_eq!(graph.find_path("R1", "R9", false, 10), PathResult::not_found());
        assert_eq!(graph.find_path("R9", "R1", false, 10), PathResult::not_found());
    }

    #[test]
    fn test_disconnected_components() {
        let graph = CircuitGraph::build(netlist_of(
            &["R1", "R2"],
            &[("A", &[("R1", "1")]), ("B", &[("R2", "1")])],
        ))
        .unwrap();
        let result = graph.find_path("R1", "R2", false, 10);
        assert!(!result.success);
        assert!(result.path.is_none());
        assert_eq!(result.path_length, 0);
    }

    #[test]
    fn test_power_path_when_power_allowed() {
        let result = power_and_signal().find_path("R1", "U1", false, 10);
        assert!(result.success);
        assert_eq!(result.path_length, 2);
        assert_eq!(result.path.unwrap(), vec!["R1", "VCC", "U1"]);
    }

    #[test]
    fn test_signal_path_when_power_ignored() {
        let result = power_and_signal().find_path("R1", "U1", true, 10);
        assert!(result.success);
        assert_eq!(result.path_length, 3);
        assert_eq!(result.path.unwrap(), vec!["R1", "Signal1", "C1", "Signal", "U1"]);
    }

    #[test]
    fn test_max_depth_cuts_path_to_end() {
        let result = power_and_signal().find_path("R1", "U1", true, 2);
        assert!(result.success);
        assert!(result.truncated);
        assert_eq!(result.path_length, 2);
        let path = result.path.unwrap();
        assert_eq!(path, vec!["R1", "Signal1", "C1"]);
        assert!(!path.contains(&"U1".to_string()));
    }

    #[test]
    fn test_max_depth_unreachable_end_is_not_found() {
        let graph = CircuitGraph::build(netlist_of(
            &["R1", "R2", "R3", "R9"],
            &[
                ("A", &[("R1", "2"), ("R2", "1")]),
                ("B", &[("R2", "2"), ("R3", "1")]),
                ("Z", &[("R9", "1")]),
            ],
        ))
        .unwrap();

        for max_depth in [1, 2, 10] {
            assert_eq!(graph.find_path("R1", "R9", false, max_depth), PathResult::not_found());
        }
    }

    #[test]
    fn test_max_depth_prefix_follows_path_to_end() {
        // R1-A-R2-X-R5 is a dead branch that BFS reaches first
        let graph = CircuitGraph::build(netlist_of(
            &["R1", "R2", "R3", "R4", "R5"],
            &[
                ("A", &[("R1", "1"), ("R2", "1")]),
                ("B", &[("R1", "2"), ("R3", "1")]),
                ("X", &[("R2", "2"), ("R5", "1")]),
                ("C", &[("R3", "2"), ("R4", "1")]),
            ],
        ))
        .unwrap();

        let full = graph.find_path("R1", "R4", false, 10);
        assert_eq!(full.path.unwrap(), vec!["R1", "B", "R3", "C", "R4"]);

        let bounded = graph.find_path("R1", "R4", false, 2);
        assert!(bounded.success);
        assert!(bounded.truncated);
        assert_eq!(bounded.path.unwrap(), vec!["R1", "B", "R3"]);
        assert_eq!(bounded.path_length, 2);
    }

    #[test]
    fn test_max_depth_never_exceeded() {
        let graph = chain();
        for max_depth in 1..=4 {
            let result = graph.find_path("R1", "R3", false, max_depth);
            assert!(result.path_length <= max_depth, "max_depth {}", max_depth);
        }
        assert!(!graph.find_path("R1", "R3", false, 3).truncated);
        assert!(graph.find_path("R1", "R3", false, 2).truncated);
        assert!(!graph.find_path("R1", "R3", false, 0).success);
        assert_eq!(graph.find_path("R1", "R3", false, 1).path.unwrap(), vec!["R1"]);
    }

    #[test]
    fn test_max_depth_reaches_net_endpoint_at_bound() {
        let result = chain().find_path("R1", "Net2", false, 2);
        assert!(result.success);
        assert!(!result.truncated);
        assert_eq!(result.path.unwrap(), vec!["R1", "Net1", "R2", "Net2"]);
        assert_eq!(result.path_length, 2);
    }

    #[test]
    fn test_power_edge_blocks_non_power_named_net() {
        let mut netlist = Netlist::new();
        for reference in ["U1", "U2", "R1"] {
            netlist.add_component(reference, resistor());
        }
        netlist.connect("BIAS", PinConnection::new("U1", "8").with_type(ElectricalType::PowerOut));
        netlist.connect("BIAS", PinConnection::new("U2", "8").with_type(ElectricalType::PowerIn));
        netlist.connect("SIG_A", PinConnection::new("U1", "1"));
        netlist.connect("SIG_A", PinConnection::new("R1", "1"));
        netlist.connect("SIG_B", PinConnection::new("R1", "2"));
        netlist.connect("SIG_B", PinConnection::new("U2", "1"));
        let graph = CircuitGraph::build(netlist).unwrap();

        let raw = graph.find_path("U1", "U2", false, 10);
        assert_eq!(raw.path.unwrap(), vec!["U1", "BIAS", "U2"]);

        let signal = graph.find_path("U1", "U2", true, 10);
        assert_eq!(signal.path.unwrap(), vec!["U1", "SIG_A", "R1", "SIG_B", "U2"]);
    }

    #[test]
    fn test_project_power_symbols_are_pruned() {
        let netlist = netlist_of(
            &["M1", "Q1", "R1"],
            &[
                ("VMOTOR", &[("M1", "1"), ("Q1", "1")]),
                ("DRV", &[("M1", "2"), ("R1", "1")]),
                ("GATE", &[("R1", "2"), ("Q1", "2")]),
            ],
        );
        let stock = CircuitGraph::build(netlist.clone()).unwrap();
        assert_eq!(stock.find_path("M1", "Q1", true, 10).path_length, 2);

        let harvested =
            CircuitGraph::build_with_classifier(netlist, PowerClassifier::with_project_symbols(["VMOTOR"]))
                .unwrap();
        assert_eq!(harvested.find_path("M1", "Q1", true, 10).path_length, 3);
    }

    #[test]
    fn test_tie_breaking_is_reproducible() {
        let netlist = netlist_of(
            &["R1", "R2", "R3", "R4"],
            &[
                ("A", &[("R1", "1"), ("R2", "1")]),
                ("B", &[("R1", "2"), ("R3", "1")]),
                ("C", &[("R2", "2"), ("R4", "1")]),
                ("D", &[("R3", "2"), ("R4", "2")]),
            ],
        );
        let first = CircuitGraph::build(netlist.clone()).unwrap().find_path("R1", "R4", false, 10);
        for _ in 0..5 {
            let again = CircuitGraph::build(netlist.clone()).unwrap().find_path("R1", "R4", false, 10);
            assert_eq!(again.path, first.path);
        }
        assert_eq!(first.path.unwrap(), vec!["R1", "A", "R2", "C", "R4"]);
    }

    #[test]
    fn test_neighborhood_radius_one_is_direct_components() {
        let graph = chain();
        let result = graph.get_neighborhood("R2", false, 1);
        assert!(result.success);
        assert_eq!(result.start, "R2");
        assert_eq!(result.radius, 1);
        assert_eq!(result.member_ids(), vec!["R1", "R3"]);
        assert_eq!(result.depth_of("R1"), Some(1));
        assert!(!result.contains("R2"));
        assert!(!result.contains("Net1"));
        assert_eq!(result.details.len(), 2);
    }

    #[test]
    fn test_neighborhood_growing_radius() {
        let graph = chain();
        let one = graph.get_neighborhood("R1", false, 1);
        let two = graph.get_neighborhood("R1", false, 2);
        assert_eq!(one.member_ids(), vec!["R2"]);
        assert_eq!(two.member_ids(), vec!["R2", "R3"]);
        assert_eq!(two.depth_of("R3"), Some(2));
        for id in one.member_ids() {
            assert!(two.contains(id));
        }
        assert!(graph.get_neighborhood("R1", false, 0).neighborhood.is_empty());
    }

    #[test]
    fn test_neighborhood_reports_power_nets_only_when_not_ignored() {
        let graph = power_and_signal();

        let with_power = graph.get_neighborhood("R1", false, 1);
        assert!(with_power.contains("VCC"));
        assert!(with_power.contains("U1"));
        assert!(with_power.contains("C1"));
        assert!(!with_power.contains("Signal1"));
        assert_eq!(with_power.depth_of("VCC"), Some(0));
        match with_power.details.iter().find(|d| d.id() == "VCC") {
            Some(NodeDetails::Net { is_power_net, .. }) => assert!(is_power_net),
            other => panic!("Expected VCC net details, got {:?}", other),
        }

        let signal_only = graph.get_neighborhood("R1", true, 1);
        assert_eq!(signal_only.member_ids(), vec!["C1"]);
    }

    #[test]
    fn test_neighborhood_missing_component() {
        let result = chain().get_neighborhood("X1", false, 2);
        assert!(!result.success);
        assert_eq!(result.start, "X1");
        assert!(result.neighborhood.is_empty());
        assert!(result.details.is_empty());
    }

    #[test]
    fn test_neighborhood_rejects_net_centre() {
        let result = chain().get_neighborhood("Net1", false, 2);
        assert!(!result.success);
        assert_eq!(result.start, "Net1");
        assert!(result.neighborhood.is_empty());
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(chain().find_path("R1", "R2", false, 10)).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["path_length"], 2);
        assert_eq!(json["component_details"][0]["reference"], "R1");
        assert_eq!(json["component_details"][0]["lib_id"], "Device:R");

        let json = serde_json::to_value(chain().get_neighborhood("R1", false, 1)).unwrap();
        assert_eq!(json["neighborhood"][0]["kind"], "component");
        assert_eq!(json["details"][0]["type"], "component");
    }
}
