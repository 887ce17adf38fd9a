//! Clock topology
//!
//! Which converter port feeds which clock to which other port is declared
//! statically as a [`ClockTopology`] and resolved once into a
//! [`ClockGraph`] of ownership edges. Resolution rejects:
//!
//! - nodes with a JESD204 revision or subclass the link layer does not know
//! - ports on undeclared nodes, duplicate ports, data ports carrying clocks
//! - a clock provided by more than one port
//! - a consumed clock that no linked port provides

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::error::{DdcError, Result};

/// Highest supported JESD204 revision (C)
pub const MAX_REVISION: u8 = 2;
/// Highest supported JESD204 subclass
pub const MAX_SUBCLASS: u8 = 2;

/// What a port carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Drives the listed clocks
    ClockProvider,
    /// Needs the listed clocks from a linked provider
    ClockConsumer,
    /// Sample data only
    Data,
}

/// A topology node: one converter or FPGA link endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyNode {
    /// Node name, unique
    pub name: String,
    /// JESD204 revision (0 = original, 1 = A, 2 = B/C)
    pub revision: u8,
    /// JESD204 subclass
    pub subclass: u8,
}

/// `device:port` address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PortRef {
    /// Node name
    pub device: String,
    /// Port number on the node
    pub port: u32,
}

impl PortRef {
    /// Port `port` of `device`
    pub fn new(device: impl Into<String>, port: u32) -> Self {
        Self {
            device: device.into(),
            port,
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.port)
    }
}

/// A port declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyPort {
    /// Port address
    pub at: PortRef,
    /// Port role
    pub role: PortRole,
    /// Clock names provided or consumed
    pub clocks: Vec<String>,
}

/// Static topology description
#[derive(Debug, Clone, Default)]
pub struct ClockTopology {
    nodes: Vec<TopologyNode>,
    ports: Vec<TopologyPort>,
    links: Vec<(PortRef, PortRef)>,
}

impl ClockTopology {
    /// Empty topology
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node
    #[must_use]
    pub fn node(mut self, name: impl Into<String>, revision: u8, subclass: u8) -> Self {
        self.nodes.push(TopologyNode {
            name: name.into(),
            revision,
            subclass,
        });
        self
    }

    /// Declare a port
    #[must_use]
    pub fn port<S: Into<String>>(
        mut self,
        device: impl Into<String>,
        port: u32,
        role: PortRole,
        clocks: impl IntoIterator<Item = S>,
    ) -> Self {
        self.ports.push(TopologyPort {
            at: PortRef::new(device, port),
            role,
            clocks: clocks.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Connect two ports; links are undirected
    #[must_use]
    pub fn link(mut self, a: PortRef, b: PortRef) -> Self {
        self.links.push((a, b));
        self
    }

    /// Declared nodes
    #[must_use]
    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    /// Resolve into clock ownership edges.
    ///
    /// # Errors
    ///
    /// [`DdcError::InvalidArgument`] for any of the conditions listed in the
    /// module documentation.
    pub fn resolve(&self) -> Result<ClockGraph> {
        let mut names = BTreeSet::new();
        for node in &self.nodes {
            if node.revision > MAX_REVISION {
                return Err(DdcError::invalid_argument(format!(
                    "{}: unsupported JESD204 revision {}",
                    node.name, node.revision
                )));
            }
            if node.subclass > MAX_SUBCLASS {
                return Err(DdcError::invalid_argument(format!(
                    "{}: unsupported JESD204 subclass {}",
                    node.name, node.subclass
                )));
            }
            if !names.insert(node.name.as_str()) {
                return Err(DdcError::invalid_argument(format!(
                    "node {} declared twice",
                    node.name
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for port in &self.ports {
            if !names.contains(port.at.device.as_str()) {
                return Err(DdcError::invalid_argument(format!(
                    "port {} on undeclared node",
                    port.at
                )));
            }
            if !seen.insert(&port.at) {
                return Err(DdcError::invalid_argument(format!(
                    "port {} declared twice",
                    port.at
                )));
            }
            if port.role == PortRole::Data && !port.clocks.is_empty() {
                return Err(DdcError::invalid_argument(format!(
                    "data port {} lists clocks",
                    port.at
                )));
            }
        }
        for (a, b) in &self.links {
            for end in [a, b] {
                if !seen.contains(end) {
                    return Err(DdcError::invalid_argument(format!(
                        "link to undeclared port {end}"
                    )));
                }
            }
        }

        let mut providers: BTreeMap<&str, &PortRef> = BTreeMap::new();
        for port in self.ports.iter().filter(|p| p.role == PortRole::ClockProvider) {
            for clock in &port.clocks {
                if let Some(first) = providers.insert(clock.as_str(), &port.at) {
                    return Err(DdcError::invalid_argument(format!(
                        "clock {clock} provided by both {first} and {}",
                        port.at
                    )));
                }
            }
        }

        let mut edges = Vec::new();
        for port in self.ports.iter().filter(|p| p.role == PortRole::ClockConsumer) {
            for clock in &port.clocks {
                let provider = providers
                    .get(clock.as_str())
                    .filter(|&&provider| self.linked(&port.at, provider))
                    .ok_or_else(|| {
                        DdcError::invalid_argument(format!(
                            "clock {clock} needed by {} has no linked provider",
                            port.at
                        ))
                    })?;
                edges.push(ClockEdge {
                    clock: clock.clone(),
                    provider: (*provider).clone(),
                    consumer: port.at.clone(),
                });
            }
        }

        debug!(
            "Clock topology: {} nodes, {} ports, {} clock edges",
            self.nodes.len(),
            self.ports.len(),
            edges.len()
        );

        Ok(ClockGraph {
            nodes: self.nodes.clone(),
            edges,
        })
    }

    fn linked(&self, a: &PortRef, b: &PortRef) -> bool {
        self.links
            .iter()
            .any(|(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

/// One clock ownership edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockEdge {
    /// Clock name
    pub clock: String,
    /// Port driving the clock
    pub provider: PortRef,
    /// Port receiving it
    pub consumer: PortRef,
}

/// Resolved topology
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockGraph {
    nodes: Vec<TopologyNode>,
    edges: Vec<ClockEdge>,
}

impl ClockGraph {
    /// All edges in declaration order
    #[must_use]
    pub fn edges(&self) -> &[ClockEdge] {
        &self.edges
    }

    /// Nodes of the topology
    #[must_use]
    pub fn nodes(&self) -> &[TopologyNode] {
        &self.nodes
    }

    /// True if no clock is consumed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Port driving `clock`, if anything consumes it
    #[must_use]
    pub fn provider_of(&self, clock: &str) -> Option<&PortRef> {
        self.edges
            .iter()
            .find(|e| e.clock == clock)
            .map(|e| &e.provider)
    }

    /// Ports consuming `clock`
    pub fn consumers_of<'a>(&'a self, clock: &'a str) -> impl Iterator<Item = &'a PortRef> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.clock == clock)
            .map(|e| &e.consumer)
    }

    /// Clocks consumed by any port of `device`
    pub fn clocks_of<'a>(&'a self, device: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.consumer.device == device)
            .map(|e| e.clock.as_str())
    }
}
