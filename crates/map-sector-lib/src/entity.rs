//! Map entities: nodes, ways and the parsed document that carries them
//!
//! Nodes and ways are owned by flat registries keyed by id. Everything else refers to
//! them by id, including the way -> node and node -> way links.

use crate::{Bounds, EnuCoords, GeodeticConverter, IndexError, Result, SectorId, Tags, tags};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a node in the source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub u64);

/// Identifier of a way in the source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WayId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for WayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// A geographic point
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    lat: f64,
    lon: f64,
    tags: Option<Tags>,
    /// Ways using this node
    way_refs: BTreeSet<WayId>,
    /// Bottom sector holding this node, once placed
    sector: Option<SectorId>,
    /// ENU offset from the sector reference point, once placed
    relative_position: Option<EnuCoords>,
}

impl Node {
    pub fn new(id: NodeId, lat: f64, lon: f64) -> Self {
        Self {
            id,
            lat,
            lon,
            tags: None,
            way_refs: BTreeSet::new(),
            sector: None,
            relative_position: None,
        }
    }

    pub fn with_tags(mut self, tags: Option<Tags>) -> Self {
        self.tags = tags.filter(|t| !t.is_empty());
        self
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    #[inline]
    pub fn lon(&self) -> f64 {
        self.lon
    }

    #[inline]
    pub fn tags(&self) -> Option<&Tags> {
        self.tags.as_ref()
    }

    #[inline]
    pub fn way_refs(&self) -> &BTreeSet<WayId> {
        &self.way_refs
    }

    #[inline]
    pub fn sector(&self) -> Option<SectorId> {
        self.sector
    }

    #[inline]
    pub fn relative_position(&self) -> Option<EnuCoords> {
        self.relative_position
    }

    /// The node is used by at least one way
    #[inline]
    pub fn in_way(&self) -> bool {
        !self.way_refs.is_empty()
    }

    /// The node carries enough tags to be rendered on its own
    #[inline]
    pub fn is_standalone(&self) -> bool {
        self.tags.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub(crate) fn add_way_ref(&mut self, way: WayId) {
        self.way_refs.insert(way);
    }

    /// Hook the node to its bottom sector and compute its local ENU position
    pub(crate) fn assign_sector(
        &mut self,
        sector: SectorId,
        converter: &GeodeticConverter,
        altitude: f64,
    ) -> Result<()> {
        if let Some(existing) = self.sector {
            return Err(IndexError::NodeAlreadyPlaced {
                node: self.id,
                sector: existing,
            });
        }

        let position = converter.geodetic_to_enu(self.lat, self.lon, altitude)?;
        self.sector = Some(sector);
        self.relative_position = Some(position);
        Ok(())
    }
}

/// Rendering category of a way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WayKind {
    /// Anything tagged `building`
    Building,
    /// Open polyline tagged `highway`
    Road,
    /// Any other closed way
    Area,
    /// Any other open way
    Line,
}

/// An ordered polyline or polygon referencing nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    id: WayId,
    nodes: Vec<NodeId>,
    tags: Option<Tags>,
    /// Computed once from the node coordinates, may be zero-sized on one axis
    bounds: Bounds,
}

impl Way {
    /// Build a way from node ids, looking up each node's `(lat, lon)` to derive its bounds
    pub fn new<F>(id: WayId, nodes: Vec<NodeId>, tags: Option<Tags>, lookup: F) -> Result<Self>
    where
        F: Fn(NodeId) -> Option<(f64, f64)>,
    {
        let bounds = Self::bounds_from_nodes(id, &nodes, lookup)?;

        Ok(Self {
            id,
            nodes,
            tags: tags.filter(|t| !t.is_empty()),
            bounds,
        })
    }

    /// Bounds enclosing `nodes`, resolving each one through `lookup`
    pub(crate) fn bounds_from_nodes<F>(id: WayId, nodes: &[NodeId], lookup: F) -> Result<Bounds>
    where
        F: Fn(NodeId) -> Option<(f64, f64)>,
    {
        let coords = nodes
            .iter()
            .map(|&node| lookup(node).ok_or(IndexError::UnknownNode { way: id, node }))
            .collect::<Result<Vec<_>>>()?;

        Bounds::enclosing(coords).ok_or(IndexError::EmptyWay(id))
    }

    pub(crate) fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    #[inline]
    pub fn id(&self) -> WayId {
        self.id
    }

    #[inline]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[inline]
    pub fn tags(&self) -> Option<&Tags> {
        self.tags.as_ref()
    }

    #[inline]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Closed ring: the first and last node are the same node
    #[inline]
    pub fn is_polygon(&self) -> bool {
        self.nodes.first() == self.nodes.last()
    }

    fn has_tag(&self, key: &str) -> bool {
        self.tags.as_ref().is_some_and(|t| t.contains_key(key))
    }

    pub fn is_road(&self) -> bool {
        !self.is_polygon() && self.has_tag("highway")
    }

    pub fn is_building(&self) -> bool {
        self.has_tag("building")
    }

    pub fn kind(&self) -> WayKind {
        if self.is_building() {
            WayKind::Building
        } else if self.is_road() {
            WayKind::Road
        } else if self.is_polygon() {
            WayKind::Area
        } else {
            WayKind::Line
        }
    }

    /// Estimated building height in meters, `None` for non-buildings
    pub fn building_height(&self) -> Option<f64> {
        self.tags
            .as_ref()
            .filter(|_| self.is_building())
            .map(tags::building_height)
    }
}

/// A parsed map extract ready for ingestion
///
/// Ways are resolved against the document's nodes when they are added, so every way
/// handed to the index refers to nodes that exist.
#[derive(Debug, Clone)]
pub struct MapDocument {
    bounds: Bounds,
    nodes: BTreeMap<NodeId, Node>,
    ways: BTreeMap<WayId, Way>,
}

impl MapDocument {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            nodes: BTreeMap::new(),
            ways: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id()) {
            return Err(IndexError::DuplicateNode(node.id()));
        }
        self.nodes.insert(node.id(), node);
        Ok(())
    }

    /// Resolve and add a way
    pub fn add_way(&mut self, id: WayId, nodes: Vec<NodeId>, tags: Option<Tags>) -> Result<()> {
        if self.ways.contains_key(&id) {
            return Err(IndexError::DuplicateWay(id));
        }
        let way = Way::new(id, nodes, tags, |node| {
            self.nodes.get(&node).map(|n| (n.lat(), n.lon()))
        })?;
        self.ways.insert(id, way);
        Ok(())
    }

    /// Drop ways without useful tags. Returns how many were removed.
    pub fn retain_interesting_ways(&mut self) -> usize {
        let before = self.ways.len();
        self.ways
            .retain(|_, way| tags::is_interesting_way(way.tags()));
        before - self.ways.len()
    }

    #[inline]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    #[inline]
    pub fn nodes(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes
    }

    #[inline]
    pub fn ways(&self) -> &BTreeMap<WayId, Way> {
        &self.ways
    }

    pub fn into_parts(self) -> (Bounds, BTreeMap<NodeId, Node>, BTreeMap<WayId, Way>) {
        (self.bounds, self.nodes, self.ways)
    }
}
