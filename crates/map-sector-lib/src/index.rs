//! MapIndex - Top-level manager for map entities, the sector tree and placement
//!
//! This module provides the high-level API: ingesting a parsed map document, resolving the
//! bottom sector and neighbor ring for a coordinate, laying neighbor sectors down around a
//! target sector, and exporting render-ready scenes.

use crate::{
    BOTTOM_LEVEL, Bounds, IndexError, LEVELS, MapDocument, Node, NodeId, Placement, Result,
    SectorId, SectorScene, SectorTree, Way, WayId, bearing_between_coords,
    distance_between_coords,
};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bound on sectors placed by a single [`MapIndex::lay_down_sectors`] call
pub const MAX_LAY_DOWN_SECTORS: usize = 100;

/// Configuration for the map index
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexConfig {
    /// Bounds of the root sector. Every node must fall inside them.
    /// Default: the whole globe
    pub world_bounds: Bounds,
    /// Altitude in meters used when projecting nodes into their sector's ENU frame.
    /// Default: 0
    pub node_altitude: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            world_bounds: Bounds::world(),
            node_altitude: 0.0,
        }
    }
}

/// Information about the index contents
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexInfo {
    pub node_count: usize,
    pub way_count: usize,
    pub sector_count: usize,
    pub bottom_sector_count: usize,
    /// Ways rejected at ingest because they do not fit the world bounds
    pub dropped_way_count: usize,
}

/// Outcome of [`MapIndex::ingest`]
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IngestReport {
    pub nodes_indexed: usize,
    pub ways_indexed: usize,
    pub dropped_ways: Vec<WayId>,
}

/// Owner of all entities and of the sector tree
///
/// Construction is single-writer. Once built, the read-only queries can be shared across
/// threads.
#[derive(Debug, Clone)]
pub struct MapIndex {
    tree: SectorTree,
    nodes: HashMap<NodeId, Node>,
    ways: HashMap<WayId, Way>,
    config: IndexConfig,
    dropped_ways: Vec<WayId>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MapIndex {
    /// Create an empty index whose root sector covers `config.world_bounds`
    pub fn new(config: IndexConfig) -> Self {
        Self {
            tree: SectorTree::new(config.world_bounds),
            nodes: HashMap::new(),
            ways: HashMap::new(),
            config,
            dropped_ways: Vec::new(),
        }
    }

    /// Insert every node, then every way, of a parsed document
    ///
    /// Ways that do not fit the world bounds are logged and dropped. Any other error
    /// aborts the ingest.
    pub fn ingest(&mut self, document: MapDocument) -> Result<IngestReport> {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::ingest");

        let (bounds, nodes, ways) = document.into_parts();
        if !self.config.world_bounds.can_fit_bounds(&bounds) {
            tracing::warn!(
                "Document bounds {:?} exceed the world bounds {:?}",
                bounds,
                self.config.world_bounds
            );
        }

        let mut report = IngestReport::default();

        self.nodes.reserve(nodes.len());
        for node in nodes.into_values() {
            self.add_node(node)?;
            report.nodes_indexed += 1;
        }

        self.ways.reserve(ways.len());
        for way in ways.into_values() {
            let id = way.id();
            match self.add_way(way) {
                Ok(_) => report.ways_indexed += 1,
                // Nodes on the -180 meridian are indexed at 180, so a way can still
                // reach past a world that does not wrap around
                Err(IndexError::WayOutOfBounds(_)) => {
                    tracing::warn!("Dropping way {} outside the world bounds", id);
                    self.dropped_ways.push(id);
                    report.dropped_ways.push(id);
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Indexed {} nodes and {} ways into {} sectors ({} dropped)",
            report.nodes_indexed,
            report.ways_indexed,
            self.tree.len(),
            report.dropped_ways.len()
        );
        Ok(report)
    }

    /// Register a node and place it in its bottom sector
    ///
    /// # Returns
    /// The bottom sector now holding the node
    pub fn add_node(&mut self, mut node: Node) -> Result<SectorId> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(IndexError::DuplicateNode(id));
        }
        if let Some(sector) = node.sector() {
            return Err(IndexError::NodeAlreadyPlaced { node: id, sector });
        }

        let sector = self.tree.add_node(id, node.lat(), node.lon())?;
        let converter = self.tree.bottom(sector)?.converter();
        node.assign_sector(sector, converter, self.config.node_altitude)?;

        self.nodes.insert(id, node);
        Ok(sector)
    }

    /// Register a way and store it at the deepest sector that holds it whole
    ///
    /// All of the way's nodes must already be registered. The way's bounds are rebuilt from
    /// the registered nodes, whatever it was constructed with. Fails with
    /// [`IndexError::WayOutOfBounds`] if the way does not fit the root sector, in which case
    /// nothing is modified.
    pub fn add_way(&mut self, mut way: Way) -> Result<SectorId> {
        let id = way.id();
        if self.ways.contains_key(&id) {
            return Err(IndexError::DuplicateWay(id));
        }

        let nodes = &self.nodes;
        let bounds = Way::bounds_from_nodes(id, way.nodes(), |node| {
            nodes.get(&node).map(|n| (n.lat(), n.lon()))
        })?;
        if bounds != *way.bounds() {
            tracing::debug!("Way {} bounds rebuilt from indexed nodes", id);
            way.set_bounds(bounds);
        }

        let sector = self.tree.add_way(id, way.bounds())?;

        for node_id in way.nodes() {
            if let Some(node) = self.nodes.get_mut(node_id) {
                node.add_way_ref(id);
            }
        }
        self.ways.insert(id, way);
        Ok(sector)
    }

    /// The bottom sector containing a coordinate, without creating any sector
    #[inline]
    pub fn bottom_sector_for_coords(&self, lat: f64, lon: f64) -> Option<SectorId> {
        self.tree.bottom_sector_at(lat, lon)
    }

    /// Every existing sector containing a coordinate, root first
    #[inline]
    pub fn sectors_by_coords(&self, lat: f64, lon: f64) -> Vec<SectorId> {
        self.tree.sectors_by_coords(lat, lon)
    }

    /// Every sector at exactly `level`
    #[inline]
    pub fn sectors_by_level(&self, level: usize) -> Result<Vec<SectorId>> {
        self.tree.sectors_by_level(level)
    }

    /// The bottom sector for a coordinate followed by its adjacent bottom sectors
    ///
    /// Neighbors are probed one bottom-level step away from the query point in each of the
    /// eight directions. A direction is only probed when the query point lies on that side
    /// of the target sector's center. Probes that hit no bottom sector are skipped.
    ///
    /// Returns an empty list when the coordinate has no bottom sector.
    pub fn neighbors_for_coords(&self, lat: f64, lon: f64) -> SmallVec<[SectorId; 9]> {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::neighbors_for_coords");

        let mut result = SmallVec::new();
        let Some(target) = self.bottom_sector_for_coords(lat, lon) else {
            return result;
        };
        result.push(target);

        let Some(bounds) = self.tree.get(target).map(|s| *s.bounds()) else {
            return result;
        };
        let (c_lat, c_lon) = (bounds.center_lat(), bounds.center_lon());
        let d = LEVELS[BOTTOM_LEVEL];

        let probes = [
            [(lat + d, lon - d), (lat + d, lon), (lat + d, lon + d)],
            [(lat, lon - d), (lat, lon), (lat, lon + d)],
            [(lat - d, lon - d), (lat - d, lon), (lat - d, lon + d)],
        ];
        let flags = [
            [lat > c_lat && lon < c_lon, lat > c_lat, lat > c_lat && lon > c_lon],
            [lon < c_lon, false, lon > c_lon],
            [lat < c_lat && lon < c_lon, lat < c_lat, lat < c_lat && lon > c_lon],
        ];

        for (probe_row, flag_row) in probes.iter().zip(flags.iter()) {
            for (&(p_lat, p_lon), &enabled) in probe_row.iter().zip(flag_row.iter()) {
                if !enabled {
                    continue;
                }
                if let Some(neighbor) = self.bottom_sector_for_coords(p_lat, p_lon) {
                    result.push(neighbor);
                }
            }
        }

        result
    }

    /// Place each of `others` relative to `target` in the shared scene
    ///
    /// Each sector is offset from the target's placement by the great-circle distance and
    /// initial bearing from the target's reference point to the sector's center. The target
    /// itself is skipped if it appears in `others`.
    ///
    /// # Arguments
    /// * `target` - Bottom sector whose placement is the origin
    /// * `others` - Bottom sectors to place, at most [`MAX_LAY_DOWN_SECTORS`]
    pub fn lay_down_sectors(&mut self, target: SectorId, others: &[SectorId]) -> Result<()> {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::lay_down_sectors");

        if others.len() > MAX_LAY_DOWN_SECTORS {
            return Err(IndexError::FanOutExceeded {
                requested: others.len(),
                limit: MAX_LAY_DOWN_SECTORS,
            });
        }

        let origin = self.tree.bottom(target)?;
        let reference = origin
            .converter()
            .reference()
            .ok_or(IndexError::MissingReference)?;
        let base = origin.placement();

        for &sector in others.iter().filter(|&&s| s != target) {
            let center = self
                .tree
                .get(sector)
                .map(|s| *s.bounds())
                .ok_or(IndexError::UnknownSector(sector))?;

            let distance = distance_between_coords(
                reference.latitude,
                reference.longitude,
                center.center_lat(),
                center.center_lon(),
            );
            let bearing = bearing_between_coords(
                reference.latitude,
                reference.longitude,
                center.center_lat(),
                center.center_lon(),
            );

            self.tree.bottom_mut(sector)?.set_placement(Placement {
                x: base.x + bearing.cos() * distance,
                y: base.y,
                z: base.z + bearing.sin() * distance,
            });
        }

        Ok(())
    }

    /// Resolve the neighborhood of a coordinate, place it, and export one scene per sector
    ///
    /// The target sector comes first. Returns an empty list when the coordinate has no
    /// bottom sector.
    pub fn bake(&mut self, lat: f64, lon: f64) -> Result<Vec<SectorScene>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("index::bake");

        let chunk = self.neighbors_for_coords(lat, lon);
        let Some((&target, others)) = chunk.split_first() else {
            return Ok(Vec::new());
        };
        tracing::debug!("Baking {} sectors around {}", chunk.len(), target);

        self.lay_down_sectors(target, others)?;

        let (tree, nodes, ways) = (&self.tree, &self.nodes, &self.ways);
        let altitude = self.config.node_altitude;
        chunk
            .as_slice()
            .par_iter()
            .map(|&sector| SectorScene::build(tree, sector, nodes, ways, altitude))
            .collect()
    }

    /// Get index information
    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            node_count: self.nodes.len(),
            way_count: self.ways.len(),
            sector_count: self.tree.len(),
            bottom_sector_count: self.tree.bottom_count(),
            dropped_way_count: self.dropped_ways.len(),
        }
    }

    #[inline]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[inline]
    pub fn tree(&self) -> &SectorTree {
        &self.tree
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    #[inline]
    pub fn way(&self, id: WayId) -> Option<&Way> {
        self.ways.get(&id)
    }

    #[inline]
    pub fn nodes(&self) -> &HashMap<NodeId, Node> {
        &self.nodes
    }

    #[inline]
    pub fn ways(&self) -> &HashMap<WayId, Way> {
        &self.ways
    }

    #[inline]
    pub fn dropped_ways(&self) -> &[WayId] {
        &self.dropped_ways
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.ways.is_empty()
    }

    /// Drop every entity and sector, keeping the configuration
    pub fn clear(&mut self) {
        self.tree = SectorTree::new(self.config.world_bounds);
        self.nodes.clear();
        self.ways.clear();
        self.dropped_ways.clear();
    }
}
