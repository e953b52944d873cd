//! Render-facing export of placed sectors
//!
//! A [`SectorScene`] is a self-contained snapshot of one bottom sector: its geodetic
//! reference, where it sits in the shared scene, and its nodes and ways already converted
//! to ENU offsets from that reference.

use crate::{
    EnuCoords, GeodeticConverter, GeodeticCoords, IndexError, Node, NodeId, Placement, Result,
    SectorId, SectorTree, Tags, Way, WayId, WayKind,
};
use geo::{Area, Coord, LineString, Polygon};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A node positioned relative to its sector reference
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacedNode {
    pub id: NodeId,
    pub position: EnuCoords,
    pub tags: Option<Tags>,
}

/// A way with every point converted into the sector's ENU frame
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlacedWay {
    pub id: WayId,
    pub kind: WayKind,
    pub is_polygon: bool,
    /// One point per way node, in way order
    pub points: Vec<EnuCoords>,
    /// Estimated height for buildings, in meters
    pub height: Option<f64>,
    /// Planar area enclosed by closed ways, in square meters
    pub footprint_area: Option<f64>,
}

/// Everything the renderer needs to draw one bottom sector
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectorScene {
    pub sector: SectorId,
    pub reference: GeodeticCoords,
    pub placement: Placement,
    pub nodes: Vec<PlacedNode>,
    pub ways: Vec<PlacedWay>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SectorScene {
    /// Snapshot a bottom sector out of a built tree
    ///
    /// # Arguments
    /// * `tree` - The sector tree, after placement
    /// * `sector` - A bottom sector id
    /// * `nodes` / `ways` - The entity registries the tree refers to
    /// * `altitude` - Altitude used when projecting nodes that carry no cached position
    pub(crate) fn build(
        tree: &SectorTree,
        sector: SectorId,
        nodes: &HashMap<NodeId, Node>,
        ways: &HashMap<WayId, Way>,
        altitude: f64,
    ) -> Result<Self> {
        let bottom = tree.bottom(sector)?;
        let converter = bottom.converter();
        let reference = converter.reference().ok_or(IndexError::MissingReference)?;

        let placed_nodes = bottom
            .nodes()
            .iter()
            .filter_map(|id| nodes.get(id))
            .map(|node| -> Result<PlacedNode> {
                let position = match node.relative_position() {
                    Some(position) => position,
                    None => converter.geodetic_to_enu(node.lat(), node.lon(), altitude)?,
                };
                Ok(PlacedNode {
                    id: node.id(),
                    position,
                    tags: node.tags().cloned(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let stored_ways = tree
            .get(sector)
            .map(|s| s.ways())
            .unwrap_or_default();
        let placed_ways = stored_ways
            .iter()
            .filter_map(|id| ways.get(id))
            .map(|way| PlacedWay::build(way, converter, nodes, altitude))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sector,
            reference,
            placement: bottom.placement(),
            nodes: placed_nodes,
            ways: placed_ways,
        })
    }
}

impl PlacedWay {
    /// Way nodes may live in other sectors, so points are projected from their geodetic
    /// coordinates rather than taken from the nodes' cached positions.
    fn build(
        way: &Way,
        converter: &GeodeticConverter,
        nodes: &HashMap<NodeId, Node>,
        altitude: f64,
    ) -> Result<Self> {
        let points = way
            .nodes()
            .iter()
            .map(|&id| {
                let node = nodes
                    .get(&id)
                    .ok_or(IndexError::UnknownNode { way: way.id(), node: id })?;
                converter.geodetic_to_enu(node.lat(), node.lon(), altitude)
            })
            .collect::<Result<Vec<_>>>()?;

        let is_polygon = way.is_polygon();
        let footprint_area = is_polygon.then(|| footprint_area(&points));

        Ok(Self {
            id: way.id(),
            kind: way.kind(),
            is_polygon,
            points,
            height: way.building_height(),
            footprint_area,
        })
    }
}

/// Area of the ring projected onto the east/north plane
fn footprint_area(points: &[EnuCoords]) -> f64 {
    let ring: LineString<f64> = points
        .iter()
        .map(|p| Coord {
            x: p.east,
            y: p.north,
        })
        .collect();
    Polygon::new(ring, Vec::new()).unsigned_area()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bounds, MapDocument};

    #[test]
    fn test_footprint_area_square() {
        let square = [
            EnuCoords {
                east: 0.0,
                north: 0.0,
                up: 0.0,
            },
            EnuCoords {
                east: 10.0,
                north: 0.0,
                up: 0.0,
            },
            EnuCoords {
                east: 10.0,
                north: 20.0,
                up: 1.0,
            },
            EnuCoords {
                east: 0.0,
                north: 20.0,
                up: 0.0,
            },
            EnuCoords {
                east: 0.0,
                north: 0.0,
                up: 0.0,
            },
        ];
        assert!((footprint_area(&square) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_build_scene_for_bottom_sector() {
        let mut doc = MapDocument::new(Bounds::world());
        let coords = [(1, 0.001, 0.001), (2, 0.001, 0.002), (3, 0.002, 0.002), (4, 0.002, 0.001)];
        for (id, lat, lon) in coords {
            doc.add_node(Node::new(NodeId(id), lat, lon)).unwrap();
        }
        let tags: Tags = [("building".to_string(), "house".to_string())]
            .into_iter()
            .collect();
        doc.add_way(
            WayId(1),
            vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4), NodeId(1)],
            Some(tags),
        )
        .unwrap();

        let (_, doc_nodes, doc_ways) = doc.into_parts();
        let nodes: HashMap<_, _> = doc_nodes.into_iter().collect();
        let ways: HashMap<_, _> = doc_ways.into_iter().collect();

        let mut tree = SectorTree::new(Bounds::world());
        let mut bottom = None;
        for node in nodes.values() {
            bottom = Some(tree.add_node(node.id(), node.lat(), node.lon()).unwrap());
        }
        let bottom = bottom.unwrap();
        assert_eq!(tree.add_way(WayId(1), ways[&WayId(1)].bounds()).unwrap(), bottom);

        let scene = SectorScene::build(&tree, bottom, &nodes, &ways, 0.0).unwrap();
        assert_eq!(scene.sector, bottom);
        assert_eq!(scene.nodes.len(), 4);
        assert_eq!(scene.ways.len(), 1);

        let way = &scene.ways[0];
        assert_eq!(way.kind, WayKind::Building);
        assert!(way.is_polygon);
        assert_eq!(way.points.len(), 5);
        assert_eq!(way.height, Some(6.5));
        // Roughly 111 m x 111 m near the equator
        let area = way.footprint_area.unwrap();
        assert!(area > 11_000.0 && area < 13_000.0, "area = {}", area);
    }

    #[test]
    fn test_build_scene_rejects_branch() {
        let tree = SectorTree::new(Bounds::world());
        let result = SectorScene::build(&tree, tree.root(), &HashMap::new(), &HashMap::new(), 0.0);
        assert!(matches!(result, Err(IndexError::NotBottomSector(_))));
    }
}
