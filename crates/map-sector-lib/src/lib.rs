//! Map Sector Library - Spatial Index and Local Placement for Map Extracts
//!
//! This library organizes a bounded map extract (nodes and ways tagged with attributes) into a
//! recursive quadtree of lat/lon sectors, answers spatial queries against it, and places every
//! entity into a local, metrically accurate East-North-Up frame for rendering.
//!
//! # Architecture
//!
//! - **[`GeodeticConverter`]**: Geodetic / ECEF / NED / ENU conversions around a reference point
//! - **[`Bounds`]**: Axis-aligned lat/lon rectangle with half-open containment tests
//! - **[`Node`] / [`Way`]**: Map entities; ways reference nodes and derive their own bounds
//! - **[`SectorTree`]**: Arena-backed quadtree with 15 fixed levels (level 14 is the bottom)
//! - **[`MapIndex`]**: Top-level API for ingestion, neighbor lookup, placement and scene export
//!
//! # Performance Characteristics
//!
//! - **Insertion**: O(D) per entity where D = 14 is the bottom level
//! - **Point query**: O(D), read-only, never subdivides
//! - **Neighbor query**: at most 9 point queries

mod bounds;
mod entity;
mod geodetic;
mod index;
mod scene;
mod sector;
pub mod tags;

// Public API exports
pub use bounds::Bounds;
pub use entity::{MapDocument, Node, NodeId, Way, WayId, WayKind};
pub use geodetic::{
    EcefCoords, EnuCoords, GeodeticConverter, GeodeticCoords, NedCoords, bearing_between_coords,
    distance_between_coords,
};
pub use index::{IndexConfig, IndexInfo, IngestReport, MAX_LAY_DOWN_SECTORS, MapIndex};
pub use scene::{PlacedNode, PlacedWay, SectorScene};
pub use sector::{
    BOTTOM_LEVEL, BottomSector, LEVELS, Placement, Quadrant, Sector, SectorId, SectorKind,
    SectorTree,
};
pub use tags::Tags;

/// Error types for the sector index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Malformed bounds: [{min_lat}, {min_lon}] - [{max_lat}, {max_lon}]")]
    MalformedBounds {
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
    },

    #[error("Geodetic converter has no reference point")]
    MissingReference,

    #[error("Way {0} does not fit inside the sector bounds")]
    WayOutOfBounds(WayId),

    #[error("Way {0} has no nodes")]
    EmptyWay(WayId),

    #[error("Way {way} references unknown node {node}")]
    UnknownNode { way: WayId, node: NodeId },

    #[error("Node {0} is already registered")]
    DuplicateNode(NodeId),

    #[error("Way {0} is already registered")]
    DuplicateWay(WayId),

    #[error("No sector can hold node {node} at ({lat}, {lon})")]
    NodeOutsideSectors { node: NodeId, lat: f64, lon: f64 },

    #[error("Sector {0} has already been subdivided")]
    AlreadySubdivided(SectorId),

    #[error("Node {node} already belongs to sector {sector}")]
    NodeAlreadyPlaced { node: NodeId, sector: SectorId },

    #[error("Refusing to lay down {requested} sectors (limit is {limit})")]
    FanOutExceeded { requested: usize, limit: usize },

    #[error("Invalid level requested: {0}")]
    InvalidLevel(usize),

    #[error("Unknown sector {0}")]
    UnknownSector(SectorId),

    #[error("Sector {0} is not a bottom sector")]
    NotBottomSector(SectorId),
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn(IndexConfig) -> MapIndex = MapIndex::new;
        let _: fn() -> IndexConfig = IndexConfig::default;
        let _: fn() -> GeodeticConverter = GeodeticConverter::new;
    }

    #[test]
    fn test_error_messages() {
        let err = IndexError::FanOutExceeded {
            requested: 101,
            limit: 100,
        };
        assert_eq!(
            err.to_string(),
            "Refusing to lay down 101 sectors (limit is 100)"
        );
        assert_eq!(
            IndexError::InvalidLevel(15).to_string(),
            "Invalid level requested: 15"
        );
    }
}
