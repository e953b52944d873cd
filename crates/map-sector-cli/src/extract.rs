//! JSON map extract format
//!
//! A flat dump of the source data: document bounds, nodes with raw tags, and ways listing
//! node ids. Tags are reduced to the index whitelists while converting to a
//! [`MapDocument`].

use crate::error::{CliError, Result};
use map_sector_lib::{Bounds, MapDocument, Node, NodeId, WayId, tags};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{BufReader, Read};
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractBounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractNode {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractWay {
    pub id: u64,
    pub nodes: Vec<u64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A map extract as stored on disk
#[derive(Debug, Clone, Deserialize)]
pub struct MapExtract {
    pub bounds: ExtractBounds,
    #[serde(default)]
    pub nodes: Vec<ExtractNode>,
    #[serde(default)]
    pub ways: Vec<ExtractWay>,
}

impl MapExtract {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Resolve the extract into a document, filtering tags and optionally boring ways
    pub fn into_document(self, keep_all_ways: bool) -> Result<MapDocument> {
        let b = self.bounds;
        let bounds = Bounds::new(b.min_lat, b.min_lon, b.max_lat, b.max_lon)?;
        let mut document = MapDocument::new(bounds);

        for node in self.nodes {
            document.add_node(
                Node::new(NodeId(node.id), node.lat, node.lon)
                    .with_tags(tags::filter_node_tags(node.tags)),
            )?;
        }

        for way in self.ways {
            let nodes = way.nodes.into_iter().map(NodeId).collect();
            document.add_way(WayId(way.id), nodes, tags::filter_way_tags(way.tags))?;
        }

        if !keep_all_ways {
            let dropped = document.retain_interesting_ways();
            tracing::debug!("Filtered out {} ways without interesting tags", dropped);
        }

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use map_sector_lib::IndexError;

    const EXTRACT: &str = r#"{
        "bounds": { "min_lat": 40.41, "min_lon": -3.71, "max_lat": 40.42, "max_lon": -3.70 },
        "nodes": [
            { "id": 1, "lat": 40.411, "lon": -3.709, "tags": { "highway": "traffic_signals", "name": "X" } },
            { "id": 2, "lat": 40.411, "lon": -3.708 },
            { "id": 3, "lat": 40.412, "lon": -3.708 },
            { "id": 4, "lat": 40.412, "lon": -3.709 }
        ],
        "ways": [
            { "id": 10, "nodes": [1, 2, 3, 4, 1], "tags": { "building": "yes", "name": "Block" } },
            { "id": 11, "nodes": [1, 2], "tags": { "highway": "footway" } },
            { "id": 12, "nodes": [2, 3] }
        ]
    }"#;

    #[test]
    fn test_into_document_filters_ways() {
        let extract = MapExtract::from_reader(EXTRACT.as_bytes()).unwrap();
        let document = extract.into_document(false).unwrap();

        assert_eq!(document.nodes().len(), 4);
        assert_eq!(document.ways().len(), 1);

        let way = &document.ways()[&WayId(10)];
        assert!(way.is_polygon());
        assert_eq!(way.tags().unwrap().len(), 1);

        let node = &document.nodes()[&NodeId(1)];
        assert!(node.is_standalone());
        assert!(node.tags().unwrap().get("name").is_none());
        assert!(!document.nodes()[&NodeId(2)].is_standalone());
    }

    #[test]
    fn test_building_levels_survive_filtering() {
        let json = r#"{
            "bounds": { "min_lat": 0.0, "min_lon": 0.0, "max_lat": 1.0, "max_lon": 1.0 },
            "nodes": [
                { "id": 1, "lat": 0.1, "lon": 0.1 },
                { "id": 2, "lat": 0.1, "lon": 0.2 },
                { "id": 3, "lat": 0.2, "lon": 0.2 }
            ],
            "ways": [
                { "id": 1, "nodes": [1, 2, 3, 1], "tags": { "building": "retail", "building:levels": "3" } },
                { "id": 2, "nodes": [1, 2], "tags": { "height": "12" } }
            ]
        }"#;
        let document = MapExtract::from_reader(json.as_bytes())
            .unwrap()
            .into_document(false)
            .unwrap();

        assert_eq!(document.ways().len(), 1);
        assert_eq!(document.ways()[&WayId(1)].building_height(), Some(12.0));
    }

    #[test]
    fn test_into_document_keep_all_ways() {
        let extract = MapExtract::from_reader(EXTRACT.as_bytes()).unwrap();
        let document = extract.into_document(true).unwrap();
        assert_eq!(document.ways().len(), 3);
        assert!(document.ways()[&WayId(12)].tags().is_none());
    }

    #[test]
    fn test_malformed_bounds_rejected() {
        let json = r#"{ "bounds": { "min_lat": 1.0, "min_lon": 0.0, "max_lat": 0.0, "max_lon": 1.0 } }"#;
        let extract = MapExtract::from_reader(json.as_bytes()).unwrap();
        assert!(matches!(
            extract.into_document(false),
            Err(CliError::Index(IndexError::MalformedBounds { .. }))
        ));
    }

    #[test]
    fn test_unknown_node_reference_rejected() {
        let json = r#"{
            "bounds": { "min_lat": 0.0, "min_lon": 0.0, "max_lat": 1.0, "max_lon": 1.0 },
            "nodes": [{ "id": 1, "lat": 0.5, "lon": 0.5 }],
            "ways": [{ "id": 1, "nodes": [1, 2] }]
        }"#;
        let extract = MapExtract::from_reader(json.as_bytes()).unwrap();
        assert!(matches!(
            extract.into_document(true),
            Err(CliError::Index(IndexError::UnknownNode { .. }))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            MapExtract::from_reader("{ not json".as_bytes()),
            Err(CliError::Json(_))
        ));
    }
}
