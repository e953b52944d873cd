//! Arena-backed quadtree of lat/lon sectors
//!
//! The tree has a fixed depth table of 15 levels. Level 0 covers the whole indexed area and
//! level 14 is the bottom, where sectors carry their own geodetic reference and the nodes
//! that fall inside them.
//!
//! Sectors live in a flat arena and refer to each other by [`SectorId`]. The arena index is
//! the id, so ids are handed out in creation order and stay stable for the lifetime of the
//! tree. Insertion (`add_way`, `add_node`) creates structure on demand; every other
//! traversal is read-only and never subdivides.

use crate::{Bounds, GeodeticConverter, IndexError, NodeId, Result, WayId};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Angular size in degrees of a sector at each level
pub const LEVELS: [f64; 15] = [
    360.0,
    180.0,
    90.0,
    45.0,
    22.5,
    11.25,
    5.625,
    2.8125,
    1.40625,
    0.703125,
    0.3515625,
    0.17578125,
    0.087890625,
    0.0439453125,
    0.02197265625,
];

/// Deepest level; sectors here never subdivide
pub const BOTTOM_LEVEL: usize = LEVELS.len() - 1;

/// Map the -180 meridian onto 180, which the half-open point test accepts
#[inline]
fn wrap_lon(lon: f64) -> f64 {
    if lon == -180.0 { 180.0 } else { lon }
}

/// Identifier of a sector, also its slot in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SectorId(pub u32);

impl SectorId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Position of a sector among its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quadrant {
    SouthWest = 0,
    SouthEast = 1,
    NorthWest = 2,
    NorthEast = 3,
}

impl Quadrant {
    /// All quadrants in sibling order, matching [`Bounds::split`]
    pub const ALL: [Quadrant; 4] = [
        Quadrant::SouthWest,
        Quadrant::SouthEast,
        Quadrant::NorthWest,
        Quadrant::NorthEast,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Offset of a bottom sector in the shared scene, in meters
///
/// `x` follows the cosine of the bearing and `z` its sine, `y` is up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// State specific to bottom-level sectors
#[derive(Debug, Clone, PartialEq)]
pub struct BottomSector {
    /// Referenced to the sector's bounds center at altitude 0
    converter: GeodeticConverter,
    nodes: Vec<NodeId>,
    placement: Placement,
}

impl BottomSector {
    fn new(bounds: &Bounds) -> Self {
        Self {
            converter: GeodeticConverter::with_reference(
                bounds.center_lat(),
                bounds.center_lon(),
                0.0,
            ),
            nodes: Vec::new(),
            placement: Placement::default(),
        }
    }

    #[inline]
    pub fn converter(&self) -> &GeodeticConverter {
        &self.converter
    }

    #[inline]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[inline]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub(crate) fn set_placement(&mut self, placement: Placement) {
        self.placement = placement;
    }
}

/// Branch or bottom specific state of a sector
#[derive(Debug, Clone, PartialEq)]
pub enum SectorKind {
    /// Levels 0 to 13, subdivided into exactly four children or not at all
    Branch { children: Option<[SectorId; 4]> },
    /// Level 14
    Bottom(BottomSector),
}

/// A quadtree cell
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    id: SectorId,
    /// `None` only for the root
    idx: Option<Quadrant>,
    level: usize,
    bounds: Bounds,
    parent: Option<SectorId>,
    /// Ways that could not be pushed deeper than this sector
    ways: Vec<WayId>,
    kind: SectorKind,
}

impl Sector {
    fn new(
        id: SectorId,
        idx: Option<Quadrant>,
        level: usize,
        bounds: Bounds,
        parent: Option<SectorId>,
    ) -> Self {
        let kind = if level >= BOTTOM_LEVEL {
            SectorKind::Bottom(BottomSector::new(&bounds))
        } else {
            SectorKind::Branch { children: None }
        };

        Self {
            id,
            idx,
            level,
            bounds,
            parent,
            ways: Vec::new(),
            kind,
        }
    }

    #[inline]
    pub fn id(&self) -> SectorId {
        self.id
    }

    #[inline]
    pub fn idx(&self) -> Option<Quadrant> {
        self.idx
    }

    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    #[inline]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    #[inline]
    pub fn parent(&self) -> Option<SectorId> {
        self.parent
    }

    #[inline]
    pub fn ways(&self) -> &[WayId] {
        &self.ways
    }

    #[inline]
    pub fn kind(&self) -> &SectorKind {
        &self.kind
    }

    #[inline]
    pub fn children(&self) -> Option<[SectorId; 4]> {
        match self.kind {
            SectorKind::Branch { children } => children,
            SectorKind::Bottom(_) => None,
        }
    }

    #[inline]
    pub fn is_subdivided(&self) -> bool {
        self.children().is_some()
    }

    #[inline]
    pub fn is_bottom(&self) -> bool {
        matches!(self.kind, SectorKind::Bottom(_))
    }

    #[inline]
    pub fn as_bottom(&self) -> Option<&BottomSector> {
        match &self.kind {
            SectorKind::Bottom(bottom) => Some(bottom),
            SectorKind::Branch { .. } => None,
        }
    }
}

/// The sector arena, rooted at [`SectorTree::root`]
#[derive(Debug, Clone)]
pub struct SectorTree {
    sectors: Vec<Sector>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl SectorTree {
    /// Create a tree with a single unsubdivided root covering `bounds`
    pub fn new(bounds: Bounds) -> Self {
        Self {
            sectors: vec![Sector::new(SectorId(0), None, 0, bounds, None)],
        }
    }

    #[inline]
    pub fn root(&self) -> SectorId {
        SectorId(0)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sectors.is_empty()
    }

    #[inline]
    pub fn get(&self, id: SectorId) -> Option<&Sector> {
        self.sectors.get(id.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sector> {
        self.sectors.iter()
    }

    pub fn bottom_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_bottom()).count()
    }

    fn sector(&self, id: SectorId) -> Result<&Sector> {
        self.get(id).ok_or(IndexError::UnknownSector(id))
    }

    fn sector_mut(&mut self, id: SectorId) -> Result<&mut Sector> {
        self.sectors
            .get_mut(id.index())
            .ok_or(IndexError::UnknownSector(id))
    }

    pub fn bottom(&self, id: SectorId) -> Result<&BottomSector> {
        self.sector(id)?
            .as_bottom()
            .ok_or(IndexError::NotBottomSector(id))
    }

    pub(crate) fn bottom_mut(&mut self, id: SectorId) -> Result<&mut BottomSector> {
        match &mut self.sector_mut(id)?.kind {
            SectorKind::Bottom(bottom) => Ok(bottom),
            SectorKind::Branch { .. } => Err(IndexError::NotBottomSector(id)),
        }
    }

    /// Split a sector into its four quadrants
    ///
    /// A no-op on bottom sectors. Fails if the sector is already subdivided.
    pub fn subdivide(&mut self, id: SectorId) -> Result<()> {
        let sector = self.sector(id)?;
        if sector.is_bottom() {
            return Ok(());
        }
        if sector.is_subdivided() {
            return Err(IndexError::AlreadySubdivided(id));
        }

        let level = sector.level + 1;
        let quadrants = sector.bounds.split();
        let first = self.sectors.len() as u32;
        let children = [0, 1, 2, 3].map(|offset| SectorId(first + offset));

        for ((child, idx), bounds) in children.into_iter().zip(Quadrant::ALL).zip(quadrants) {
            self.sectors
                .push(Sector::new(child, Some(idx), level, bounds, Some(id)));
        }
        self.sector_mut(id)?.kind = SectorKind::Branch {
            children: Some(children),
        };

        if level == BOTTOM_LEVEL {
            tracing::debug!("Sector {} reached the bottom level", id);
        }
        Ok(())
    }

    /// Store a way at the deepest sector that can hold its bounds whole
    ///
    /// Children are tried in quadrant order and the first one that fits wins. A way that
    /// straddles a child boundary stays at the current sector.
    ///
    /// # Arguments
    /// * `way` - Id of the way to store
    /// * `bounds` - Bounds of the way, derived from its nodes
    ///
    /// # Returns
    /// The sector the way was stored in
    pub fn add_way(&mut self, way: WayId, bounds: &Bounds) -> Result<SectorId> {
        let mut current = self.root();
        if !self.sector(current)?.bounds.can_fit_bounds(bounds) {
            return Err(IndexError::WayOutOfBounds(way));
        }

        loop {
            let sector = self.sector(current)?;
            if sector.is_bottom() {
                break;
            }
            if !sector.is_subdivided() {
                self.subdivide(current)?;
            }

            let Some(children) = self.sector(current)?.children() else {
                break;
            };
            let fitting = children.into_iter().find(|&child| {
                self.get(child)
                    .is_some_and(|c| c.bounds.can_fit_bounds(bounds))
            });
            match fitting {
                Some(child) => current = child,
                None => break,
            }
        }

        self.sector_mut(current)?.ways.push(way);
        Ok(current)
    }

    /// Push a node down to the bottom sector containing it, creating sectors on the way
    ///
    /// A node on the -180 meridian is placed as if it were on 180. A node on the min
    /// latitude edge of the root (the south pole for the whole globe) fits nowhere.
    pub fn add_node(&mut self, node: NodeId, lat: f64, lon: f64) -> Result<SectorId> {
        let outside = || IndexError::NodeOutsideSectors { node, lat, lon };
        let lon = wrap_lon(lon);

        let mut current = self.root();
        if !self.sector(current)?.bounds.can_fit_point(lat, lon) {
            return Err(outside());
        }

        loop {
            let sector = self.sector(current)?;
            if sector.is_bottom() {
                break;
            }
            if !sector.is_subdivided() {
                self.subdivide(current)?;
            }

            current = self.child_containing(current, lat, lon).ok_or_else(outside)?;
        }

        self.bottom_mut(current)?.nodes.push(node);
        Ok(current)
    }

    fn child_containing(&self, id: SectorId, lat: f64, lon: f64) -> Option<SectorId> {
        self.get(id)?.children()?.into_iter().find(|&child| {
            self.get(child)
                .is_some_and(|c| c.bounds.can_fit_point(lat, lon))
        })
    }

    /// Every existing sector containing the point, from the root down to the deepest one
    pub fn sectors_by_coords(&self, lat: f64, lon: f64) -> Vec<SectorId> {
        let lon = wrap_lon(lon);
        let mut path = Vec::with_capacity(LEVELS.len());
        let root = self.root();
        if !self
            .get(root)
            .is_some_and(|s| s.bounds.can_fit_point(lat, lon))
        {
            return path;
        }

        let mut current = Some(root);
        while let Some(id) = current {
            path.push(id);
            current = self.child_containing(id, lat, lon);
        }
        path
    }

    /// The bottom sector containing the point, if the tree reaches that deep there
    pub fn bottom_sector_at(&self, lat: f64, lon: f64) -> Option<SectorId> {
        self.sectors_by_coords(lat, lon)
            .last()
            .copied()
            .filter(|&id| self.get(id).is_some_and(Sector::is_bottom))
    }

    /// Every sector at exactly `level`, in depth-first quadrant order
    pub fn sectors_by_level(&self, level: usize) -> Result<Vec<SectorId>> {
        if level > BOTTOM_LEVEL {
            return Err(IndexError::InvalidLevel(level));
        }

        let mut found = Vec::new();
        self.collect_level(self.root(), level, &mut found);
        Ok(found)
    }

    fn collect_level(&self, id: SectorId, level: usize, found: &mut Vec<SectorId>) {
        let Some(sector) = self.get(id) else {
            return;
        };
        if sector.level == level {
            found.push(id);
            return;
        }
        if let Some(children) = sector.children() {
            for child in children {
                self.collect_level(child, level, found);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_tree() -> SectorTree {
        SectorTree::new(Bounds::world())
    }

    #[test]
    fn test_levels_halve() {
        for pair in LEVELS.windows(2) {
            assert_eq!(pair[0] / 2.0, pair[1]);
        }
        assert_eq!(BOTTOM_LEVEL, 14);
        assert_eq!(LEVELS[BOTTOM_LEVEL], 0.02197265625);
    }

    #[test]
    fn test_subdivide_creates_quadrants() {
        let mut tree = world_tree();
        let root = tree.root();
        assert!(!tree.get(root).unwrap().is_subdivided());

        tree.subdivide(root).unwrap();
        let children = tree.get(root).unwrap().children().unwrap();
        assert_eq!(tree.len(), 5);

        let expected = Bounds::world().split();
        for (i, child) in children.into_iter().enumerate() {
            let sector = tree.get(child).unwrap();
            assert_eq!(sector.bounds(), &expected[i]);
            assert_eq!(sector.level(), 1);
            assert_eq!(sector.parent(), Some(root));
            assert_eq!(sector.idx(), Some(Quadrant::ALL[i]));
            assert_eq!(sector.idx().unwrap().index(), i);
        }
    }

    #[test]
    fn test_subdivide_twice_fails() {
        let mut tree = world_tree();
        tree.subdivide(tree.root()).unwrap();
        assert!(matches!(
            tree.subdivide(tree.root()),
            Err(IndexError::AlreadySubdivided(SectorId(0)))
        ));
    }

    #[test]
    fn test_subdivide_bottom_is_noop() {
        let mut tree = world_tree();
        let bottom = tree.add_node(NodeId(1), 10.0, 10.0).unwrap();
        let len = tree.len();

        tree.subdivide(bottom).unwrap();
        assert!(!tree.get(bottom).unwrap().is_subdivided());
        assert_eq!(tree.len(), len);
    }

    #[test]
    fn test_add_node_reaches_bottom() {
        let mut tree = world_tree();
        let bottom = tree.add_node(NodeId(1), 48.85, 2.35).unwrap();
        let sector = tree.get(bottom).unwrap();

        assert!(sector.is_bottom());
        assert_eq!(sector.level(), BOTTOM_LEVEL);
        assert!(sector.bounds().can_fit_point(48.85, 2.35));
        assert_eq!(tree.bottom(bottom).unwrap().nodes(), &[NodeId(1)]);

        // Reference sits at the sector center
        let reference = tree.bottom(bottom).unwrap().converter().reference().unwrap();
        assert_eq!(reference.latitude, sector.bounds().center_lat());
        assert_eq!(reference.longitude, sector.bounds().center_lon());
        assert_eq!(reference.altitude, 0.0);

        // Root + 4 per level down to the bottom
        assert_eq!(tree.len(), 1 + 4 * BOTTOM_LEVEL);
        assert_eq!(tree.bottom_count(), 4);
    }

    #[test]
    fn test_add_node_outside_root() {
        let mut tree = SectorTree::new(Bounds::new(0.0, 0.0, 10.0, 10.0).unwrap());
        assert!(matches!(
            tree.add_node(NodeId(5), 20.0, 5.0),
            Err(IndexError::NodeOutsideSectors {
                node: NodeId(5),
                ..
            })
        ));
        // The min edge is outside under the half-open rule
        assert!(tree.add_node(NodeId(6), 0.0, 5.0).is_err());
    }

    #[test]
    fn test_add_node_on_antimeridian() {
        let mut tree = world_tree();
        let west = tree.add_node(NodeId(1), 10.0, -180.0).unwrap();
        let east = tree.add_node(NodeId(2), 10.0, 180.0).unwrap();
        assert_eq!(west, east);
        assert_eq!(tree.bottom_sector_at(10.0, -180.0), Some(west));
        assert_eq!(tree.sectors_by_coords(10.0, -180.0).len(), LEVELS.len());

        assert!(matches!(
            tree.add_node(NodeId(3), -90.0, 10.0),
            Err(IndexError::NodeOutsideSectors { lat, .. }) if lat == -90.0
        ));
        assert!(tree.add_node(NodeId(4), 90.0, 10.0).is_ok());
    }

    #[test]
    fn test_nodes_share_bottom_sector() {
        let mut tree = world_tree();
        let a = tree.add_node(NodeId(1), 0.001, 0.001).unwrap();
        let b = tree.add_node(NodeId(2), 0.002, 0.002).unwrap();
        assert_eq!(a, b);
        assert_eq!(tree.bottom(a).unwrap().nodes(), &[NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_add_way_straddling_children_stays_at_parent() {
        let mut tree = world_tree();
        let way_bounds = Bounds::new(-1.0, -1.0, 1.0, 1.0).unwrap();
        let stored = tree.add_way(WayId(1), &way_bounds).unwrap();

        assert_eq!(stored, tree.root());
        assert_eq!(tree.get(stored).unwrap().ways(), &[WayId(1)]);
        assert!(tree.get(stored).unwrap().is_subdivided());
        let stored_elsewhere = tree
            .iter()
            .filter(|s| s.ways().contains(&WayId(1)))
            .count();
        assert_eq!(stored_elsewhere, 1);
    }

    #[test]
    fn test_add_way_descends_into_fitting_child() {
        let mut tree = world_tree();
        let way_bounds = Bounds::new(10.0, 10.0, 11.0, 11.0).unwrap();
        let stored = tree.add_way(WayId(1), &way_bounds).unwrap();
        let sector = tree.get(stored).unwrap();

        assert!(sector.level() > 0);
        assert!(sector.bounds().can_fit_bounds(&way_bounds));
        if let Some(children) = sector.children() {
            for child in children {
                assert!(!tree.get(child).unwrap().bounds().can_fit_bounds(&way_bounds));
            }
        }
    }

    #[test]
    fn test_add_way_tiny_reaches_bottom() {
        let mut tree = world_tree();
        let way_bounds = Bounds::enclosing([(0.001, 0.001), (0.002, 0.002)]).unwrap();
        let stored = tree.add_way(WayId(9), &way_bounds).unwrap();
        assert!(tree.get(stored).unwrap().is_bottom());
    }

    #[test]
    fn test_add_way_out_of_bounds() {
        let mut tree = SectorTree::new(Bounds::new(0.0, 0.0, 10.0, 10.0).unwrap());
        let way_bounds = Bounds::new(9.0, 9.0, 11.0, 11.0).unwrap();
        assert!(matches!(
            tree.add_way(WayId(3), &way_bounds),
            Err(IndexError::WayOutOfBounds(WayId(3)))
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_queries_do_not_subdivide() {
        let tree = world_tree();
        assert_eq!(tree.bottom_sector_at(10.0, 10.0), None);
        assert_eq!(tree.sectors_by_coords(10.0, 10.0), vec![tree.root()]);
        assert!(tree.sectors_by_coords(95.0, 10.0).is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_sectors_by_coords_follows_descent() {
        let mut tree = world_tree();
        let bottom = tree.add_node(NodeId(1), -33.9, 151.2).unwrap();

        let path = tree.sectors_by_coords(-33.9, 151.2);
        assert_eq!(path.len(), LEVELS.len());
        assert_eq!(path.first(), Some(&tree.root()));
        assert_eq!(path.last(), Some(&bottom));
        for (level, id) in path.iter().enumerate() {
            assert_eq!(tree.get(*id).unwrap().level(), level);
        }
        assert_eq!(tree.bottom_sector_at(-33.9, 151.2), Some(bottom));
    }

    #[test]
    fn test_sectors_by_level() {
        let mut tree = world_tree();
        assert_eq!(tree.sectors_by_level(0).unwrap(), vec![tree.root()]);
        assert!(tree.sectors_by_level(3).unwrap().is_empty());

        tree.add_node(NodeId(1), 5.0, 5.0).unwrap();
        assert_eq!(tree.sectors_by_level(1).unwrap().len(), 4);
        assert_eq!(tree.sectors_by_level(BOTTOM_LEVEL).unwrap().len(), 4);

        assert!(matches!(
            tree.sectors_by_level(15),
            Err(IndexError::InvalidLevel(15))
        ));
    }

    #[test]
    fn test_bottom_accessors_reject_branches() {
        let tree = world_tree();
        assert!(matches!(
            tree.bottom(tree.root()),
            Err(IndexError::NotBottomSector(SectorId(0)))
        ));
        assert!(matches!(
            tree.bottom(SectorId(42)),
            Err(IndexError::UnknownSector(SectorId(42)))
        ));
    }
}
