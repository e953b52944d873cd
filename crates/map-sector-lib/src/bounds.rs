//! Axis-aligned lat/lon rectangles and their containment tests
//!
//! Point containment excludes the min edges and includes the max edges, so a point on a
//! shared edge between two adjacent sectors belongs to exactly one of them. Bounds
//! containment is closed: a rectangle touching any edge still fits.

use crate::{IndexError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rectangle in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bounds {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Bounds {
    /// Build bounds from four raw extremities, rejecting `min >= max` on either axis
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self> {
        // Negated comparisons also reject NaN
        if !(min_lat < max_lat) || !(min_lon < max_lon) {
            return Err(IndexError::MalformedBounds {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
            });
        }
        Ok(Self::from_extents(min_lat, min_lon, max_lat, max_lon))
    }

    /// Build bounds without validation. Used for quadrant splits and derived way bounds,
    /// which may legitimately be zero-sized on one axis.
    #[inline]
    pub(crate) fn from_extents(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Smallest bounds enclosing every `(lat, lon)` pair, or `None` for an empty input
    pub fn enclosing<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut points = points.into_iter();
        let (lat, lon) = points.next()?;
        let mut bounds = Self::from_extents(lat, lon, lat, lon);

        for (lat, lon) in points {
            bounds.min_lat = bounds.min_lat.min(lat);
            bounds.max_lat = bounds.max_lat.max(lat);
            bounds.min_lon = bounds.min_lon.min(lon);
            bounds.max_lon = bounds.max_lon.max(lon);
        }

        Some(bounds)
    }

    /// The whole globe
    pub fn world() -> Self {
        Self::from_extents(-90.0, -180.0, 90.0, 180.0)
    }

    #[inline]
    pub fn center_lat(&self) -> f64 {
        self.min_lat + (self.max_lat - self.min_lat) / 2.0
    }

    #[inline]
    pub fn center_lon(&self) -> f64 {
        self.min_lon + (self.max_lon - self.min_lon) / 2.0
    }

    #[inline]
    pub fn size_lat(&self) -> f64 {
        (self.max_lat - self.min_lat).abs()
    }

    #[inline]
    pub fn size_lon(&self) -> f64 {
        (self.max_lon - self.min_lon).abs()
    }

    /// Half-open point test: `min < value <= max` on both axes
    #[inline]
    pub fn can_fit_point(&self, lat: f64, lon: f64) -> bool {
        let fits_lat = self.min_lat < lat && lat <= self.max_lat;
        let fits_lon = self.min_lon < lon && lon <= self.max_lon;
        fits_lat && fits_lon
    }

    /// Whether `other` lies completely inside these bounds, edges included
    pub fn can_fit_bounds(&self, other: &Bounds) -> bool {
        let within_lat = |lat: f64| self.min_lat <= lat && lat <= self.max_lat;
        let within_lon = |lon: f64| self.min_lon <= lon && lon <= self.max_lon;

        within_lat(other.min_lat)
            && within_lat(other.max_lat)
            && within_lon(other.min_lon)
            && within_lon(other.max_lon)
    }

    /// Split into four quadrants at the center, ordered SW, SE, NW, NE
    pub fn split(&self) -> [Bounds; 4] {
        let (c_lat, c_lon) = (self.center_lat(), self.center_lon());

        [
            Self::from_extents(self.min_lat, self.min_lon, c_lat, c_lon),
            Self::from_extents(self.min_lat, c_lon, c_lat, self.max_lon),
            Self::from_extents(c_lat, self.min_lon, self.max_lat, c_lon),
            Self::from_extents(c_lat, c_lon, self.max_lat, self.max_lon),
        ]
    }
}
