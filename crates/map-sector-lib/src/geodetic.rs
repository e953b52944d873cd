//! Geodetic coordinate conversions around a local reference point
//!
//! Converts between geodetic (lat/lon/alt), Earth-Centered-Earth-Fixed (ECEF),
//! North-East-Down (NED) and East-North-Up (ENU) frames. The local tangent plane is
//! anchored at a reference point set with [`GeodeticConverter::set_reference`].
//!
//! The ECEF -> NED rotation is built from the *geocentric* latitude of the reference
//! ECEF point while the NED -> ECEF rotation uses the geodetic latitude. Both the
//! forward and inverse paths depend on this pairing, so keep them together.

use crate::{IndexError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// WGS84 semi-major axis in meters
pub const SEMI_MAJOR_AXIS: f64 = 6378137.0;
/// WGS84 semi-minor axis in meters
pub const SEMI_MINOR_AXIS: f64 = 6356752.3142;
/// First eccentricity squared
pub const FIRST_ECCENTRICITY_SQUARED: f64 = 6.69437999014 * 0.001;
/// Second eccentricity squared
pub const SECOND_ECCENTRICITY_SQUARED: f64 = 6.73949674228 * 0.001;

/// Mean Earth radius used by the great-circle helpers, in meters
pub const MEAN_EARTH_RADIUS_M: f64 = 6371000.0;

/// Row-major 3x3 rotation matrix
type Matrix3 = [[f64; 3]; 3];

/// Geodetic position (degrees, degrees, meters)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeodeticCoords {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Earth-Centered-Earth-Fixed position in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EcefCoords {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// North-East-Down offset from the reference point in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NedCoords {
    pub north: f64,
    pub east: f64,
    pub down: f64,
}

/// East-North-Up offset from the reference point in meters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnuCoords {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

/// Cached state derived from the reference point
#[derive(Debug, Clone, PartialEq)]
struct Reference {
    geodetic: GeodeticCoords,
    ecef: EcefCoords,
    ecef_to_ned: Matrix3,
    ned_to_ecef: Matrix3,
}

/// Converter between geodetic, ECEF and local tangent-plane frames
///
/// Absolute conversions ([`geodetic_to_ecef`](Self::geodetic_to_ecef),
/// [`ecef_to_geodetic`](Self::ecef_to_geodetic)) work at any time. Relative
/// conversions fail with [`IndexError::MissingReference`] until a reference is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeodeticConverter {
    reference: Option<Reference>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl GeodeticConverter {
    /// Create a converter without a reference point
    pub fn new() -> Self {
        Self { reference: None }
    }

    /// Create a converter referenced to the given geodetic point
    pub fn with_reference(latitude: f64, longitude: f64, altitude: f64) -> Self {
        let mut converter = Self::new();
        converter.set_reference(latitude, longitude, altitude);
        converter
    }

    /// Set the local tangent-plane origin and cache its ECEF position and rotations
    pub fn set_reference(&mut self, latitude: f64, longitude: f64, altitude: f64) {
        let ecef = Self::geodetic_to_ecef(latitude, longitude, altitude);
        let lon_rad = longitude.to_radians();

        // Geocentric latitude of the reference point
        let phi_p = ecef.z.atan2((ecef.x * ecef.x + ecef.y * ecef.y).sqrt());

        self.reference = Some(Reference {
            geodetic: GeodeticCoords {
                latitude,
                longitude,
                altitude,
            },
            ecef,
            ecef_to_ned: n_re(phi_p, lon_rad),
            ned_to_ecef: transpose(n_re(latitude.to_radians(), lon_rad)),
        });
    }

    /// The reference point, if one was set
    #[inline]
    pub fn reference(&self) -> Option<GeodeticCoords> {
        self.reference.as_ref().map(|r| r.geodetic)
    }

    /// Whether a reference point was set
    #[inline]
    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    fn require_reference(&self) -> Result<&Reference> {
        self.reference.as_ref().ok_or(IndexError::MissingReference)
    }

    /// Convert geodetic coordinates (degrees, meters) to ECEF
    pub fn geodetic_to_ecef(latitude: f64, longitude: f64, altitude: f64) -> EcefCoords {
        let lat_rad = latitude.to_radians();
        let lon_rad = longitude.to_radians();
        let sin_lat = lat_rad.sin();
        let xi = (1.0 - FIRST_ECCENTRICITY_SQUARED * sin_lat * sin_lat).sqrt();

        EcefCoords {
            x: (SEMI_MAJOR_AXIS / xi + altitude) * lat_rad.cos() * lon_rad.cos(),
            y: (SEMI_MAJOR_AXIS / xi + altitude) * lat_rad.cos() * lon_rad.sin(),
            z: ((SEMI_MAJOR_AXIS / xi) * (1.0 - FIRST_ECCENTRICITY_SQUARED) + altitude) * sin_lat,
        }
    }

    /// Convert ECEF coordinates to geodetic coordinates
    ///
    /// Closed-form solution from J. Zhu, "Conversion of Earth-centered Earth-fixed
    /// coordinates to geodetic coordinates", IEEE Transactions on Aerospace and
    /// Electronic Systems, vol. 30, pp. 957-961, 1994. Undefined exactly on the poles.
    pub fn ecef_to_geodetic(x: f64, y: f64, z: f64) -> GeodeticCoords {
        const A: f64 = SEMI_MAJOR_AXIS;
        const B: f64 = SEMI_MINOR_AXIS;
        const E2: f64 = FIRST_ECCENTRICITY_SQUARED;

        let r = (x * x + y * y).sqrt();
        let e_sq = A * A - B * B;
        let f = 54.0 * B * B * z * z;
        let g = r * r + (1.0 - E2) * z * z - E2 * e_sq;
        let c = (E2 * E2 * f * r * r) / g.powi(3);
        let s = (1.0 + c + (c * c + 2.0 * c).sqrt()).cbrt();
        let p = f / (3.0 * (s + 1.0 / s + 1.0).powi(2) * g * g);
        let q = (1.0 + 2.0 * E2 * E2 * p).sqrt();
        let r_0 = -(p * E2 * r) / (1.0 + q)
            + (0.5 * A * A * (1.0 + 1.0 / q)
                - (p * (1.0 - E2) * z * z) / (q * (1.0 + q))
                - 0.5 * p * r * r)
                .sqrt();
        let u = ((r - E2 * r_0).powi(2) + z * z).sqrt();
        let v = ((r - E2 * r_0).powi(2) + (1.0 - E2) * z * z).sqrt();
        let z_0 = (B * B * z) / (A * v);

        GeodeticCoords {
            latitude: ((z + SECOND_ECCENTRICITY_SQUARED * z_0) / r)
                .atan()
                .to_degrees(),
            longitude: y.atan2(x).to_degrees(),
            altitude: u * (1.0 - (B * B) / (A * v)),
        }
    }

    /// Convert an ECEF position into the local NED frame
    pub fn ecef_to_ned(&self, x: f64, y: f64, z: f64) -> Result<NedCoords> {
        let reference = self.require_reference()?;
        let rotated = apply(
            &reference.ecef_to_ned,
            [
                x - reference.ecef.x,
                y - reference.ecef.y,
                z - reference.ecef.z,
            ],
        );

        Ok(NedCoords {
            north: rotated[0],
            east: rotated[1],
            down: -rotated[2],
        })
    }

    /// Convert a local NED offset into ECEF
    pub fn ned_to_ecef(&self, north: f64, east: f64, down: f64) -> Result<EcefCoords> {
        let reference = self.require_reference()?;
        let rotated = apply(&reference.ned_to_ecef, [north, east, -down]);

        Ok(EcefCoords {
            x: rotated[0] + reference.ecef.x,
            y: rotated[1] + reference.ecef.y,
            z: rotated[2] + reference.ecef.z,
        })
    }

    /// Geodetic position to local NED frame
    pub fn geodetic_to_ned(&self, latitude: f64, longitude: f64, altitude: f64) -> Result<NedCoords> {
        let ecef = Self::geodetic_to_ecef(latitude, longitude, altitude);
        self.ecef_to_ned(ecef.x, ecef.y, ecef.z)
    }

    /// Local NED position to geodetic coordinates
    pub fn ned_to_geodetic(&self, north: f64, east: f64, down: f64) -> Result<GeodeticCoords> {
        let ecef = self.ned_to_ecef(north, east, down)?;
        Ok(Self::ecef_to_geodetic(ecef.x, ecef.y, ecef.z))
    }

    /// Geodetic position to local ENU frame
    pub fn geodetic_to_enu(&self, latitude: f64, longitude: f64, altitude: f64) -> Result<EnuCoords> {
        let ned = self.geodetic_to_ned(latitude, longitude, altitude)?;
        Ok(EnuCoords {
            east: ned.east,
            north: ned.north,
            up: -ned.down,
        })
    }

    /// Local ENU position to geodetic coordinates
    pub fn enu_to_geodetic(&self, east: f64, north: f64, up: f64) -> Result<GeodeticCoords> {
        self.ned_to_geodetic(north, east, -up)
    }
}

/// Rotation from ECEF into the north/east/up axes at the given angles (radians)
fn n_re(lat_rad: f64, lon_rad: f64) -> Matrix3 {
    let (s_lat, c_lat) = lat_rad.sin_cos();
    let (s_lon, c_lon) = lon_rad.sin_cos();

    [
        [-s_lat * c_lon, -s_lat * s_lon, c_lat],
        [-s_lon, c_lon, 0.0],
        [c_lat * c_lon, c_lat * s_lon, s_lat],
    ]
}

fn transpose(m: Matrix3) -> Matrix3 {
    let mut t = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            t[j][i] = *value;
        }
    }
    t
}

#[inline]
fn apply(m: &Matrix3, v: [f64; 3]) -> [f64; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

/// Great-circle (haversine) distance between two geodetic points in meters
pub fn distance_between_coords(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    MEAN_EARTH_RADIUS_M * c
}

/// Initial bearing (forward azimuth) from the first point to the second
///
/// Radians, clockwise from north, in `(-PI, PI]`.
pub fn bearing_between_coords(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let y = delta_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();
    y.atan2(x)
}
