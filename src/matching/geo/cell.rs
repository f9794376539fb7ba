//! Spatial cell indexing.
//!
//! Maps coordinates to fixed-precision cell keys (geohash base-32) and computes
//! the 9-cell neighbor ring used for coarse proximity blocking before any precise
//! distance computation. Pure functions, no I/O.

use std::collections::HashSet;

use crate::matching::core::errors::{MatchError, MatchResult};
use crate::matching::core::item::GeoPoint;

/// Geohash base-32 alphabet.
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Default cell precision; 5 characters is roughly a 4.9 km cell edge.
pub const DEFAULT_PRECISION: usize = 5;

/// A decoded cell: center point plus the cell dimensions in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CellBounds {
    /// Cell center.
    pub center: GeoPoint,
    /// Cell height in degrees of latitude.
    pub lat_size: f64,
    /// Cell width in degrees of longitude.
    pub lon_size: f64,
}

/// Encode coordinates into a cell key at the given precision.
///
/// Equal inputs always produce equal keys; coarser precision means larger cells
/// and therefore a wider, cheaper blocking radius.
///
/// # Errors
/// Returns `InvalidCoordinate` for non-finite or out-of-range coordinates.
pub fn cell_key(lat: f64, lon: f64, precision: usize) -> MatchResult<String> {
    let point = GeoPoint::new(lat, lon)?;
    let precision = precision.clamp(1, 12);

    let mut lat_lo = -90.0f64;
    let mut lat_hi = 90.0f64;
    let mut lon_lo = -180.0f64;
    let mut lon_hi = 180.0f64;

    let mut key = String::with_capacity(precision);
    let mut bits = 0u8;
    let mut value = 0usize;
    let mut even_bit = true;

    while key.len() < precision {
        if even_bit {
            let mid = (lon_lo + lon_hi) / 2.0;
            if point.lon >= mid {
                value = (value << 1) | 1;
                lon_lo = mid;
            } else {
                value <<= 1;
                lon_hi = mid;
            }
        } else {
            let mid = (lat_lo + lat_hi) / 2.0;
            if point.lat >= mid {
                value = (value << 1) | 1;
                lat_lo = mid;
            } else {
                value <<= 1;
                lat_hi = mid;
            }
        }
        even_bit = !even_bit;
        bits += 1;

        if bits == 5 {
            key.push(BASE32[value] as char);
            bits = 0;
            value = 0;
        }
    }

    Ok(key)
}

/// Decode a cell key into its center and dimensions.
///
/// # Errors
/// Returns an error for an empty key or characters outside the base-32 alphabet.
pub fn decode(cell: &str) -> MatchResult<CellBounds> {
    if cell.is_empty() || cell.len() > 12 {
        return Err(MatchError::InvalidItem(format!(
            "malformed cell key: {cell:?}"
        )));
    }

    let mut lat_lo = -90.0f64;
    let mut lat_hi = 90.0f64;
    let mut lon_lo = -180.0f64;
    let mut lon_hi = 180.0f64;
    let mut even_bit = true;

    for ch in cell.bytes() {
        let value = BASE32
            .iter()
            .position(|&b| b == ch.to_ascii_lowercase())
            .ok_or_else(|| MatchError::InvalidItem(format!("malformed cell key: {cell:?}")))?;

        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1;
            if even_bit {
                let mid = (lon_lo + lon_hi) / 2.0;
                if bit == 1 {
                    lon_lo = mid;
                } else {
                    lon_hi = mid;
                }
            } else {
                let mid = (lat_lo + lat_hi) / 2.0;
                if bit == 1 {
                    lat_lo = mid;
                } else {
                    lat_hi = mid;
                }
            }
            even_bit = !even_bit;
        }
    }

    Ok(CellBounds {
        center: GeoPoint {
            lat: (lat_lo + lat_hi) / 2.0,
            lon: (lon_lo + lon_hi) / 2.0,
        },
        lat_size: lat_hi - lat_lo,
        lon_size: lon_hi - lon_lo,
    })
}

/// The cell itself plus its adjacent cells at the same precision.
///
/// Derived by re-encoding centers offset one cell dimension in each direction:
/// longitude wraps across the antimeridian, rows past the poles are dropped, and
/// duplicates collapse, so polar cells return fewer than 9 keys. Ordering is not
/// significant; callers use the ring as a set-membership filter.
///
/// # Errors
/// Returns an error if the key cannot be decoded.
pub fn neighbors(cell: &str) -> MatchResult<Vec<String>> {
    let bounds = decode(cell)?;
    let precision = cell.len();

    let mut ring = HashSet::new();
    for lat_step in [-1.0f64, 0.0, 1.0] {
        let lat = lat_step.mul_add(bounds.lat_size, bounds.center.lat);
        if !(-90.0..=90.0).contains(&lat) {
            continue;
        }
        for lon_step in [-1.0f64, 0.0, 1.0] {
            let mut lon = lon_step.mul_add(bounds.lon_size, bounds.center.lon);
            if lon > 180.0 {
                lon -= 360.0;
            } else if lon < -180.0 {
                lon += 360.0;
            }
            ring.insert(cell_key(lat, lon, precision)?);
        }
    }

    Ok(ring.into_iter().collect())
}
