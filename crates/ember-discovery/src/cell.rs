use std::fmt;

use thiserror::Error;

/// System-wide subdivision level: coordinates are quantized to 10^-2 degrees,
/// giving cells of roughly 1.1 km north-south. Fixed so cell ids are directly
/// comparable across users without reconciliation.
pub const CELL_LEVEL: u8 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum CoordError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A fixed-size region of the globe. Ordering and hashing work on the
/// quantized integer coordinates, so equal positions always produce equal
/// cells.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellId {
    level: u8,
    lat_q: i32,
    lon_q: i32,
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}:{}:{}", self.level, self.lat_q, self.lon_q)
    }
}

impl CellId {
    fn scale(level: u8) -> f64 {
        10f64.powi(level as i32)
    }

    fn lat_max(level: u8) -> i32 {
        (90.0 * Self::scale(level)) as i32
    }

    fn lon_span(level: u8) -> i32 {
        (360.0 * Self::scale(level)) as i32
    }

    fn normalized(level: u8, lat_q: i32, lon_q: i32) -> CellId {
        let lat_max = Self::lat_max(level);
        let lon_span = Self::lon_span(level);
        let half_span = lon_span / 2;
        CellId {
            level,
            // The polar rows clamp; there is nothing past them.
            lat_q: lat_q.clamp(-lat_max, lat_max - 1),
            // Longitude wraps at the antimeridian.
            lon_q: (lon_q + half_span).rem_euclid(lon_span) - half_span,
        }
    }

    /// The cell itself plus the surrounding square ring of `ring` cells in
    /// each direction (ring 1 = the 8-neighbor ring, 9 cells total).
    /// Duplicates from polar clamping are removed.
    pub fn neighbors(&self, ring: u32) -> Vec<CellId> {
        let r = ring as i32;
        let mut cells = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dlat in -r..=r {
            for dlon in -r..=r {
                let cell = Self::normalized(self.level, self.lat_q + dlat, self.lon_q + dlon);
                if !cells.contains(&cell) {
                    cells.push(cell);
                }
            }
        }
        cells
    }
}

/// Map a coordinate pair to its cell at the given subdivision level.
/// Deterministic and pure; invalid coordinates fail fast before anything
/// reaches storage.
pub fn cell_of(lat: f64, lon: f64, level: u8) -> Result<CellId, CoordError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CoordError::LatitudeOutOfRange(lat));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(CoordError::LongitudeOutOfRange(lon));
    }

    let scale = CellId::scale(level);
    Ok(CellId::normalized(
        level,
        (lat * scale).floor() as i32,
        (lon * scale).floor() as i32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_of_is_deterministic() {
        let a = cell_of(40.0, -73.9, CELL_LEVEL).unwrap();
        let b = cell_of(40.0, -73.9, CELL_LEVEL).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn same_coordinates_same_cell() {
        // Two users pinging the identical position land in the same shard.
        let a = cell_of(40.0, -73.9, CELL_LEVEL).unwrap();
        let b = cell_of(40.0, -73.9, CELL_LEVEL).unwrap();
        assert_eq!(a.to_string(), b.to_string());

        // Positions inside the same ~1 km square share a cell too.
        let c = cell_of(40.001, -73.899, CELL_LEVEL).unwrap();
        assert_eq!(a, c);
    }

    #[test]
    fn nearby_but_distinct_cells_differ() {
        let a = cell_of(40.00, -73.90, CELL_LEVEL).unwrap();
        let b = cell_of(40.02, -73.90, CELL_LEVEL).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_coordinates_rejected() {
        assert_eq!(
            cell_of(91.0, 0.0, CELL_LEVEL),
            Err(CoordError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            cell_of(0.0, -180.5, CELL_LEVEL),
            Err(CoordError::LongitudeOutOfRange(-180.5))
        );
        assert!(cell_of(f64::NAN, 0.0, CELL_LEVEL).is_err());
        assert!(cell_of(0.0, f64::INFINITY, CELL_LEVEL).is_err());
    }

    #[test]
    fn boundary_coordinates_accepted() {
        assert!(cell_of(90.0, 180.0, CELL_LEVEL).is_ok());
        assert!(cell_of(-90.0, -180.0, CELL_LEVEL).is_ok());
    }

    #[test]
    fn neighbor_ring_has_nine_cells() {
        let cell = cell_of(40.0, -73.9, CELL_LEVEL).unwrap();
        let neighbors = cell.neighbors(1);
        assert_eq!(neighbors.len(), 9);
        assert!(neighbors.contains(&cell));
    }

    #[test]
    fn adjacent_cells_are_mutual_neighbors() {
        let a = cell_of(40.000, -73.900, CELL_LEVEL).unwrap();
        let b = cell_of(40.011, -73.900, CELL_LEVEL).unwrap();
        assert!(a.neighbors(1).contains(&b));
        assert!(b.neighbors(1).contains(&a));
    }

    #[test]
    fn longitude_wraps_at_antimeridian() {
        let west = cell_of(0.0, 179.995, CELL_LEVEL).unwrap();
        let east = cell_of(0.0, -179.995, CELL_LEVEL).unwrap();
        assert!(west.neighbors(1).contains(&east));

        // 180 and -180 are the same meridian.
        let at_180 = cell_of(0.0, 180.0, CELL_LEVEL).unwrap();
        let at_neg_180 = cell_of(0.0, -180.0, CELL_LEVEL).unwrap();
        assert_eq!(at_180, at_neg_180);
    }

    #[test]
    fn polar_ring_deduplicates() {
        let pole = cell_of(90.0, 0.0, CELL_LEVEL).unwrap();
        let neighbors = pole.neighbors(1);
        // Clamped rows collapse — fewer than 9, no duplicates.
        assert!(neighbors.len() < 9);
        let unique: std::collections::HashSet<_> = neighbors.iter().collect();
        assert_eq!(unique.len(), neighbors.len());
    }

    #[test]
    fn wider_ring_grows_quadratically() {
        let cell = cell_of(40.0, -73.9, CELL_LEVEL).unwrap();
        assert_eq!(cell.neighbors(2).len(), 25);
        assert_eq!(cell.neighbors(0).len(), 1);
    }
}
