//! In-memory R-tree of zone polygons.

use geo::{BoundingRect as _, Intersects as _, MultiPolygon};
use geojson::GeoJson;
use rstar::{AABB, RTree, RTreeObject};
use switchy_database::Database;
use vespawatch_database_models::ZoneGeometryRow;

use crate::ZoneError;

/// A zone polygon stored in the R-tree.
struct ZoneEntry {
    id: i64,
    name: String,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for ZoneEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Point-in-zone lookups over every stored zone.
///
/// A point on a zone boundary belongs to that zone. When zones overlap the
/// lowest ID wins, the same tie-break the database uses.
pub struct ZoneIndex {
    tree: RTree<ZoneEntry>,
}

impl ZoneIndex {
    /// Builds an index from zone rows, skipping unparseable geometries.
    #[must_use]
    pub fn from_rows(rows: &[ZoneGeometryRow]) -> Self {
        let mut entries = Vec::with_capacity(rows.len());

        for row in rows {
            let Some(polygon) = parse_geojson_to_multipolygon(&row.geojson) else {
                log::warn!("Failed to parse GeoJSON for zone {} ({})", row.id, row.name);
                continue;
            };

            entries.push(ZoneEntry {
                id: row.id,
                name: row.name.clone(),
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Loads every zone from the database.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError`] if the query fails.
    pub async fn load(db: &dyn Database) -> Result<Self, ZoneError> {
        let rows = vespawatch_database::zones::list_zone_geometries(db).await?;
        let index = Self::from_rows(&rows);
        log::info!("Loaded {} zones into spatial index", index.len());
        Ok(index)
    }

    /// Number of indexed zones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no zones are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Returns the `(id, name)` of the zone containing the point.
    #[must_use]
    pub fn lookup(&self, longitude: f64, latitude: f64) -> Option<(i64, &str)> {
        let point = geo::Point::new(longitude, latitude);
        let query_env = AABB::from_point([longitude, latitude]);

        self.tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.intersects(&point))
            .min_by_key(|entry| entry.id)
            .map(|entry| (entry.id, entry.name.as_str()))
    }
}

/// Parses a `GeoJSON` geometry string into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
pub(crate) fn parse_geojson_to_multipolygon(geojson_str: &str) -> Option<MultiPolygon<f64>> {
    let geojson: GeoJson = geojson_str.parse().ok()?;
    if let GeoJson::Geometry(geom) = geojson {
        let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
        match geo_geom {
            geo::Geometry::MultiPolygon(mp) => Some(mp),
            geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
            _ => None,
        }
    } else {
        None
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(id: i64, name: &str, x0: f64, y0: f64, size: f64) -> ZoneGeometryRow {
        let (x1, y1) = (x0 + size, y0 + size);
        ZoneGeometryRow {
            id,
            name: name.to_string(),
            geojson: format!(
                r#"{{"type":"Polygon","coordinates":[[[{x0},{y0}],[{x1},{y0}],[{x1},{y1}],[{x0},{y1}],[{x0},{y0}]]]}}"#
            ),
        }
    }

    #[test]
    fn finds_containing_zone() {
        let index = ZoneIndex::from_rows(&[
            square(1, "Gent", 3.6, 51.0, 0.2),
            square(2, "Antwerpen", 4.3, 51.1, 0.2),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(3.7, 51.05), Some((1, "Gent")));
        assert_eq!(index.lookup(4.4, 51.2), Some((2, "Antwerpen")));
        assert_eq!(index.lookup(5.0, 50.0), None);
    }

    #[test]
    fn boundary_points_belong_to_zone() {
        let index = ZoneIndex::from_rows(&[square(1, "A", 0.0, 0.0, 1.0)]);
        assert_eq!(index.lookup(1.0, 0.5), Some((1, "A")));
    }

    #[test]
    fn overlapping_zones_prefer_lowest_id() {
        let index = ZoneIndex::from_rows(&[
            square(5, "Outer", 0.0, 0.0, 10.0),
            square(3, "Inner", 1.0, 1.0, 1.0),
        ]);
        assert_eq!(index.lookup(1.5, 1.5), Some((3, "Inner")));
        assert_eq!(index.lookup(5.0, 5.0), Some((5, "Outer")));
    }

    #[test]
    fn skips_invalid_geometry() {
        let index = ZoneIndex::from_rows(&[ZoneGeometryRow {
            id: 1,
            name: "broken".to_string(),
            geojson: r#"{"type":"Point","coordinates":[1,2]}"#.to_string(),
        }]);
        assert!(index.is_empty());
    }

    #[test]
    fn multipolygons_are_parsed() {
        let mp = parse_geojson_to_multipolygon(
            r#"{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,0]]],[[[2,2],[3,2],[3,3],[2,2]]]]}"#,
        )
        .unwrap();
        assert_eq!(mp.0.len(), 2);
    }
}
