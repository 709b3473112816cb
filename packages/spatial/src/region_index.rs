//! Country tagging by point-in-polygon lookup.

use crop_risk_hazard_models::Centroids;
use geo::{Area, BoundingRect, Contains, MultiPolygon};
use geojson::{Feature, GeoJson};
use rstar::{AABB, RTree, RTreeObject};

use crate::SpatialError;

/// A country polygon stored in the R-tree.
struct RegionEntry {
    region_id: u32,
    area: f64,
    envelope: AABB<[f64; 2]>,
    polygon: MultiPolygon<f64>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree of region polygons keyed by numeric region id.
pub struct RegionIndex {
    regions: RTree<RegionEntry>,
}

impl RegionIndex {
    /// Loads polygons from a `GeoJSON` `FeatureCollection`. Each feature's
    /// region id is read from `id_property`, as a number or numeric string
    /// (e.g. Natural Earth's `ISO_N3`). Features without polygon geometry
    /// are skipped, as are features whose id is not a non-negative integer,
    /// such as Natural Earth's `-99` for disputed areas.
    ///
    /// # Errors
    ///
    /// * [`SpatialError::GeoJson`] if the document does not parse.
    /// * [`SpatialError::Unsupported`] if it is not a `FeatureCollection`.
    /// * [`SpatialError::MissingProperty`] if a polygon feature lacks the id
    ///   property.
    pub fn from_geojson(geojson_str: &str, id_property: &str) -> Result<Self, SpatialError> {
        let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
            return Err(SpatialError::Unsupported {
                message: "expected a FeatureCollection".to_string(),
            });
        };

        let mut entries = Vec::new();
        for (index, feature) in collection.features.into_iter().enumerate() {
            let region_id = region_id(&feature, id_property);
            let Some(polygon) = feature_polygon(feature) else {
                log::warn!("Skipping feature {index} without polygon geometry");
                continue;
            };
            let region_id = match region_id {
                Some(Ok(id)) => id,
                Some(Err(raw)) => {
                    log::warn!("Skipping feature {index} with unusable {id_property} {raw}");
                    continue;
                }
                None => {
                    return Err(SpatialError::MissingProperty {
                        index,
                        property: id_property.to_string(),
                    });
                }
            };

            entries.push(RegionEntry {
                region_id,
                area: polygon.unsigned_area(),
                envelope: compute_envelope(&polygon),
                polygon,
            });
        }

        log::info!("Loaded {} regions into spatial index", entries.len());
        Ok(Self {
            regions: RTree::bulk_load(entries),
        })
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.size()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.size() == 0
    }

    /// Region id of the polygon containing the point.
    ///
    /// Where polygons overlap, the smallest one wins.
    #[must_use]
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<u32> {
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        self.regions
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygon.contains(&point))
            .min_by(|a, b| a.area.total_cmp(&b.area))
            .map(|entry| entry.region_id)
    }

    /// Tags every centroid with the region containing it. With `overwrite`
    /// unset, centroids that already carry a region keep it. Returns the
    /// number of centroids outside every polygon.
    pub fn set_region_ids(&self, centroids: &mut Centroids, overwrite: bool) -> usize {
        let ids: Vec<Option<u32>> = centroids.iter().map(|c| self.lookup(c.lon, c.lat)).collect();
        let outside = ids.iter().filter(|id| id.is_none()).count();
        centroids.set_region_ids(&ids, overwrite);
        log::debug!(
            "Tagged {} of {} centroids with a region",
            ids.len() - outside,
            ids.len()
        );
        outside
    }
}

/// `None` when the property is absent or null, `Err` with the raw value when
/// it is present but not a `u32`.
fn region_id(feature: &Feature, id_property: &str) -> Option<Result<u32, String>> {
    let value = feature.property(id_property).filter(|v| !v.is_null())?;
    Some(
        value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .or_else(|| value.as_str()?.trim().parse().ok())
            .ok_or_else(|| value.to_string()),
    )
}

/// Converts a feature's geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn feature_polygon(feature: Feature) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = feature.geometry?.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}
