//! Affine georeferencing: geographic coordinates to raster pixels.

use log::{debug, warn};

use crate::record::PolygonRegion;

/// GDAL-ordered geotransform:
/// `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform; `pixel_height` is normally negative.
    pub fn north_up(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        GeoTransform([origin_x, pixel_width, 0.0, origin_y, 0.0, pixel_height])
    }

    pub fn origin(&self) -> (f64, f64) {
        (self.0[0], self.0[3])
    }

    pub fn pixel_size(&self) -> (f64, f64) {
        (self.0[1], self.0[5])
    }

    pub fn is_rotated(&self) -> bool {
        self.0[2] != 0.0 || self.0[4] != 0.0
    }

    /// Warn once per raster if the rotation terms will be ignored.
    pub fn check_north_up(&self, source: &str) {
        if self.is_rotated() {
            warn!(
                "{} has rotation (gt[2]={:.6}, gt[4]={:.6}); rotation terms are ignored",
                source, self.0[2], self.0[4]
            );
        }
    }

    /// Convert geo (x, y) to fractional pixel (x, y), north-up assumption.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (origin_x, origin_y) = self.origin();
        let (pixel_width, pixel_height) = self.pixel_size();
        let px = (x - origin_x) / pixel_width;
        let py = (y - origin_y) / pixel_height;
        debug!(
            "geo_to_pixel: ({:.8}, {:.8}) -> ({:.2}, {:.2})",
            x, y, px, py
        );
        (px, py)
    }

    /// Whole-pixel version of [`geo_to_pixel`](Self::geo_to_pixel); halves
    /// round away from zero. Points outside the raster pass through.
    pub fn to_pixel(&self, x: f64, y: f64) -> (i64, i64) {
        let (px, py) = self.geo_to_pixel(x, y);
        (px.round() as i64, py.round() as i64)
    }

    pub fn project_ring(&self, ring: &[(f64, f64)]) -> PolygonRegion {
        let mut region = PolygonRegion::default();
        for &(x, y) in ring {
            let (px, py) = self.to_pixel(x, y);
            region.push(px, py);
        }
        region
    }
}

/// Vertex ring of the first polygon in a GeoJSON geometry
/// (`coordinates[0]`).
///
/// A multipolygon's first member is a list of rings; when it holds a single
/// ring it is unwrapped one level so the vertices can be iterated directly.
/// Vertices with fewer than two ordinates are dropped.
pub fn first_ring(value: &geojson::Value) -> Option<Vec<(f64, f64)>> {
    let ring = match value {
        geojson::Value::Polygon(rings) => rings.first()?,
        geojson::Value::MultiPolygon(polygons) => {
            let rings = polygons.first()?;
            if rings.len() != 1 {
                debug!("multipolygon member has {} rings, keeping the outer one", rings.len());
            }
            rings.first()?
        }
        _ => return None,
    };

    Some(
        ring.iter()
            .filter_map(|position| match position.as_slice() {
                [x, y, ..] => Some((*x, *y)),
                _ => None,
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_transform_maps_to_expected_pixel() {
        let gt = GeoTransform::north_up(10.0, 20.0, 0.5, -0.5);
        assert_eq!(gt.to_pixel(10.5, 19.0), (1, 2));
    }

    #[test]
    fn points_outside_raster_pass_through() {
        let gt = GeoTransform::north_up(10.0, 20.0, 0.5, -0.5);
        assert_eq!(gt.to_pixel(9.0, 21.0), (-2, -2));
    }

    #[test]
    fn halves_round_away_from_zero() {
        let gt = GeoTransform::north_up(0.0, 0.0, 1.0, -1.0);
        assert_eq!(gt.to_pixel(2.5, 0.5), (3, -1));
        assert_eq!(gt.to_pixel(-2.5, -1.5), (-3, 2));
    }

    #[test]
    fn spacenet_like_transform() {
        // Rio tiles: ~0.5 m pixels expressed in degrees.
        let gt = GeoTransform::north_up(-43.6803, -22.9479, 2.7e-6, -2.7e-6);
        let (px, py) = gt.to_pixel(-43.6803 + 2.7e-6 * 100.0, -22.9479 - 2.7e-6 * 250.0);
        assert_eq!((px, py), (100, 250));
    }

    #[test]
    fn project_ring_keeps_vertex_order() {
        let gt = GeoTransform::north_up(0.0, 10.0, 1.0, -1.0);
        let region = gt.project_ring(&[(0.0, 10.0), (4.0, 10.0), (4.0, 6.0)]);
        assert_eq!(region.all_points_x, vec![0, 4, 4]);
        assert_eq!(region.all_points_y, vec![0, 0, 4]);
    }

    #[test]
    fn first_ring_of_polygon() {
        let value = geojson::Value::Polygon(vec![
            vec![vec![1.0, 2.0, 0.0], vec![3.0, 4.0, 0.0]],
            vec![vec![9.0, 9.0]],
        ]);
        assert_eq!(first_ring(&value), Some(vec![(1.0, 2.0), (3.0, 4.0)]));
    }

    #[test]
    fn single_ring_multipolygon_is_unwrapped() {
        let value = geojson::Value::MultiPolygon(vec![vec![vec![vec![5.0, 6.0], vec![7.0, 8.0]]]]);
        assert_eq!(first_ring(&value), Some(vec![(5.0, 6.0), (7.0, 8.0)]));
    }

    #[test]
    fn non_polygon_geometry_has_no_ring() {
        let value = geojson::Value::Point(vec![1.0, 2.0]);
        assert_eq!(first_ring(&value), None);
    }
}
