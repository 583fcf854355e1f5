pub mod geotiff;
pub mod shp;
pub mod vector;

use crate::error::Result;
use geo::MultiPolygon;
use std::path::Path;

/// Read the watershed-unit boundary from a shapefile or GeoJSON layer.
pub fn read_boundary(path: &Path) -> Result<(MultiPolygon<f64>, Option<u16>)> {
    let is_shp = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("shp"));
    if is_shp {
        Ok((shp::read_boundary(path)?, None))
    } else {
        vector::read_boundary_geojson(path)
    }
}
