//! Outlet selection along the watershed boundary line

use crate::config::{POUR_POINT_SIGMAS, Workspace};
use crate::error::{Error, Result};
use crate::features::PourPoint;
use crate::io::shp::write_pour_points;
use crate::raster::{GeoTransform, Raster, RasterStats};
use geo::{Coord, LineString, MultiPolygon, Point};
use ndarray::Array2;
use tracing::{debug, info};

/// Mark every cell crossed by the boundary rings (exterior and holes).
pub fn rasterize_boundary(
    boundary: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Array2<bool> {
    let mut mask = Array2::from_elem((rows, cols), false);
    let step = transform.cell_size() / 4.0;

    let mut burn = |c: Coord<f64>| {
        let (row, col) = transform.cell_of(c.x, c.y);
        if row >= 0 && col >= 0 && (row as usize) < rows && (col as usize) < cols {
            mask[(row as usize, col as usize)] = true;
        }
    };

    let rings: Vec<&LineString<f64>> = boundary
        .iter()
        .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
        .collect();
    for ring in rings {
        for line in ring.lines() {
            let length = (line.dx() * line.dx() + line.dy() * line.dy()).sqrt();
            let samples = (length / step).ceil().max(1.0) as usize;
            for i in 0..=samples {
                let t = i as f64 / samples as f64;
                burn(Coord {
                    x: line.start.x + t * line.dx(),
                    y: line.start.y + t * line.dy(),
                });
            }
        }
    }
    mask
}

/// Cells on the boundary line whose accumulation reaches
/// `trunc(mean + 3 * stddev)` of the accumulation sampled along that line.
pub fn select_pour_points(
    accumulation: &Raster<f64>,
    boundary: &MultiPolygon<f64>,
) -> Result<Vec<PourPoint>> {
    let (rows, cols) = accumulation.shape();
    let mask = rasterize_boundary(boundary, accumulation.transform(), rows, cols);

    let on_line = |row: usize, col: usize| mask[(row, col)] && accumulation.is_valid(row, col);
    let stats = RasterStats::from_values(
        mask.indexed_iter()
            .filter(|((r, c), _)| on_line(*r, *c))
            .map(|((r, c), _)| accumulation.get(r, c)),
    );
    let Some(stats) = stats else {
        return Err(Error::NoPourPoints {
            cutoff: 0,
            cells: 0,
            mean: 0.0,
            stddev: 0.0,
        });
    };

    let cutoff = (stats.mean + POUR_POINT_SIGMAS * stats.stddev).trunc() as i64;
    debug!(
        "Boundary accumulation: {} cells, mean {:.2}, stddev {:.2}, cut-off {}",
        stats.count, stats.mean, stats.stddev, cutoff
    );

    let mut points = Vec::new();
    for row in 0..rows {
        for col in 0..cols {
            let value = accumulation.get(row, col);
            if on_line(row, col) && value >= cutoff as f64 {
                let center = accumulation.transform().cell_center(row, col);
                points.push(PourPoint {
                    id: points.len() as i32 + 1,
                    location: Point::from(center),
                    accumulation: value,
                });
            }
        }
    }

    if points.is_empty() {
        return Err(Error::NoPourPoints {
            cutoff,
            cells: stats.count,
            mean: stats.mean,
            stddev: stats.stddev,
        });
    }
    Ok(points)
}

/// Select the outlets and write them where the toolset expects them.
pub fn extract_pour_points(
    accumulation: &Raster<f64>,
    boundary: &MultiPolygon<f64>,
    ws: &Workspace,
) -> Result<Vec<PourPoint>> {
    info!("Extracting pour points");
    let points = select_pour_points(accumulation, boundary)?;
    for p in &points {
        debug!(
            "Pour point {} at ({:.2}, {:.2}), accumulation {}",
            p.id,
            p.location.x(),
            p.location.y(),
            p.accumulation
        );
    }
    write_pour_points(&ws.pour_points(), &points)?;
    info!("{} pour point(s)", points.len());
    Ok(points)
}
