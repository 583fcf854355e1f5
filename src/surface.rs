//! Surface conditioning: depression filling, D8 flow direction and the
//! direction-code remap between the engine and toolset conventions.
//!
//! Engine convention (powers of two, clockwise from east):
//! ```text
//!   32  64  128
//!   16   0    1
//!    8   4    2
//! ```
//! Toolset convention (1..8, counter-clockwise from east):
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```

use crate::config::Workspace;
use crate::error::Result;
use crate::io::geotiff::{calculate_statistics, read_raster};
use crate::raster::Raster;
use crate::taudem::{Accumulation, HydroEngine};
use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::Path;
use tracing::info;

/// Elevation increment imposed across filled depressions and flats. Raised
/// cells are also snapped to the 32-bit float grid, where the increment
/// would round away at high elevations.
pub const FILL_EPSILON: f64 = 1e-4;

/// Engine code and (row, col) offset, in engine code order.
const ESRI_D8: [(u8, isize, isize); 8] = [
    (1, 0, 1),
    (2, 1, 1),
    (4, 1, 0),
    (8, 1, -1),
    (16, 0, -1),
    (32, -1, -1),
    (64, -1, 0),
    (128, -1, 1),
];

/// Engine code -> toolset code. Order-preserving around the compass, index-shifted.
pub const DIRECTION_REMAP: [(u8, u8); 8] = [
    (1, 1),
    (128, 2),
    (64, 3),
    (32, 4),
    (16, 5),
    (8, 6),
    (4, 7),
    (2, 8),
];

pub fn esri_to_taudem(code: u8) -> Option<u8> {
    DIRECTION_REMAP
        .iter()
        .find(|(esri, _)| *esri == code)
        .map(|(_, taudem)| *taudem)
}

#[cfg(test)]
fn taudem_to_esri(code: u8) -> Option<u8> {
    DIRECTION_REMAP
        .iter()
        .find(|(_, taudem)| *taudem == code)
        .map(|(esri, _)| *esri)
}

// Next representable f32 toward +inf, for finite input
fn f32_above(z: f32) -> f32 {
    if z == 0.0 {
        f32::from_bits(1)
    } else if z > 0.0 {
        f32::from_bits(z.to_bits() + 1)
    } else {
        f32::from_bits(z.to_bits() - 1)
    }
}

/// `spill + epsilon`, rounded to a 32-bit float that still lies strictly above `spill`.
fn raise_above(spill: f64, epsilon: f64) -> f64 {
    let mut z = (spill + epsilon) as f32;
    while f64::from(z) <= spill {
        z = f32_above(z);
    }
    f64::from(z)
}

#[derive(Debug, Clone, Copy)]
struct Cell {
    elevation: f64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.elevation == other.elevation
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the lowest cell first
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .elevation
            .partial_cmp(&self.elevation)
            .unwrap_or(Ordering::Equal)
    }
}

/// Priority-Flood depression filling (Barnes et al. 2014).
///
/// Cells adjacent to the grid edge or to nodata seed the queue; every other cell
/// ends up at least `epsilon` above the cell it drains into, so the filled
/// surface has a strictly descending path out of every depression and flat.
pub fn fill_depressions(dem: &Raster<f64>, epsilon: f64) -> Raster<f64> {
    let (rows, cols) = dem.shape();
    let mut output = dem.clone();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();

    for row in 0..rows {
        for col in 0..cols {
            if !dem.is_valid(row, col) {
                visited[(row, col)] = true;
                continue;
            }
            let on_edge = row == 0
                || col == 0
                || row == rows - 1
                || col == cols - 1
                || ESRI_D8
                    .iter()
                    .any(|&(_, dr, dc)| dem.value_at(row as isize + dr, col as isize + dc).is_none());
            if on_edge {
                visited[(row, col)] = true;
                heap.push(Cell {
                    elevation: dem.get(row, col),
                    row,
                    col,
                });
            }
        }
    }

    while let Some(cell) = heap.pop() {
        for &(_, dr, dc) in &ESRI_D8 {
            let nr = cell.row as isize + dr;
            let nc = cell.col as isize + dc;
            if nr < 0 || nc < 0 || nr as usize >= rows || nc as usize >= cols {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;
            let floor = if epsilon > 0.0 {
                raise_above(cell.elevation, epsilon)
            } else {
                cell.elevation
            };
            let elevation = dem.get(nr, nc).max(floor);
            output.set(nr, nc, elevation);
            heap.push(Cell {
                elevation,
                row: nr,
                col: nc,
            });
        }
    }

    output
}

/// Steepest-descent D8 direction in engine codes.
///
/// Cells with no lower neighbor that touch the grid edge or nodata drain
/// outward; any other such cell is a pit and gets nodata (0).
pub fn flow_direction_esri(filled: &Raster<f64>) -> Raster<u8> {
    let (rows, cols) = filled.shape();
    let cell_size = filled.cell_size();
    let mut output = filled.like(0u8);
    output.set_nodata(Some(0));

    for row in 0..rows {
        for col in 0..cols {
            if !filled.is_valid(row, col) {
                continue;
            }
            let center = filled.get(row, col);
            let mut best: Option<(u8, f64)> = None;
            let mut outward: Option<(u8, bool)> = None;

            for &(code, dr, dc) in &ESRI_D8 {
                match filled.value_at(row as isize + dr, col as isize + dc) {
                    Some(neighbor) => {
                        let distance = if dr != 0 && dc != 0 {
                            cell_size * std::f64::consts::SQRT_2
                        } else {
                            cell_size
                        };
                        let drop = (center - neighbor) / distance;
                        if drop > 0.0 && best.is_none_or(|(_, d)| drop > d) {
                            best = Some((code, drop));
                        }
                    }
                    None => {
                        // Prefer cardinal exits off the grid
                        let cardinal = dr == 0 || dc == 0;
                        match outward {
                            None => outward = Some((code, cardinal)),
                            Some((_, false)) if cardinal => outward = Some((code, cardinal)),
                            _ => {}
                        }
                    }
                }
            }

            let code = best.map(|(c, _)| c).or(outward.map(|(c, _)| c));
            if let Some(code) = code {
                output.set(row, col, code);
            }
        }
    }

    output
}

/// Re-encode engine direction codes in the toolset convention.
pub fn remap_directions(esri: &Raster<u8>) -> Raster<u8> {
    let mut output = esri.like(0u8);
    output.set_nodata(Some(0));
    for ((row, col), &code) in esri.data().indexed_iter() {
        if let Some(taudem) = esri_to_taudem(code) {
            output.set(row, col, taudem);
        }
    }
    output
}

/// Fill, direction and contributing area for one unit. Returns the flow
/// accumulation grid, which the pour-point stage samples.
pub fn condition_surface(
    engine: &dyn HydroEngine,
    dem: &Path,
    ws: &Workspace,
    fill: bool,
) -> Result<Raster<f64>> {
    info!("Conditioning surface (fill: {})", fill);
    engine.fill_surface(dem, ws, fill)?;
    calculate_statistics(ws.fel())?;

    info!("Computing D8 flow direction");
    engine.flow_direction(ws)?;

    info!("Computing contributing area");
    engine.flow_accumulation(ws, Accumulation::Contributing)?;
    calculate_statistics(ws.ad8())?;

    read_raster(ws.ad8())
}
