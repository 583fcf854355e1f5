//! Georeferenced grid shared by every pipeline stage

use crate::error::{Error, Result};
use geo::Coord;
use ndarray::Array2;
use std::fmt::Debug;

/// Cell value types a [`Raster`] can hold.
pub trait RasterElement: Copy + PartialEq + Default + Debug {
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

impl RasterElement for f64 {
    fn to_f64(self) -> f64 {
        self
    }
    fn from_f64(v: f64) -> Self {
        v
    }
}

impl RasterElement for i32 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as i32
    }
}

impl RasterElement for u8 {
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_f64(v: f64) -> Self {
        v as u8
    }
}

/// North-up affine transform: `x = origin_x + col * pixel_width`,
/// `y = origin_y + row * pixel_height` (pixel_height negative).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// World coordinate of the grid vertex at (row, col); vertices run 0..=rows, 0..=cols.
    pub fn vertex(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.origin_x + col as f64 * self.pixel_width,
            y: self.origin_y + row as f64 * self.pixel_height,
        }
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            y: self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        }
    }

    /// Cell containing the world point, unbounded (may be negative or past the grid).
    pub fn cell_of(&self, x: f64, y: f64) -> (isize, isize) {
        let col = ((x - self.origin_x) / self.pixel_width).floor() as isize;
        let row = ((y - self.origin_y) / self.pixel_height).floor() as isize;
        (row, col)
    }
}

/// Summary statistics over the valid cells of a raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation
    pub stddev: f64,
}

impl RasterStats {
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            sum_sq += v * v;
            min = min.min(v);
            max = max.max(v);
        }
        if count == 0 {
            return None;
        }
        let mean = sum / count as f64;
        let variance = (sum_sq / count as f64 - mean * mean).max(0.0);
        Some(Self {
            count,
            min,
            max,
            mean,
            stddev: variance.sqrt(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    nodata: Option<T>,
    epsg: Option<u16>,
}

impl<T: RasterElement> Raster<T> {
    #[cfg(test)]
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
            nodata: None,
            epsg: None,
        }
    }

    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        let len = data.len();
        let data = Array2::from_shape_vec((rows, cols), data).map_err(|_| {
            Error::Config(format!("{} values do not fill a {}x{} grid", len, rows, cols))
        })?;
        Ok(Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
            epsg: None,
        })
    }

    /// New raster on the same grid and spatial reference as `self`.
    pub fn like<U: RasterElement>(&self, fill: U) -> Raster<U> {
        Raster {
            data: Array2::from_elem(self.data.dim(), fill),
            transform: self.transform,
            nodata: None,
            epsg: self.epsg,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[(row, col)] = value;
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    pub fn epsg(&self) -> Option<u16> {
        self.epsg
    }

    pub fn set_epsg(&mut self, epsg: Option<u16>) {
        self.epsg = epsg;
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    pub fn is_nodata_value(&self, value: T) -> bool {
        value.to_f64().is_nan() || self.nodata.is_some_and(|nd| nd == value)
    }

    pub fn is_valid(&self, row: usize, col: usize) -> bool {
        !self.is_nodata_value(self.data[(row, col)])
    }

    /// Bounds-checked signed lookup, `None` off the grid or on nodata.
    pub fn value_at(&self, row: isize, col: isize) -> Option<T> {
        let (rows, cols) = self.shape();
        if row < 0 || col < 0 || row as usize >= rows || col as usize >= cols {
            return None;
        }
        let v = self.data[(row as usize, col as usize)];
        (!self.is_nodata_value(v)).then_some(v)
    }

    pub fn statistics(&self) -> Option<RasterStats> {
        RasterStats::from_values(
            self.data
                .iter()
                .filter(|v| !self.is_nodata_value(**v))
                .map(|v| v.to_f64()),
        )
    }
}
