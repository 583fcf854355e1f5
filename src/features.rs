//! Typed attribute schemas shared by the vectorization and clipping stages

use crate::config::SQ_METERS_PER_ACRE;
use geo::{Area, Euclidean, InterpolatableLine, LineString, Point, Polygon};

/// Outlet point, `ID` numbered 1..n in row-major cell order.
#[derive(Debug, Clone, PartialEq)]
pub struct PourPoint {
    pub id: i32,
    pub location: Point<f64>,
    /// Flow accumulation at the cell (`GRID_CODE`)
    pub accumulation: f64,
}

/// Sub-catchment polygon carrying its watershed label.
#[derive(Debug, Clone, PartialEq)]
pub struct Catchment {
    /// Label of the source raster cell
    pub grid_code: i32,
    /// Watershed number, joins to `ChannelLink::wsno`
    pub wsno: i32,
    pub acres: i64,
    pub polygon: Polygon<f64>,
}

impl Catchment {
    pub fn new(grid_code: i32, polygon: Polygon<f64>) -> Self {
        let mut catchment = Catchment {
            grid_code,
            wsno: grid_code,
            acres: 0,
            polygon,
        };
        catchment.update_acres();
        catchment
    }

    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// Whole acres, the way an integer attribute column stores them.
    pub fn update_acres(&mut self) {
        self.acres = (self.area() / SQ_METERS_PER_ACRE).round() as i64;
    }
}

/// One link of the stream network as written by the toolset.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelLink {
    pub link_no: i64,
    pub ds_link_no: i64,
    pub us_link_no1: i64,
    pub us_link_no2: i64,
    pub strm_order: i64,
    pub length: f64,
    pub wsno: i64,
    pub line: LineString<f64>,
}

impl ChannelLink {
    /// Midpoint along the polyline.
    pub fn center(&self) -> Option<Point<f64>> {
        self.line.point_at_ratio_from_start(&Euclidean, 0.5)
    }
}
