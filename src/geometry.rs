//! Native vector engine on `geo`.
//!
//! Polygonization traces the borders of 4-connected regions of equal label
//! in grid-vertex space `(col, row)`, with the region on the right of every
//! directed edge. Shells come out with positive signed area there and holes
//! with negative area; both are oriented the usual way (shells CCW) once
//! mapped to world coordinates.

use crate::catchments::{DissolveOutcome, VectorEngine, VectorizeMode};
use crate::error::Result;
use crate::features::Catchment;
use crate::raster::{GeoTransform, Raster};
use geo::orient::Direction;
use geo::{
    Area, BooleanOps, BoundingRect, Centroid, Contains, Coord, InteriorPoint, Intersects, Line,
    LineString, MultiPolygon, Orient, Polygon, Simplify,
};
use ndarray::Array2;
use std::collections::HashMap;
use tracing::debug;

type Vertex = (i64, i64);

const NO_REGION: u32 = u32::MAX;

/// Douglas-Peucker tolerance in the simplifying mode, in cells.
const SIMPLIFY_CELLS: f64 = 0.5;

/// 4-connected regions of equal value: region id per cell and each region's value.
fn label_regions(labels: &Raster<f64>) -> (Array2<u32>, Vec<f64>) {
    let (rows, cols) = labels.shape();
    let mut region = Array2::from_elem((rows, cols), NO_REGION);
    let mut values = Vec::new();
    let mut stack = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if region[(row, col)] != NO_REGION || !labels.is_valid(row, col) {
                continue;
            }
            let id = values.len() as u32;
            let value = labels.get(row, col);
            values.push(value);
            region[(row, col)] = id;
            stack.push((row, col));

            while let Some((r, c)) = stack.pop() {
                for (dr, dc) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
                    let (nr, nc) = (r as isize + dr, c as isize + dc);
                    if labels.value_at(nr, nc) == Some(value) {
                        let (nr, nc) = (nr as usize, nc as usize);
                        if region[(nr, nc)] == NO_REGION {
                            region[(nr, nc)] = id;
                            stack.push((nr, nc));
                        }
                    }
                }
            }
        }
    }
    (region, values)
}

/// Directed border edges per region.
fn border_edges(region: &Array2<u32>, count: usize) -> Vec<Vec<(Vertex, Vertex)>> {
    let (rows, cols) = region.dim();
    let neighbor = |r: isize, c: isize| {
        if r < 0 || c < 0 || r as usize >= rows || c as usize >= cols {
            NO_REGION
        } else {
            region[(r as usize, c as usize)]
        }
    };

    let mut edges = vec![Vec::new(); count];
    for ((row, col), &id) in region.indexed_iter() {
        if id == NO_REGION {
            continue;
        }
        let (r, c) = (row as i64, col as i64);
        let (ri, ci) = (row as isize, col as isize);
        let list = &mut edges[id as usize];
        if neighbor(ri - 1, ci) != id {
            list.push(((c, r), (c + 1, r)));
        }
        if neighbor(ri, ci + 1) != id {
            list.push(((c + 1, r), (c + 1, r + 1)));
        }
        if neighbor(ri + 1, ci) != id {
            list.push(((c + 1, r + 1), (c, r + 1)));
        }
        if neighbor(ri, ci - 1) != id {
            list.push(((c, r + 1), (c, r)));
        }
    }
    edges
}

fn heading(edge: (Vertex, Vertex)) -> Vertex {
    (edge.1.0 - edge.0.0, edge.1.1 - edge.0.1)
}

/// Link border edges into closed rings. At a vertex where region cells
/// touch only diagonally the ring turns left, so a hole pinched against
/// the shell stays a ring of its own.
fn trace_rings(edges: &[(Vertex, Vertex)]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }
    let is_pinch = |v: &Vertex| outgoing.get(v).is_some_and(|e| e.len() > 1);

    // Start at plain corners so a ring never opens at a pinch vertex
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by_key(|&i| is_pinch(&edges[i].0));

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();
    for start in order {
        if used[start] {
            continue;
        }
        let origin = edges[start].0;
        let mut ring = vec![origin];
        let mut current = start;
        loop {
            used[current] = true;
            let edge = edges[current];
            ring.push(edge.1);
            if edge.1 == origin {
                break;
            }
            let (dx, dy) = heading(edge);
            let left = (dy, -dx);
            let candidates = outgoing.get(&edge.1).map(Vec::as_slice).unwrap_or(&[]);
            let free = candidates.iter().copied().filter(|&i| !used[i]);
            let next = free
                .clone()
                .find(|&i| heading(edges[i]) == left)
                .or_else(|| free.clone().next());
            match next {
                Some(i) => current = i,
                None => break,
            }
        }
        if ring.len() >= 4 && ring.first() == ring.last() {
            rings.push(ring);
        }
    }
    rings
}

/// Drop vertices in the middle of straight runs; input and output are closed.
fn drop_collinear(ring: &[Vertex]) -> Vec<Vertex> {
    let open = &ring[..ring.len() - 1];
    let n = open.len();
    let mut out: Vec<Vertex> = (0..n)
        .filter(|&i| {
            let prev = open[(i + n - 1) % n];
            let cur = open[i];
            let next = open[(i + 1) % n];
            let cross = (cur.0 - prev.0) * (next.1 - cur.1) - (cur.1 - prev.1) * (next.0 - cur.0);
            cross != 0
        })
        .map(|i| open[i])
        .collect();
    if let Some(first) = out.first().copied() {
        out.push(first);
    }
    out
}

/// Twice the signed area in vertex space.
fn vertex_area(ring: &[Vertex]) -> i64 {
    ring.windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum()
}

fn to_world(ring: &[Vertex], transform: &GeoTransform) -> LineString<f64> {
    ring.iter()
        .map(|&(col, row)| transform.vertex(row as usize, col as usize))
        .collect()
}

fn region_polygons(rings: Vec<Vec<Vertex>>, transform: &GeoTransform) -> Vec<Polygon<f64>> {
    let mut shells: Vec<Polygon<f64>> = Vec::new();
    let mut holes: Vec<LineString<f64>> = Vec::new();
    for ring in rings {
        let ring = drop_collinear(&ring);
        if ring.len() < 4 {
            continue;
        }
        let area = vertex_area(&ring);
        if area > 0 {
            shells.push(Polygon::new(to_world(&ring, transform), vec![]));
        } else if area < 0 {
            holes.push(to_world(&ring, transform));
        }
    }

    for hole in holes {
        let probe = Polygon::new(hole.clone(), vec![]).interior_point();
        let target = probe.and_then(|p| {
            shells
                .iter()
                .enumerate()
                .filter(|(_, s)| s.contains(&p))
                .min_by(|a, b| a.1.unsigned_area().total_cmp(&b.1.unsigned_area()))
                .map(|(i, _)| i)
        });
        match target {
            Some(i) => shells[i].interiors_push(hole),
            None => debug!("Hole ring without an enclosing shell dropped"),
        }
    }
    shells
        .into_iter()
        .map(|p| p.orient(Direction::Default))
        .collect()
}

fn simplify_polygon(polygon: &Polygon<f64>, tolerance: f64) -> Polygon<f64> {
    let exterior = polygon.exterior().simplify(&tolerance);
    let interiors: Vec<LineString<f64>> = polygon
        .interiors()
        .iter()
        .map(|ring| ring.simplify(&tolerance))
        .filter(|ring| ring.0.len() >= 4)
        .collect();
    Polygon::new(exterior, interiors)
}

/// One catchment per 4-connected region of equal label; nodata cells are skipped.
pub fn polygonize(labels: &Raster<f64>, mode: VectorizeMode) -> Vec<Catchment> {
    let (region, values) = label_regions(labels);
    let edges = border_edges(&region, values.len());
    let tolerance = labels.cell_size() * SIMPLIFY_CELLS;

    let mut catchments = Vec::new();
    for (id, region_edges) in edges.iter().enumerate() {
        for polygon in region_polygons(trace_rings(region_edges), labels.transform()) {
            let polygon = match mode {
                VectorizeMode::Simplify => simplify_polygon(&polygon, tolerance),
                VectorizeMode::NoSimplify => polygon,
            };
            catchments.push(Catchment::new(values[id] as i32, polygon));
        }
    }
    catchments
}

fn repair_ring(ring: &LineString<f64>) -> Option<LineString<f64>> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len() + 1);
    for c in ring.coords().filter(|c| c.x.is_finite() && c.y.is_finite()) {
        if coords.last() != Some(c) {
            coords.push(*c);
        }
    }
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    if coords.len() < 4 {
        return None;
    }
    let ring = LineString::new(coords);
    if Polygon::new(ring.clone(), vec![]).unsigned_area() == 0.0 {
        return None;
    }
    Some(ring)
}

/// Clean rings and orientation; `None` when nothing with area is left.
pub fn repair_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let exterior = repair_ring(polygon.exterior())?;
    let interiors = polygon.interiors().iter().filter_map(repair_ring).collect();
    Some(Polygon::new(exterior, interiors).orient(Direction::Default))
}

fn ring_is_valid(ring: &LineString<f64>) -> bool {
    ring.0.len() >= 4 && ring.is_closed()
}

fn union_all(mut parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    // Pairwise rounds keep the intermediate unions small
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(vec![]))
}

/// Union of all catchments, exploded into single-part polygons.
pub fn dissolve(catchments: &[Catchment]) -> DissolveOutcome {
    if catchments.is_empty() {
        return DissolveOutcome::EmptyOutput;
    }
    for c in catchments {
        let rings = || std::iter::once(c.polygon.exterior()).chain(c.polygon.interiors());
        if rings().flat_map(|r| r.coords()).any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return DissolveOutcome::OtherError(format!(
                "non-finite coordinate in catchment WSNO {}",
                c.wsno
            ));
        }
        if !rings().all(ring_is_valid) {
            return DissolveOutcome::ExecutionError(format!(
                "invalid ring in catchment WSNO {}",
                c.wsno
            ));
        }
    }

    let merged = union_all(
        catchments
            .iter()
            .map(|c| MultiPolygon::new(vec![c.polygon.clone()]))
            .collect(),
    );
    if merged.0.is_empty() {
        DissolveOutcome::EmptyOutput
    } else {
        DissolveOutcome::Success(merged.0)
    }
}

/// Length of the collinear overlap between two segments.
fn collinear_overlap(a: Line<f64>, b: Line<f64>) -> f64 {
    let len = a.dx().hypot(a.dy());
    if len == 0.0 {
        return 0.0;
    }
    let (ux, uy) = (a.dx() / len, a.dy() / len);
    let tolerance = 1e-6 * len.max(1.0);
    let offset = |c: Coord<f64>| ((c.x - a.start.x) * uy - (c.y - a.start.y) * ux).abs();
    if offset(b.start) > tolerance || offset(b.end) > tolerance {
        return 0.0;
    }
    let along = |c: Coord<f64>| (c.x - a.start.x) * ux + (c.y - a.start.y) * uy;
    let (t0, t1) = (along(b.start), along(b.end));
    (t0.max(t1).min(len) - t0.min(t1).max(0.0)).max(0.0)
}

/// Total border length two polygons share.
pub fn shared_border(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    let touching = match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    };
    if !touching {
        return 0.0;
    }
    let lines = |p: &Polygon<f64>| -> Vec<Line<f64>> {
        std::iter::once(p.exterior())
            .chain(p.interiors())
            .flat_map(|r| r.lines())
            .collect()
    };
    let (la, lb) = (lines(a), lines(b));
    la.iter()
        .map(|&x| lb.iter().map(|&y| collinear_overlap(x, y)).sum::<f64>())
        .sum()
}

/// Merge zero-acre slivers into their largest bordering catchment.
pub fn eliminate_slivers(catchments: Vec<Catchment>) -> Vec<Catchment> {
    let (slivers, mut kept): (Vec<Catchment>, Vec<Catchment>) =
        catchments.into_iter().partition(|c| c.acres == 0);

    for sliver in slivers {
        let target = kept
            .iter()
            .enumerate()
            .filter(|(_, k)| shared_border(&sliver.polygon, &k.polygon) > 0.0)
            .max_by(|a, b| a.1.area().total_cmp(&b.1.area()))
            .map(|(i, _)| i);
        let Some(i) = target else {
            debug!("Sliver WSNO {} has no neighbor, dropped", sliver.wsno);
            continue;
        };
        let merged = MultiPolygon::new(vec![kept[i].polygon.clone()])
            .union(&MultiPolygon::new(vec![sliver.polygon.clone()]));
        let largest = merged
            .0
            .into_iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()));
        if let Some(polygon) = largest {
            debug!("Sliver WSNO {} merged into WSNO {}", sliver.wsno, kept[i].wsno);
            kept[i].polygon = polygon;
            kept[i].update_acres();
        }
    }
    kept
}

/// Catchments whose centroid falls inside (or on) the boundary.
pub fn select_within(catchments: Vec<Catchment>, boundary: &MultiPolygon<f64>) -> Vec<Catchment> {
    catchments
        .into_iter()
        .filter(|c| c.polygon.centroid().is_some_and(|p| boundary.intersects(&p)))
        .collect()
}

/// Derived boundary area over reference boundary area.
pub fn area_ratio(parts: &[Polygon<f64>], boundary: &MultiPolygon<f64>) -> f64 {
    let reference = boundary.unsigned_area();
    if reference == 0.0 {
        return 0.0;
    }
    parts.iter().map(|p| p.unsigned_area()).sum::<f64>() / reference
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoEngine;

impl VectorEngine for GeoEngine {
    fn polygonize(&self, labels: &Raster<f64>, mode: VectorizeMode) -> Result<Vec<Catchment>> {
        Ok(polygonize(labels, mode))
    }

    fn repair(&self, catchments: &mut Vec<Catchment>) -> usize {
        let before = catchments.len();
        let mut changed = 0;
        catchments.retain_mut(|c| match repair_polygon(&c.polygon) {
            Some(polygon) => {
                if polygon != c.polygon {
                    changed += 1;
                    c.polygon = polygon;
                    c.update_acres();
                }
                true
            }
            None => false,
        });
        changed + (before - catchments.len())
    }

    fn eliminate(&self, catchments: Vec<Catchment>) -> Vec<Catchment> {
        eliminate_slivers(catchments)
    }

    fn select_within(&self, catchments: Vec<Catchment>, boundary: &MultiPolygon<f64>) -> Vec<Catchment> {
        select_within(catchments, boundary)
    }

    fn dissolve(&self, catchments: &[Catchment]) -> DissolveOutcome {
        dissolve(catchments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    // 10 m cells, top-left corner at (0, rows * 10)
    fn labels(values: Vec<f64>, rows: usize, cols: usize) -> Raster<f64> {
        let mut r = Raster::from_vec(values, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
        r.set_nodata(Some(-1.0));
        r
    }

    fn area_of(catchments: &[Catchment], code: i32) -> f64 {
        catchments
            .iter()
            .filter(|c| c.grid_code == code)
            .map(|c| c.area())
            .sum()
    }

    fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x0, y: y0), (x: x0 + size, y: y0), (x: x0 + size, y: y0 + size), (x: x0, y: y0 + size)
        ]
    }

    #[test]
    fn halves_become_two_rectangles() {
        #[rustfmt::skip]
        let grid = labels(vec![
            1.0, 1.0, 2.0,
            1.0, 1.0, 2.0,
        ], 2, 3);
        let catchments = polygonize(&grid, VectorizeMode::NoSimplify);
        assert_eq!(catchments.len(), 2);
        assert_eq!(catchments[0].grid_code, 1);
        assert_eq!(catchments[0].wsno, 1);
        assert_eq!(catchments[0].area(), 400.0);
        // Rectangle: four corners plus the closing point
        assert_eq!(catchments[0].polygon.exterior().0.len(), 5);
        assert_eq!(area_of(&catchments, 2), 200.0);
    }

    #[test]
    fn enclosed_label_becomes_a_hole() {
        #[rustfmt::skip]
        let grid = labels(vec![
            1.0, 1.0, 1.0,
            1.0, 2.0, 1.0,
            1.0, 1.0, 1.0,
        ], 3, 3);
        let catchments = polygonize(&grid, VectorizeMode::NoSimplify);
        let outer = catchments.iter().find(|c| c.grid_code == 1).unwrap();
        assert_eq!(outer.polygon.interiors().len(), 1);
        assert_eq!(outer.area(), 800.0);
        assert_eq!(area_of(&catchments, 2), 100.0);
    }

    #[test]
    fn diagonal_cells_are_separate_regions() {
        #[rustfmt::skip]
        let grid = labels(vec![
            1.0, 2.0,
            2.0, 1.0,
        ], 2, 2);
        let catchments = polygonize(&grid, VectorizeMode::NoSimplify);
        assert_eq!(catchments.len(), 4);
        assert!(catchments.iter().all(|c| c.area() == 100.0));
    }

    #[test]
    fn pinched_region_keeps_its_area() {
        // The hole at the center touches the outside corner cell diagonally
        #[rustfmt::skip]
        let grid = labels(vec![
            1.0, 1.0, 3.0,
            1.0, 2.0, 1.0,
            1.0, 1.0, 1.0,
        ], 3, 3);
        let catchments = polygonize(&grid, VectorizeMode::NoSimplify);
        let ring: Vec<_> = catchments.iter().filter(|c| c.grid_code == 1).collect();
        assert_eq!(ring.len(), 1);
        assert_eq!(ring[0].polygon.interiors().len(), 1);
        assert!((area_of(&catchments, 1) - 700.0).abs() < 1e-9);
        assert_eq!(area_of(&catchments, 2), 100.0);
        assert_eq!(area_of(&catchments, 3), 100.0);
    }

    #[test]
    fn nodata_cells_are_not_polygonized() {
        let grid = labels(vec![1.0, -1.0, -1.0, 1.0], 2, 2);
        let catchments = polygonize(&grid, VectorizeMode::NoSimplify);
        assert_eq!(catchments.len(), 2);
        assert_eq!(area_of(&catchments, 1), 200.0);
    }

    #[test]
    fn exteriors_are_counter_clockwise_in_world_coordinates() {
        let grid = labels(vec![5.0; 4], 2, 2);
        let catchments = polygonize(&grid, VectorizeMode::NoSimplify);
        assert!(catchments[0].polygon.signed_area() > 0.0);
        let coords: Vec<_> = catchments[0].polygon.exterior().coords().collect();
        assert!(coords.iter().all(|c| (c.x == 0.0 || c.x == 20.0) && (c.y == 0.0 || c.y == 20.0)));
    }

    #[test]
    fn simplify_cuts_staircase_vertices() {
        // Lower-left triangle of a 6x6 grid: a staircase edge
        let values = (0..36)
            .map(|i| if i % 6 <= i / 6 { 1.0 } else { 2.0 })
            .collect();
        let grid = labels(values, 6, 6);
        let exact = polygonize(&grid, VectorizeMode::NoSimplify);
        let simple = polygonize(&grid, VectorizeMode::Simplify);
        let vertices = |cs: &[Catchment]| -> usize {
            cs.iter().map(|c| c.polygon.exterior().0.len()).sum()
        };
        assert!(vertices(&simple) < vertices(&exact));
        assert_eq!(area_of(&exact, 1), 21.0 * 100.0);
        assert!(area_of(&simple, 1) < area_of(&exact, 1) * 1.2);
    }

    #[test]
    fn repair_closes_dedups_and_drops_degenerate_rings() {
        let mut poly = square(0.0, 0.0, 10.0);
        poly.exterior_mut(|ring| {
            ring.0.insert(1, ring.0[0]);
            ring.0.pop();
        });
        poly.interiors_push(LineString::from(vec![(1.0, 1.0), (2.0, 2.0), (1.0, 1.0)]));
        let repaired = repair_polygon(&poly).unwrap();
        assert!(repaired.exterior().is_closed());
        assert_eq!(repaired.exterior().0.len(), 5);
        assert!(repaired.interiors().is_empty());
        assert!(repaired.signed_area() > 0.0);

        let flat = polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 10.0, y: 0.0)];
        assert!(repair_polygon(&flat).is_none());
    }

    #[test]
    fn engine_repair_counts_fixes_and_removals() {
        let mut broken = Catchment::new(1, square(0.0, 0.0, 100.0));
        broken.polygon.exterior_mut(|ring| ring.0.insert(2, ring.0[1]));
        let flat = Catchment::new(2, polygon![(x: 0.0, y: 0.0), (x: 5.0, y: 0.0), (x: 10.0, y: 0.0)]);
        let good = Catchment::new(3, square(200.0, 0.0, 100.0));
        let mut catchments = vec![broken, flat, good];
        assert_eq!(GeoEngine.repair(&mut catchments), 2);
        assert_eq!(catchments.len(), 2);
        assert_eq!(catchments[0].polygon.exterior().0.len(), 5);
    }

    #[test]
    fn dissolve_merges_neighbors_into_one_part() {
        let catchments = vec![
            Catchment::new(1, square(0.0, 0.0, 100.0)),
            Catchment::new(2, square(100.0, 0.0, 100.0)),
            Catchment::new(3, square(500.0, 0.0, 100.0)),
        ];
        let DissolveOutcome::Success(parts) = dissolve(&catchments) else {
            panic!("dissolve failed");
        };
        assert_eq!(parts.len(), 2);
        let total: f64 = parts.iter().map(|p| p.unsigned_area()).sum();
        assert!((total - 30000.0).abs() < 1e-6);
    }

    #[test]
    fn dissolve_outcomes_are_typed() {
        assert_eq!(dissolve(&[]), DissolveOutcome::EmptyOutput);

        let mut open = Catchment::new(1, square(0.0, 0.0, 100.0));
        open.polygon.exterior_mut(|ring| {
            ring.0.truncate(2);
        });
        assert!(matches!(dissolve(&[open]), DissolveOutcome::ExecutionError(_)));

        let mut nan = Catchment::new(1, square(0.0, 0.0, 100.0));
        nan.polygon.exterior_mut(|ring| ring.0[1].x = f64::NAN);
        assert!(matches!(dissolve(&[nan]), DissolveOutcome::OtherError(_)));
    }

    #[test]
    fn shared_border_measures_collinear_overlap() {
        let a = square(0.0, 0.0, 100.0);
        let b = square(100.0, 50.0, 100.0);
        assert!((shared_border(&a, &b) - 50.0).abs() < 1e-9);
        assert_eq!(shared_border(&a, &square(300.0, 0.0, 10.0)), 0.0);
    }

    #[test]
    fn slivers_merge_into_the_largest_neighbor() {
        let small = Catchment::new(1, square(0.0, 0.0, 100.0));
        let large = Catchment::new(2, square(0.0, 100.0, 300.0));
        // 10 m x 10 m is 0.02 acres, touching both neighbors
        let sliver = Catchment::new(3, square(100.0, 90.0, 10.0));
        let island = Catchment::new(4, square(900.0, 900.0, 10.0));
        assert_eq!(sliver.acres, 0);

        let kept = eliminate_slivers(vec![small, large, sliver, island]);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|c| c.acres > 0));
        let grown = kept.iter().find(|c| c.wsno == 2).unwrap();
        assert!((grown.area() - (90000.0 + 100.0)).abs() < 1e-6);
    }

    #[test]
    fn selection_keeps_catchments_centered_inside() {
        let boundary = MultiPolygon::new(vec![square(0.0, 0.0, 200.0)]);
        let inside = Catchment::new(1, square(0.0, 0.0, 100.0));
        // Overlaps the boundary but centered outside it
        let straddling = Catchment::new(2, square(150.0, 0.0, 200.0));
        let kept = select_within(vec![inside, straddling], &boundary);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].wsno, 1);
    }

    #[test]
    fn area_ratio_compares_true_areas() {
        let boundary = MultiPolygon::new(vec![square(0.0, 0.0, 100.0)]);
        let parts = vec![square(0.0, 0.0, 70.0), square(0.0, 70.0, 10.0)];
        assert!((area_ratio(&parts, &boundary) - 0.5).abs() < 1e-12);
        assert_eq!(area_ratio(&parts, &MultiPolygon::new(vec![])), 0.0);
    }
}
