//! Shapefile exchange with the hydrology toolset (outlets in, network out)

use crate::error::{Error, Result};
use crate::features::{ChannelLink, PourPoint};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::PolygonRing;
use std::path::Path;

fn field_name(name: &str) -> Result<FieldName> {
    FieldName::try_from(name)
        .map_err(|e| Error::Config(format!("invalid field name {}: {:?}", name, e)))
}

fn numeric(record: &Record, name: &str) -> Option<f64> {
    match record.get(name)? {
        FieldValue::Numeric(v) => *v,
        FieldValue::Integer(v) => Some(*v as f64),
        FieldValue::Double(v) => Some(*v),
        FieldValue::Float(v) => v.map(f64::from),
        _ => None,
    }
}

pub fn write_pour_points(path: &Path, points: &[PourPoint]) -> Result<()> {
    let table = TableWriterBuilder::new()
        .add_numeric_field(field_name("ID")?, 10, 0)
        .add_numeric_field(field_name("GRID_CODE")?, 18, 3);
    let mut writer = shapefile::Writer::from_path(path, table)?;
    for p in points {
        let mut record = Record::default();
        record.insert("ID".to_string(), FieldValue::Numeric(Some(p.id as f64)));
        record.insert(
            "GRID_CODE".to_string(),
            FieldValue::Numeric(Some(p.accumulation)),
        );
        writer.write_shape_and_record(&shapefile::Point::new(p.location.x(), p.location.y()), &record)?;
    }
    Ok(())
}

/// Read the network polylines the toolset writes, parts joined end to end.
pub fn read_network(path: &Path) -> Result<Vec<ChannelLink>> {
    let rows = shapefile::read_as::<_, shapefile::Polyline, Record>(path)?;
    let mut links = Vec::with_capacity(rows.len());
    for (polyline, record) in rows {
        let coords: Vec<Coord<f64>> = polyline
            .parts()
            .iter()
            .flatten()
            .map(|p| Coord { x: p.x, y: p.y })
            .collect();
        let field = |name: &str| numeric(&record, name).map(|v| v as i64).unwrap_or(-1);
        let link_no = numeric(&record, "LINKNO").ok_or_else(|| Error::InvalidVector {
            path: path.to_path_buf(),
            reason: "network record without LINKNO".into(),
        })?;
        links.push(ChannelLink {
            link_no: link_no as i64,
            ds_link_no: field("DSLINKNO"),
            us_link_no1: field("USLINKNO1"),
            us_link_no2: field("USLINKNO2"),
            strm_order: field("strmOrder"),
            length: numeric(&record, "Length").unwrap_or(0.0),
            wsno: field("WSNO"),
            line: LineString::new(coords),
        });
    }
    Ok(links)
}

/// Network layer in the toolset's schema; the pipeline only reads these.
#[cfg(test)]
pub fn write_network(path: &Path, links: &[ChannelLink]) -> Result<()> {
    let mut table = TableWriterBuilder::new();
    for name in ["LINKNO", "DSLINKNO", "USLINKNO1", "USLINKNO2", "strmOrder", "WSNO"] {
        table = table.add_numeric_field(field_name(name)?, 10, 0);
    }
    table = table.add_numeric_field(field_name("Length")?, 18, 3);
    let mut writer = shapefile::Writer::from_path(path, table)?;
    for link in links {
        let mut record = Record::default();
        for (name, value) in [
            ("LINKNO", link.link_no),
            ("DSLINKNO", link.ds_link_no),
            ("USLINKNO1", link.us_link_no1),
            ("USLINKNO2", link.us_link_no2),
            ("strmOrder", link.strm_order),
            ("WSNO", link.wsno),
        ] {
            record.insert(name.to_string(), FieldValue::Numeric(Some(value as f64)));
        }
        record.insert("Length".to_string(), FieldValue::Numeric(Some(link.length)));
        let points = link
            .line
            .coords()
            .map(|c| shapefile::Point::new(c.x, c.y))
            .collect();
        writer.write_shape_and_record(&shapefile::Polyline::new(points), &record)?;
    }
    Ok(())
}

/// Read a polygon layer; inner rings attach to the outer ring preceding them.
pub fn read_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    let shapes = shapefile::read_shapes_as::<_, shapefile::Polygon>(path)?;
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for shape in shapes {
        for ring in shape.rings() {
            let coords: LineString<f64> = ring
                .points()
                .iter()
                .map(|p| Coord { x: p.x, y: p.y })
                .collect();
            match ring {
                PolygonRing::Outer(_) => polygons.push(Polygon::new(coords, vec![])),
                PolygonRing::Inner(_) => match polygons.last_mut() {
                    Some(outer) => outer.interiors_push(coords),
                    None => {
                        return Err(Error::InvalidVector {
                            path: path.to_path_buf(),
                            reason: "inner ring before any outer ring".into(),
                        });
                    }
                },
            }
        }
    }
    Ok(MultiPolygon::new(polygons))
}
