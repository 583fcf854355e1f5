//! GeoJSON vector store for the persisted outputs and the input boundary

use crate::error::{Error, Result};
use crate::features::{Catchment, ChannelLink};
use geo::{Geometry, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde_json::json;
use std::fs;
use std::path::Path;

fn feature(value: geojson::Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(value)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn write_collection(path: &Path, features: Vec<Feature>, epsg: Option<u16>) -> Result<()> {
    let foreign_members = epsg.map(|code| {
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            json!({
                "type": "name",
                "properties": { "name": format!("urn:ogc:def:crs:EPSG::{}", code) }
            }),
        );
        members
    });
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, GeoJson::FeatureCollection(collection).to_string())?;
    Ok(())
}

pub fn write_catchments(path: &Path, catchments: &[Catchment], epsg: Option<u16>) -> Result<()> {
    let features = catchments
        .iter()
        .map(|c| {
            let mut props = JsonObject::new();
            props.insert("GRIDCODE".to_string(), json!(c.grid_code));
            props.insert("WSNO".to_string(), json!(c.wsno));
            props.insert("Acres".to_string(), json!(c.acres));
            feature(geojson::Value::from(&c.polygon), props)
        })
        .collect();
    write_collection(path, features, epsg)
}

pub fn write_boundary(path: &Path, parts: &[Polygon<f64>], epsg: Option<u16>) -> Result<()> {
    let features = parts
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut props = JsonObject::new();
            props.insert("OBJECTID".to_string(), json!(i + 1));
            feature(geojson::Value::from(p), props)
        })
        .collect();
    write_collection(path, features, epsg)
}

pub fn write_channels(path: &Path, links: &[ChannelLink], epsg: Option<u16>) -> Result<()> {
    let features = links
        .iter()
        .map(|l| {
            let mut props = JsonObject::new();
            props.insert("LINKNO".to_string(), json!(l.link_no));
            props.insert("DSLINKNO".to_string(), json!(l.ds_link_no));
            props.insert("USLINKNO1".to_string(), json!(l.us_link_no1));
            props.insert("USLINKNO2".to_string(), json!(l.us_link_no2));
            props.insert("strmOrder".to_string(), json!(l.strm_order));
            props.insert("Length".to_string(), json!(l.length));
            props.insert("WSNO".to_string(), json!(l.wsno));
            feature(geojson::Value::from(&l.line), props)
        })
        .collect();
    write_collection(path, features, epsg)
}

fn epsg_from_members(members: Option<&JsonObject>) -> Option<u16> {
    let name = members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    let digits: String = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

fn collect_polygons(path: &Path, value: geojson::Value, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    let geometry = Geometry::<f64>::try_from(value)?;
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        other => {
            return Err(Error::InvalidVector {
                path: path.to_path_buf(),
                reason: format!("expected polygons, found {}", geometry_kind(&other)),
            });
        }
    }
    Ok(())
}

fn geometry_kind(g: &Geometry<f64>) -> &'static str {
    match g {
        Geometry::Point(_) | Geometry::MultiPoint(_) => "points",
        Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => "lines",
        _ => "other geometry",
    }
}

/// Read a boundary polygon layer from GeoJSON.
pub fn read_boundary_geojson(path: &Path) -> Result<(MultiPolygon<f64>, Option<u16>)> {
    let text = fs::read_to_string(path)?;
    let mut polygons = Vec::new();
    let epsg = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => {
            for f in fc.features {
                if let Some(g) = f.geometry {
                    collect_polygons(path, g.value, &mut polygons)?;
                }
            }
            epsg_from_members(fc.foreign_members.as_ref())
        }
        GeoJson::Feature(f) => {
            if let Some(g) = f.geometry {
                collect_polygons(path, g.value, &mut polygons)?;
            }
            epsg_from_members(f.foreign_members.as_ref())
        }
        GeoJson::Geometry(g) => {
            collect_polygons(path, g.value, &mut polygons)?;
            None
        }
    };
    Ok((MultiPolygon::new(polygons), epsg))
}
