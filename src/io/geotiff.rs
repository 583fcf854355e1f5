//! GeoTIFF reading/writing on the pure-Rust `tiff` crate.
//!
//! Only what the toolset exchange needs: north-up pixel scale and tiepoint,
//! the GDAL nodata tag and the EPSG code from the GeoKey directory.
//! Output is always uncompressed 32-bit float.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, RasterStats};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::Gray32Float;
use tiff::tags::Tag;
use tracing::{debug, warn};

const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

pub const DEFAULT_NODATA: f64 = -3.4028234663852886e38;

pub fn read_raster<T: RasterElement, P: AsRef<Path>>(path: P) -> Result<Raster<T>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let values: Vec<f64> = match decoder.read_image()? {
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        _ => {
            return Err(Error::InvalidRaster {
                path: path.to_path_buf(),
                reason: "unsupported pixel format".into(),
            });
        }
    };
    if values.len() != rows * cols {
        return Err(Error::InvalidRaster {
            path: path.to_path_buf(),
            reason: format!("expected {} cells, decoded {}", rows * cols, values.len()),
        });
    }

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok());

    let data = values
        .into_iter()
        .map(|v| {
            if v.is_nan() {
                nodata.map(T::from_f64).unwrap_or_else(|| T::from_f64(f64::NAN))
            } else {
                T::from_f64(v)
            }
        })
        .collect();
    let mut raster = Raster::from_vec(data, rows, cols)?;
    raster.set_nodata(nodata.map(T::from_f64));

    if let Some(transform) = read_transform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_epsg(read_epsg(&mut decoder));

    Ok(raster)
}

fn read_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;
    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }
    // tiepoint: [I, J, K, X, Y, Z]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u16> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let entries: Vec<&[u16]> = keys[4..].chunks(4).take(count).collect();
    // Inline (location 0) values only; projected wins over geographic.
    [PROJECTED_CS_TYPE_KEY, GEOGRAPHIC_TYPE_KEY]
        .iter()
        .find_map(|wanted| {
            entries
                .iter()
                .find(|e| e.len() == 4 && e[0] == *wanted && e[1] == 0)
                .map(|e| e[3])
        })
        .filter(|code| *code != 0 && *code != 32767)
}

pub fn write_raster<T: RasterElement, P: AsRef<Path>>(raster: &Raster<T>, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let (rows, cols) = raster.shape();

    let nodata = raster
        .nodata()
        .map(RasterElement::to_f64)
        .filter(|v| !v.is_nan())
        .unwrap_or(DEFAULT_NODATA);

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| {
            if raster.is_nodata_value(v) {
                nodata as f32
            } else {
                v.to_f64() as f32
            }
        })
        .collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;
    let gt = raster.transform();

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;

    // GTModelType = projected, GTRasterType = PixelIsArea, then the EPSG code if known.
    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    if let Some(epsg) = raster.epsg() {
        geokeys[3] = 3;
        geokeys.extend_from_slice(&[PROJECTED_CS_TYPE_KEY, 0, 1, epsg]);
    }
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;
    image
        .encoder()
        .write_tag(Tag::GdalNodata, nodata.to_string().as_str())?;

    image.write_data(&data)?;
    Ok(())
}

/// Recompute and log summary statistics for a raster on disk.
pub fn calculate_statistics<P: AsRef<Path>>(path: P) -> Result<Option<RasterStats>> {
    let path = path.as_ref();
    let raster: Raster<f64> = read_raster(path)?;
    let stats = raster.statistics();
    match &stats {
        Some(s) => debug!(
            "{}: min {:.3} max {:.3} mean {:.3} stddev {:.3} ({} cells)",
            path.display(),
            s.min,
            s.max,
            s.mean,
            s.stddev,
            s.count
        ),
        None => warn!("{}: no valid cells", path.display()),
    }
    Ok(stats)
}
