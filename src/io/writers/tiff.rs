use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use tiff::encoder::colortype::{ColorType, Gray8, Gray32Float, RGB16};
use tiff::encoder::{Compression, DeflateLevel, TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::info;

use crate::error::{Error, Result};
use crate::io::writers::metadata::gdal_metadata_xml;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

/// GeoKey directory: geographic model, pixel-is-area, EPSG:4326
const WGS84_GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3, // version, revision, minor, key count
    1024, 0, 1, 2, // GTModelType = Geographic
    1025, 0, 1, 1, // GTRasterType = PixelIsArea
    2048, 0, 1, 4326, // GeographicType = WGS 84
];

/// Pixel buffer of a product, row-major, band-interleaved for RGB
#[derive(Debug, Clone, PartialEq)]
pub enum RasterData {
    Gray8(Vec<u8>),
    Rgb16(Vec<u16>),
    Gray32Float(Vec<f32>),
}

impl RasterData {
    pub fn samples_per_pixel(&self) -> usize {
        match self {
            RasterData::Rgb16(_) => 3,
            _ => 1,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RasterData::Gray8(v) => v.len(),
            RasterData::Rgb16(v) => v.len(),
            RasterData::Gray32Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn nodata_string(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        nodata.to_string()
    }
}

fn write_tagged<W, C>(
    encoder: &mut TiffEncoder<W>,
    cols: usize,
    rows: usize,
    data: &[C::Inner],
    geotransform: [f64; 6],
    nodata: &str,
    metadata_xml: &str,
) -> Result<()>
where
    W: Write + Seek,
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(cols as u32, rows as u32)?;
    let dir = image.encoder();
    dir.write_tag(
        Tag::Unknown(MODEL_PIXEL_SCALE),
        &[geotransform[1], -geotransform[5], 0.0][..],
    )?;
    dir.write_tag(
        Tag::Unknown(MODEL_TIEPOINT),
        &[0.0, 0.0, 0.0, geotransform[0], geotransform[3], 0.0][..],
    )?;
    dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &WGS84_GEO_KEYS[..])?;
    dir.write_tag(Tag::Unknown(GDAL_METADATA), metadata_xml)?;
    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata)?;
    image.write_data(data)?;
    Ok(())
}

/// Write a north-up EPSG:4326 GeoTIFF with nodata and dataset metadata
/// stored in the GDAL private tags.
pub fn write_geotiff(
    path: &Path,
    cols: usize,
    rows: usize,
    data: &RasterData,
    geotransform: [f64; 6],
    nodata: f64,
    metadata: &HashMap<String, String>,
) -> Result<()> {
    let expected = cols * rows * data.samples_per_pixel();
    if data.len() != expected {
        return Err(Error::config(format!(
            "raster buffer holds {} samples, expected {} for {}x{}",
            data.len(),
            expected,
            cols,
            rows
        )));
    }
    if cols > u32::MAX as usize || rows > u32::MAX as usize {
        return Err(Error::config(format!("raster of {}x{} is too large", cols, rows)));
    }

    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?
        .with_compression(Compression::Deflate(DeflateLevel::Balanced));
    let nodata = nodata_string(nodata);
    let xml = gdal_metadata_xml(metadata);

    match data {
        RasterData::Gray8(v) => {
            write_tagged::<_, Gray8>(&mut encoder, cols, rows, v, geotransform, &nodata, &xml)?
        }
        RasterData::Rgb16(v) => {
            write_tagged::<_, RGB16>(&mut encoder, cols, rows, v, geotransform, &nodata, &xml)?
        }
        RasterData::Gray32Float(v) => write_tagged::<_, Gray32Float>(
            &mut encoder,
            cols,
            rows,
            v,
            geotransform,
            &nodata,
            &xml,
        )?,
    }

    info!("Saved GeoTIFF {:?} ({}x{})", path, cols, rows);
    Ok(())
}
