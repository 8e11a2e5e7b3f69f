use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use tiff::{
    decoder::{Decoder, DecodingResult, Limits},
    tags::Tag,
    ColorType,
};

use crate::{Crs, GeoTransform, Georeference, RawTile, TerrainError};

// GeoTIFF key ids, see OGC GeoTIFF 1.1 section 7.4
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_POINT: u16 = 2;

/// Reads band 1 of a GeoTIFF along with its georeferencing. A file without
/// geo tags still loads, with `georef` left empty.
pub fn read_tile(path: &Path) -> Result<RawTile, TerrainError> {
    let name = path.display().to_string();
    let load_err = |reason: String| TerrainError::Load {
        path: name.clone(),
        reason,
    };

    let file = File::open(path).map_err(|err| load_err(err.to_string()))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|err| load_err(err.to_string()))?
        .with_limits(Limits::unlimited());

    let (cols, rows) = decoder
        .dimensions()
        .map_err(|err| load_err(err.to_string()))?;

    match decoder.colortype().map_err(|err| load_err(err.to_string()))? {
        ColorType::Gray(_) => {}
        other => return Err(load_err(format!("expected a single band raster, found {other:?}"))),
    }

    let keys = read_geo_keys(&mut decoder).map_err(load_err)?;
    let transform = read_transform(&mut decoder, &keys).map_err(load_err)?;
    let crs = read_crs(&keys).map_err(load_err)?;

    let nodata = match decoder
        .find_tag(Tag::GdalNodata)
        .map_err(|err| load_err(err.to_string()))?
    {
        Some(value) => {
            let text = value.into_string().map_err(|err| load_err(err.to_string()))?;
            let text = text.trim_matches(char::from(0)).trim();
            Some(
                text.parse::<f64>()
                    .map_err(|_| load_err(format!("invalid nodata value {text:?}")))?,
            )
        }
        None => None,
    };

    let elevations = match decoder
        .read_image()
        .map_err(|err| load_err(err.to_string()))?
    {
        DecodingResult::U8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::U64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I16(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::I64(data) => data.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(data) => data.into_iter().map(f64::from).collect(),
        DecodingResult::F64(data) => data,
        #[allow(unreachable_patterns)]
        _ => return Err(load_err("unsupported sample format".into())),
    };

    let georef = match (crs, transform) {
        (Some(crs), Some(transform)) => Some(Georeference { crs, transform }),
        _ => None,
    };

    Ok(RawTile {
        name,
        georef,
        cols: cols as usize,
        rows: rows as usize,
        elevations,
        nodata,
    })
}

type TiffDecoder = Decoder<BufReader<File>>;

/// Inline geo keys only; keys stored in the double or ascii params tags are
/// not needed to identify the supported reference systems.
fn read_geo_keys(decoder: &mut TiffDecoder) -> Result<BTreeMap<u16, u16>, String> {
    let directory = match decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .map_err(|err| err.to_string())?
    {
        Some(value) => value
            .into_u32_vec()
            .map_err(|err| err.to_string())?
            .into_iter()
            .map(|v| u16::try_from(v).map_err(|_| format!("geo key value {v} out of range")))
            .collect::<Result<Vec<_>, _>>()?,
        None => return Ok(BTreeMap::new()),
    };

    parse_geo_keys(&directory)
}

fn parse_geo_keys(directory: &[u16]) -> Result<BTreeMap<u16, u16>, String> {
    let (header, entries) = directory
        .split_at_checked(4)
        .ok_or_else(|| "truncated geo key directory".to_owned())?;

    let count = header[3] as usize;
    if entries.len() < count * 4 {
        return Err("truncated geo key directory".into());
    }

    Ok(entries
        .chunks_exact(4)
        .take(count)
        .filter(|entry| entry[1] == 0)
        .map(|entry| (entry[0], entry[3]))
        .collect())
}

fn read_transform(
    decoder: &mut TiffDecoder,
    keys: &BTreeMap<u16, u16>,
) -> Result<Option<GeoTransform>, String> {
    let mut read_f64s = |tag| -> Result<Option<Vec<f64>>, String> {
        decoder
            .find_tag(tag)
            .map_err(|err| err.to_string())?
            .map(|value| value.into_f64_vec().map_err(|err| err.to_string()))
            .transpose()
    };

    let transform = if let Some(matrix) = read_f64s(Tag::ModelTransformationTag)? {
        if matrix.len() < 8 {
            return Err("model transformation needs at least 8 values".into());
        }

        let gt = [matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5]];
        let transform = GeoTransform::from_gdal(gt)
            .ok_or_else(|| "rotated rasters are not supported".to_owned())?;
        Some(transform)
    } else {
        match (
            read_f64s(Tag::ModelTiepointTag)?,
            read_f64s(Tag::ModelPixelScaleTag)?,
        ) {
            (Some(tiepoint), Some(scale)) if tiepoint.len() >= 6 && scale.len() >= 2 => {
                let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
                let (sx, sy) = (scale[0], scale[1]);

                Some(GeoTransform {
                    x_origin: x - i * sx,
                    pixel_width: sx,
                    y_origin: y + j * sy,
                    pixel_height: sy,
                })
            }
            (None, None) => None,
            _ => return Err("incomplete tiepoint or pixel scale".into()),
        }
    };

    // shift point-referenced rasters so the origin is the corner of the first
    // cell, like GDAL does
    Ok(transform.map(|t| {
        if keys.get(&GT_RASTER_TYPE) == Some(&RASTER_PIXEL_IS_POINT) {
            GeoTransform {
                x_origin: t.x_origin - t.pixel_width / 2.,
                y_origin: t.y_origin + t.pixel_height / 2.,
                ..t
            }
        } else {
            t
        }
    }))
}

fn read_crs(keys: &BTreeMap<u16, u16>) -> Result<Option<Crs>, String> {
    let model = keys.get(&GT_MODEL_TYPE).copied();
    let projected = keys.get(&PROJECTED_CS_TYPE).copied();
    let geographic = keys.get(&GEOGRAPHIC_TYPE).copied();

    let code = match (model, projected, geographic) {
        (Some(MODEL_TYPE_PROJECTED), Some(code), _) | (None, Some(code), _) => code,
        (Some(MODEL_TYPE_PROJECTED), None, _) => {
            return Err("projected raster without a projected reference system".into())
        }
        (Some(MODEL_TYPE_GEOGRAPHIC), _, Some(code)) | (None, None, Some(code)) => code,
        (Some(MODEL_TYPE_GEOGRAPHIC), _, None) => 4326,
        (None, None, None) => return Ok(None),
        (Some(other), _, _) => return Err(format!("unsupported raster model type {other}")),
    };

    Crs::from_epsg(code)
        .map(Some)
        .ok_or_else(|| format!("unsupported reference system EPSG:{code}"))
}

#[cfg(test)]
mod tests {
    use tiff::encoder::{colortype, TiffEncoder};

    use super::*;

    fn write_tile(
        path: &Path,
        geo_keys: &[u16],
        tiepoint: &[f64],
        scale: &[f64],
        data: &[f32],
        nodata: Option<&str>,
    ) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<colortype::Gray32Float>(4, 2).unwrap();

        image.encoder().write_tag(Tag::ModelPixelScaleTag, scale).unwrap();
        image.encoder().write_tag(Tag::ModelTiepointTag, tiepoint).unwrap();
        if !geo_keys.is_empty() {
            image.encoder().write_tag(Tag::GeoKeyDirectoryTag, geo_keys).unwrap();
        }
        if let Some(nodata) = nodata {
            image.encoder().write_tag(Tag::GdalNodata, nodata).unwrap();
        }

        image.write_data(data).unwrap();
    }

    const DATA: [f32; 8] = [1., 2., 3., 4., 5., 6., 7., -9999.];

    #[test]
    fn reads_geographic_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dem.tif");

        write_tile(
            &path,
            &[1, 1, 0, 2, GT_MODEL_TYPE, 0, 1, 2, GEOGRAPHIC_TYPE, 0, 1, 4326],
            &[0., 0., 0., 20., 11., 0.],
            &[0.25, 0.5, 0.],
            &DATA,
            Some("-9999"),
        );

        let raw = read_tile(&path).unwrap();
        assert_eq!((raw.cols, raw.rows), (4, 2));
        assert_eq!(raw.nodata, Some(-9999.));
        assert_eq!(raw.elevations[2], 3.);

        let georef = raw.georef.unwrap();
        assert_eq!(georef.crs, Crs::Geographic);
        assert_eq!(
            georef.transform,
            GeoTransform {
                x_origin: 20.,
                pixel_width: 0.25,
                y_origin: 11.,
                pixel_height: 0.5,
            }
        );
    }

    #[test]
    fn reads_utm_tile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("utm.tif");

        write_tile(
            &path,
            &[1, 1, 0, 2, GT_MODEL_TYPE, 0, 1, 1, PROJECTED_CS_TYPE, 0, 1, 32630],
            &[0., 0., 0., 440_000., 4_473_000., 0.],
            &[25., 25., 0.],
            &DATA,
            None,
        );

        let georef = read_tile(&path).unwrap().georef.unwrap();
        assert_eq!(
            georef.crs,
            Crs::Utm {
                zone: 30,
                north: true
            }
        );
    }

    #[test]
    fn missing_geo_keys_leave_tile_unreferenced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.tif");

        write_tile(&path, &[], &[0., 0., 0., 20., 11., 0.], &[0.25, 0.5, 0.], &DATA, None);

        assert!(read_tile(&path).unwrap().georef.is_none());
    }

    #[test]
    fn unsupported_reference_system_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mercator.tif");

        write_tile(
            &path,
            &[1, 1, 0, 2, GT_MODEL_TYPE, 0, 1, 1, PROJECTED_CS_TYPE, 0, 1, 3857],
            &[0., 0., 0., 0., 0., 0.],
            &[1., 1., 0.],
            &DATA,
            None,
        );

        assert!(matches!(read_tile(&path), Err(TerrainError::Load { .. })));
    }

    #[test]
    fn parses_inline_keys_only() {
        let keys = parse_geo_keys(&[1, 1, 0, 3, 1024, 0, 1, 1, 3072, 0, 1, 32630, 3073, 34737, 10, 0])
            .unwrap();

        assert_eq!(keys.get(&GT_MODEL_TYPE), Some(&1));
        assert_eq!(keys.get(&PROJECTED_CS_TYPE), Some(&32630));
        assert!(!keys.contains_key(&3073));

        assert!(parse_geo_keys(&[1, 1, 0, 2, 1024, 0, 1]).is_err());
    }

    #[test]
    fn pixel_is_point_shifts_origin() {
        let keys = BTreeMap::from([(GT_RASTER_TYPE, RASTER_PIXEL_IS_POINT)]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("point.tif");

        write_tile(&path, &[], &[0., 0., 0., 20., 11., 0.], &[0.25, 0.5, 0.], &DATA, None);

        let mut decoder = Decoder::new(BufReader::new(File::open(&path).unwrap())).unwrap();
        let transform = read_transform(&mut decoder, &keys).unwrap().unwrap();

        assert_eq!(transform.x_origin, 19.875);
        assert_eq!(transform.y_origin, 11.25);
    }
}
