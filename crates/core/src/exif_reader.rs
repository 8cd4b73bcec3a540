use crate::metadata::{Coordinates, ImageMetadata};
use anyhow::{Context, Result};
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const DATE_TAGS: &[Tag] = &[Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

pub trait MetadataExtractor {
    fn extract(&self, path: &Path) -> Result<ImageMetadata>;
}

/// Reads capture time, GPS position and camera attributes from the EXIF block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExifExtractor;

impl MetadataExtractor for ExifExtractor {
    fn extract(&self, path: &Path) -> Result<ImageMetadata> {
        read_exif_metadata(path)
    }
}

pub fn read_exif_metadata(path: &Path) -> Result<ImageMetadata> {
    let file = File::open(path)
        .with_context(|| format!("failed to open image for EXIF: {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("failed to parse EXIF: {}", path.display()))?;

    let capture_time = DATE_TAGS
        .iter()
        .find_map(|tag| exif.get_field(*tag, In::PRIMARY).and_then(ascii_value));

    Ok(ImageMetadata {
        capture_time,
        coordinates: read_coordinates(&exif),
        camera: read_camera_info(&exif),
    })
}

fn read_coordinates(exif: &Exif) -> Option<Coordinates> {
    let latitude = signed_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, 'S')?;
    let longitude = signed_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, 'W')?;
    Some(Coordinates::new(latitude, longitude))
}

fn signed_degrees(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: char) -> Option<f64> {
    let degrees = to_degrees(exif.get_field(value_tag, In::PRIMARY)?)?;
    let reference = ascii_value(exif.get_field(ref_tag, In::PRIMARY)?)?;
    if reference.contains(negative_ref) {
        Some(-degrees)
    } else {
        Some(degrees)
    }
}

fn to_degrees(field: &Field) -> Option<f64> {
    match field.value {
        Value::Rational(ref v) if v.len() >= 3 => {
            Some(v[0].to_f64() + v[1].to_f64() / 60.0 + v[2].to_f64() / 3600.0)
        }
        _ => None,
    }
}

fn read_camera_info(exif: &Exif) -> BTreeMap<String, String> {
    let mut camera = BTreeMap::new();

    for (tag, key) in [
        (Tag::Make, "make"),
        (Tag::Model, "model"),
        (Tag::LensModel, "lens"),
    ] {
        if let Some(value) = exif.get_field(tag, In::PRIMARY).and_then(ascii_value) {
            camera.insert(key.to_string(), value);
        }
    }

    for (tag, key) in [
        (Tag::FNumber, "f_number"),
        (Tag::ExposureTime, "exposure"),
        (Tag::PhotographicSensitivity, "iso"),
    ] {
        if let Some(field) = exif.get_field(tag, In::PRIMARY) {
            let value = field.display_value().with_unit(exif).to_string();
            if let Some(value) = normalize(Some(value)) {
                camera.insert(key.to_string(), value);
            }
        }
    }

    camera
}

fn ascii_value(field: &Field) -> Option<String> {
    match field.value {
        Value::Ascii(ref parts) => {
            let raw = parts.first()?;
            let text = String::from_utf8_lossy(raw);
            normalize(Some(text.trim_matches('\0').to_string()))
        }
        _ => None,
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
