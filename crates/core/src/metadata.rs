use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff"];

/// An image discovered by a scan. The path is the location at scan time and
/// goes stale as soon as the file is moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub path: PathBuf,
    pub extension: String,
    pub modified: DateTime<Local>,
}

impl ImageFile {
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|v| v.to_string_lossy().to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Place {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
}

impl Place {
    /// Populated components in display order: city, region, country.
    pub fn components(&self) -> Vec<&str> {
        [&self.city, &self.region, &self.country]
            .into_iter()
            .filter_map(|v| v.as_deref().map(str::trim).filter(|s| !s.is_empty()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.components().is_empty()
    }
}

/// Raw values returned by a metadata extractor. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageMetadata {
    pub capture_time: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub camera: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureContext {
    pub capture_time: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub place: Option<Place>,
}

#[cfg(test)]
mod tests {
    use super::{Coordinates, Place};

    #[test]
    fn place_components_trim_and_drop_empty() {
        let place = Place {
            city: Some("  New York ".to_string()),
            region: Some("   ".to_string()),
            country: Some("US".to_string()),
        };
        assert_eq!(place.components(), vec!["New York", "US"]);
        assert!(!place.is_empty());
        assert!(Place::default().is_empty());
    }

    #[test]
    fn coordinates_range_check() {
        assert!(Coordinates::new(40.7128, -74.0060).is_valid());
        assert!(Coordinates::new(-90.0, 180.0).is_valid());
        assert!(!Coordinates::new(200.0, 200.0).is_valid());
        assert!(!Coordinates::new(10.0, -180.5).is_valid());
    }
}
