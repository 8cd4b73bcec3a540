use crate::metadata::{Coordinates, Place};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

pub const UNKNOWN_LOCATION: &str = "Unknown Location";

const EARTH_RADIUS_KM: f64 = 6371.0;

pub trait LocationResolver {
    fn resolve(&self, coordinates: Coordinates) -> Option<Place>;

    fn format(&self, place: &Place) -> String {
        format_location_string(Some(place))
    }
}

/// Joins the populated components as `city, region, country`.
pub fn format_location_string(place: Option<&Place>) -> String {
    let components = place.map(Place::components).unwrap_or_default();
    if components.is_empty() {
        UNKNOWN_LOCATION.to_string()
    } else {
        components.join(", ")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocationResolver;

impl LocationResolver for NoLocationResolver {
    fn resolve(&self, _coordinates: Coordinates) -> Option<Place> {
        None
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GazetteerRow {
    lat: f64,
    lon: f64,
    name: String,
    #[serde(default)]
    admin1: String,
    #[serde(default)]
    cc: String,
}

#[derive(Debug, Clone)]
struct GazetteerEntry {
    position: Coordinates,
    place: Place,
}

/// Offline reverse geocoder: nearest entry of a GeoNames-style CSV
/// (`lat,lon,name,admin1,admin2,cc`).
#[derive(Debug, Clone)]
pub struct GazetteerResolver {
    entries: Vec<GazetteerEntry>,
    max_distance_km: Option<f64>,
}

impl GazetteerResolver {
    pub fn from_path(path: &Path, max_distance_km: Option<f64>) -> Result<Self> {
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open gazetteer: {}", path.display()))?;
        Self::from_reader(reader, max_distance_km)
            .with_context(|| format!("failed to read gazetteer: {}", path.display()))
    }

    fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        max_distance_km: Option<f64>,
    ) -> Result<Self> {
        let mut entries = Vec::new();
        for row in reader.deserialize::<GazetteerRow>() {
            let row = row.context("invalid gazetteer row")?;
            entries.push(GazetteerEntry {
                position: Coordinates::new(row.lat, row.lon),
                place: Place {
                    city: non_empty(row.name),
                    region: non_empty(row.admin1),
                    country: non_empty(row.cc),
                },
            });
        }
        log::debug!("loaded {} gazetteer entries", entries.len());
        Ok(Self {
            entries,
            max_distance_km,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LocationResolver for GazetteerResolver {
    fn resolve(&self, coordinates: Coordinates) -> Option<Place> {
        if !coordinates.is_valid() {
            log::warn!(
                "invalid coordinates: ({}, {})",
                coordinates.latitude,
                coordinates.longitude
            );
            return None;
        }

        let (entry, distance) = self
            .entries
            .iter()
            .map(|entry| (entry, haversine_km(coordinates, entry.position)))
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        if let Some(max) = self.max_distance_km {
            if distance > max {
                log::debug!("nearest place is {distance:.1} km away, beyond {max} km");
                return None;
            }
        }
        Some(entry.place.clone())
    }
}

fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b.longitude - a.longitude).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
