//! City map: boundary outline, locked camera, art piece markers and the
//! lazily fetched detail dialog.

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::api::{ArtPieceDetails, MapPoint};

pub const MIN_ZOOM: f64 = 11.0;
pub const MAX_ZOOM: f64 = 18.0;
pub const DEFAULT_ZOOM: f64 = 12.0;
/// Fraction of the boundary's extent added on every side of the camera lock.
pub const BOUNDS_PADDING: f64 = 0.1;
/// Poznań old town; used until boundary data arrives.
pub const DEFAULT_CENTER: (f64, f64) = (52.4064, 16.9252);

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum MapError {
    #[error("boundary data is not valid GeoJSON: {0}")]
    InvalidGeoJson(String),

    #[error("boundary data must be a feature or feature collection")]
    NotAFeatureCollection,

    #[error("boundary data has no usable coordinates")]
    EmptyBoundary,
}

/// Lower-cased with diacritics stripped, so "POZNAŃ" and "poznan" compare equal.
pub fn normalize_name(name: &str) -> String {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c == 'ł' { 'l' } else { c })
        .collect()
}

pub fn parse_boundary(text: &str) -> Result<FeatureCollection, MapError> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| MapError::InvalidGeoJson(e.to_string()))?;
    match geojson {
        GeoJson::FeatureCollection(collection) => Ok(collection),
        GeoJson::Feature(feature) => Ok(FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        }),
        GeoJson::Geometry(_) => Err(MapError::NotAFeatureCollection),
    }
}

/// Polygon features whose `name` contains `city`. Falls back to the whole
/// collection when nothing matches.
pub fn extract_boundary(collection: &FeatureCollection, city: &str) -> FeatureCollection {
    let needle = normalize_name(city);
    let features: Vec<Feature> = collection
        .features
        .iter()
        .filter(|feature| is_polygonal(feature))
        .filter(|feature| {
            feature_name(feature).is_some_and(|name| normalize_name(name).contains(&needle))
        })
        .cloned()
        .collect();

    if features.is_empty() {
        warn!(city, "no boundary feature matched, using the full collection");
        return collection.clone();
    }
    debug!(city, matched = features.len(), "boundary extracted");
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn feature_name(feature: &Feature) -> Option<&str> {
    feature.property("name").and_then(|v| v.as_str())
}

fn is_polygonal(feature: &Feature) -> bool {
    matches!(
        feature.geometry.as_ref().map(|g| &g.value),
        Some(Value::Polygon(_) | Value::MultiPolygon(_))
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn of_collection(collection: &FeatureCollection) -> Option<Self> {
        let mut bounds: Option<Self> = None;
        for geometry in collection.features.iter().filter_map(|f| f.geometry.as_ref()) {
            visit_positions(geometry, &mut |lng, lat| {
                if !lat.is_finite() || !lng.is_finite() {
                    return;
                }
                bounds = Some(match bounds {
                    None => Self {
                        min_lat: lat,
                        min_lng: lng,
                        max_lat: lat,
                        max_lng: lng,
                    },
                    Some(b) => Self {
                        min_lat: b.min_lat.min(lat),
                        min_lng: b.min_lng.min(lng),
                        max_lat: b.max_lat.max(lat),
                        max_lng: b.max_lng.max(lng),
                    },
                });
            });
        }
        bounds
    }

    #[must_use]
    pub fn padded(&self, ratio: f64) -> Self {
        let pad_lat = (self.max_lat - self.min_lat) * ratio;
        let pad_lng = (self.max_lng - self.min_lng) * ratio;
        Self {
            min_lat: self.min_lat - pad_lat,
            min_lng: self.min_lng - pad_lng,
            max_lat: self.max_lat + pad_lat,
            max_lng: self.max_lng + pad_lng,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        (self.min_lat..=self.max_lat).contains(&lat) && (self.min_lng..=self.max_lng).contains(&lng)
    }

    pub fn clamp(&self, lat: f64, lng: f64) -> (f64, f64) {
        (
            lat.clamp(self.min_lat, self.max_lat),
            lng.clamp(self.min_lng, self.max_lng),
        )
    }
}

// GeoJSON positions are [lng, lat].
fn visit_positions(geometry: &Geometry, f: &mut impl FnMut(f64, f64)) {
    fn position(p: &[f64], f: &mut impl FnMut(f64, f64)) {
        if let [lng, lat, ..] = p {
            f(*lng, *lat);
        }
    }

    match &geometry.value {
        Value::Point(p) => position(p, f),
        Value::MultiPoint(ps) | Value::LineString(ps) => ps.iter().for_each(|p| position(p, f)),
        Value::MultiLineString(lines) | Value::Polygon(lines) => lines
            .iter()
            .flatten()
            .for_each(|p| position(p, f)),
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .flatten()
            .flatten()
            .for_each(|p| position(p, f)),
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                visit_positions(g, f);
            }
        }
    }
}

#[must_use]
pub fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub lat: f64,
    pub lng: f64,
    pub zoom: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            lat: DEFAULT_CENTER.0,
            lng: DEFAULT_CENTER.1,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// Drops points that cannot be placed on the map.
pub fn visible_markers(points: Vec<MapPoint>) -> Vec<MapPoint> {
    let total = points.len();
    let visible: Vec<MapPoint> = points
        .into_iter()
        .filter(MapPoint::has_finite_position)
        .collect();
    if visible.len() < total {
        debug!(dropped = total - visible.len(), "skipping map points without coordinates");
    }
    visible
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum DetailState {
    #[default]
    Closed,
    Loading {
        id: String,
    },
    Open(Box<ArtPieceDetails>),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapState {
    boundary: Option<FeatureCollection>,
    lock: Option<BoundingBox>,
    camera: Camera,
    markers: Vec<MapPoint>,
    loading_points: bool,
    detail: DetailState,
}

impl MapState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boundary(&self) -> Option<&FeatureCollection> {
        self.boundary.as_ref()
    }

    pub fn lock(&self) -> Option<BoundingBox> {
        self.lock
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn markers(&self) -> &[MapPoint] {
        &self.markers
    }

    pub fn is_loading_points(&self) -> bool {
        self.loading_points
    }

    pub fn detail(&self) -> &DetailState {
        &self.detail
    }

    pub fn load_boundary(&mut self, text: &str, city: &str) -> Result<(), MapError> {
        let collection = parse_boundary(text)?;
        let boundary = extract_boundary(&collection, city);
        let bounds = BoundingBox::of_collection(&boundary).ok_or(MapError::EmptyBoundary)?;

        let (lat, lng) = bounds.center();
        self.lock = Some(bounds.padded(BOUNDS_PADDING));
        self.camera = Camera {
            lat,
            lng,
            zoom: clamp_zoom(self.camera.zoom),
        };
        info!(features = boundary.features.len(), "city boundary loaded");
        self.boundary = Some(boundary);
        Ok(())
    }

    /// Applies a camera move after clamping it into the lock and zoom range.
    pub fn move_camera(&mut self, lat: f64, lng: f64, zoom: f64) -> Camera {
        let (lat, lng) = match self.lock {
            Some(lock) => lock.clamp(lat, lng),
            None => (lat, lng),
        };
        self.camera = Camera {
            lat,
            lng,
            zoom: clamp_zoom(zoom),
        };
        self.camera
    }

    pub fn begin_points(&mut self) {
        self.loading_points = true;
    }

    pub fn set_points(&mut self, points: Vec<MapPoint>) {
        self.markers = visible_markers(points);
        self.loading_points = false;
    }

    pub fn points_failed(&mut self) {
        self.loading_points = false;
    }

    pub fn open_detail(&mut self, id: impl Into<String>) {
        self.detail = DetailState::Loading { id: id.into() };
    }

    /// Returns false when the dialog was closed in the meantime.
    pub fn detail_loaded(&mut self, details: ArtPieceDetails) -> bool {
        if !matches!(self.detail, DetailState::Loading { .. }) {
            return false;
        }
        self.detail = DetailState::Open(Box::new(details));
        true
    }

    pub fn close_detail(&mut self) {
        self.detail = DetailState::Closed;
    }

    /// Leaving the map keeps the boundary but forgets per-visit data.
    pub fn leave(&mut self) {
        self.loading_points = false;
        self.detail = DetailState::Closed;
    }
}
