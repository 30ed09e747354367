//! Ward boundary encoding for the static map `path` parameter, and zoom selection.

use crate::domain::model::WardMetadata;
use serde_json::Value;

/// Style prefix for the ward outline: translucent fill, solid blue stroke.
pub const PATH_STYLE: &str = "fillcolor:0x3300FF66|color:0x0044FF|weight:3|";
pub const MAX_PATH_POINTS: usize = 100;

pub const MIN_ZOOM: u8 = 12;
pub const MAX_ZOOM: u8 = 19;
const DEFAULT_VIEW_ZOOM: f64 = 15.0;

/// Keeps every n-th point so at most about `max_points` remain.
pub fn simplify_path<T: Clone>(points: &[T], max_points: usize) -> Vec<T> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let step = points.len().div_ceil(max_points.max(1)).max(1);
    points.iter().step_by(step).cloned().collect()
}

/// A GeoJSON position as `(lng, lat)`.
fn position(value: &Value) -> Option<(f64, f64)> {
    let coords = value.as_array()?;
    Some((coords.first()?.as_f64()?, coords.get(1)?.as_f64()?))
}

fn format_ring(ring: &[Value]) -> Option<String> {
    let positions: Vec<(f64, f64)> = ring.iter().filter_map(position).collect();
    let mut simplified = simplify_path(&positions, MAX_PATH_POINTS);
    let first = *simplified.first()?;
    if simplified.last() != Some(&first) {
        simplified.push(first);
    }

    Some(
        simplified
            .iter()
            .map(|(lng, lat)| format!("{},{}", lat, lng))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

fn geometry_of(geojson: &Value) -> Option<&Value> {
    let obj = geojson.as_object()?;
    if obj.get("type").and_then(Value::as_str) == Some("FeatureCollection") {
        let first = obj.get("features")?.as_array()?.first()?;
        return geometry_of(first);
    }
    match obj.get("geometry") {
        Some(geometry) => Some(geometry).filter(|g| !g.is_null()),
        None => Some(geojson),
    }
}

/// Encodes the outer ring of a ward polygon as a Static Maps `path` value.
///
/// Accepts a Feature, a bare geometry or a FeatureCollection (first feature).
/// Only Polygon and MultiPolygon (first polygon) are drawn.
pub fn build_static_map_path(geojson: &Value) -> Option<String> {
    let geometry = geometry_of(geojson)?;
    let coordinates = geometry.get("coordinates")?.as_array()?;
    if coordinates.is_empty() {
        return None;
    }

    let outer_ring = match geometry.get("type")?.as_str()? {
        "Polygon" => coordinates.first()?.as_array()?,
        "MultiPolygon" => coordinates.first()?.as_array()?.first()?.as_array()?,
        _ => return None,
    };

    let body = format_ring(outer_ring)?;
    Some(format!("{}{}", PATH_STYLE, body))
}

/// Zoom level for a ward snapshot.
///
/// The bounding box decides when complete; otherwise one step out from the
/// zoom the user was looking at. Always within `MIN_ZOOM..=MAX_ZOOM`.
pub fn choose_zoom(metadata: &WardMetadata) -> u8 {
    let from_bbox = metadata
        .bounding_box()
        .and_then(|bbox| bbox.span())
        .map(|(lat_span, lng_span)| zoom_for_span(lat_span.max(lng_span) * 1.5));

    let zoom = from_bbox.unwrap_or_else(|| {
        let view_zoom = metadata.map_zoom().unwrap_or(DEFAULT_VIEW_ZOOM);
        (view_zoom.trunc() - 1.0).max(f64::from(MIN_ZOOM))
    });

    zoom.round().clamp(f64::from(MIN_ZOOM), f64::from(MAX_ZOOM)) as u8
}

fn zoom_for_span(max_span: f64) -> f64 {
    if max_span > 0.05 {
        13.0
    } else if max_span > 0.02 {
        14.0
    } else if max_span > 0.01 {
        15.0
    } else if max_span > 0.005 {
        16.0
    } else {
        17.0
    }
}
