//! GPX and FIT parsing into the normalized `TrackPoint` stream the rest of
//! the pipeline (trace derivation, route matching) consumes.

use bytes::Buf as _;
use bytes::Bytes;
use time::OffsetDateTime;

use crate::models::TrackPoint;
use crate::object_store_service::FileType;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to parse GPX file: {0}")]
    Gpx(String),
    #[error("failed to parse FIT file: {0}")]
    Fit(String),
    #[error("unsupported file type: {0:?}")]
    UnsupportedFileType(FileType),
}

pub fn parse_activity_file(file_type: FileType, bytes: Bytes) -> Result<Vec<TrackPoint>, ParseError> {
    let actual_type = if file_type == FileType::Other {
        FileType::detect_from_bytes(&bytes)
    } else {
        file_type
    };

    match actual_type {
        FileType::Gpx => parse_gpx(bytes),
        FileType::Fit => parse_fit(bytes),
        FileType::Other => Err(ParseError::UnsupportedFileType(actual_type)),
    }
}

/// Parse a GPX file, extracting points that carry both a position and a
/// timestamp — points missing either are dropped, matching the ingest
/// contract's assumption that every `TrackPoint` is fully timestamped.
pub fn parse_gpx(bytes: Bytes) -> Result<Vec<TrackPoint>, ParseError> {
    let gpx = gpx::read(bytes.reader()).map_err(|e| ParseError::Gpx(e.to_string()))?;

    let mut points = Vec::new();
    for track in &gpx.tracks {
        for seg in &track.segments {
            for pt in &seg.points {
                let Some(timestamp) = pt.time.as_ref().and_then(|t| {
                    t.format()
                        .ok()
                        .and_then(|s| OffsetDateTime::parse(&s, &time::format_description::well_known::Rfc3339).ok())
                }) else {
                    continue;
                };

                points.push(TrackPoint {
                    lat: pt.point().y(),
                    lng: pt.point().x(),
                    alt: pt.elevation,
                    timestamp,
                    speed_ms: None,
                    heart_rate: None,
                });
            }
        }
    }

    Ok(points)
}

/// Parse a FIT file's `Record` messages into track points. Latitude and
/// longitude arrive as semicircles (`2^31` semicircles == 180 degrees).
pub fn parse_fit(bytes: Bytes) -> Result<Vec<TrackPoint>, ParseError> {
    use fitparser::profile::field_types::MesgNum;

    let data = bytes.to_vec();
    let fit_data = fitparser::from_bytes(&data).map_err(|e| ParseError::Fit(e.to_string()))?;

    let mut points = Vec::new();

    for record in &fit_data {
        if record.kind() != MesgNum::Record {
            continue;
        }

        let mut lat: Option<f64> = None;
        let mut lng: Option<f64> = None;
        let mut alt: Option<f64> = None;
        let mut alt_enhanced: Option<f64> = None;
        let mut timestamp: Option<OffsetDateTime> = None;
        let mut speed_ms: Option<f64> = None;
        let mut speed_ms_enhanced: Option<f64> = None;
        let mut heart_rate: Option<i32> = None;

        for field in record.fields() {
            match field.name() {
                "position_lat" => {
                    if let fitparser::Value::SInt32(v) = field.value() {
                        lat = Some(semicircles_to_degrees(*v));
                    }
                }
                "position_long" => {
                    if let fitparser::Value::SInt32(v) = field.value() {
                        lng = Some(semicircles_to_degrees(*v));
                    }
                }
                "altitude" => alt = extract_fit_f64(field.value()),
                "enhanced_altitude" => alt_enhanced = extract_fit_f64(field.value()),
                "timestamp" => {
                    if let fitparser::Value::Timestamp(t) = field.value() {
                        timestamp = Some(chrono_to_offset_datetime(t));
                    }
                }
                "speed" => speed_ms = extract_fit_f64(field.value()),
                "enhanced_speed" => speed_ms_enhanced = extract_fit_f64(field.value()),
                "heart_rate" => heart_rate = extract_fit_i32(field.value()),
                _ => {}
            }
        }

        let alt = alt_enhanced.or(alt);
        let speed_ms = speed_ms_enhanced.or(speed_ms);

        if let (Some(lat), Some(lng), Some(timestamp)) = (lat, lng, timestamp) {
            if lat.abs() > 90.0 || lng.abs() > 180.0 {
                continue;
            }

            points.push(TrackPoint {
                lat,
                lng,
                alt,
                timestamp,
                speed_ms,
                heart_rate,
            });
        }
    }

    Ok(points)
}

fn chrono_to_offset_datetime(dt: &chrono::DateTime<chrono::Local>) -> OffsetDateTime {
    let utc = dt.with_timezone(&chrono::Utc);
    OffsetDateTime::from_unix_timestamp(utc.timestamp())
        .map(|odt| odt.replace_nanosecond(utc.timestamp_subsec_nanos()).unwrap_or(odt))
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn semicircles_to_degrees(semicircles: i32) -> f64 {
    (semicircles as f64) * (180.0 / 2_147_483_648.0)
}

fn extract_fit_i32(value: &fitparser::Value) -> Option<i32> {
    match value {
        fitparser::Value::SInt8(v) => Some(*v as i32),
        fitparser::Value::UInt8(v) => Some(*v as i32),
        fitparser::Value::SInt16(v) => Some(*v as i32),
        fitparser::Value::UInt16(v) => Some(*v as i32),
        fitparser::Value::SInt32(v) => Some(*v),
        fitparser::Value::UInt32(v) => Some(*v as i32),
        _ => None,
    }
}

fn extract_fit_f64(value: &fitparser::Value) -> Option<f64> {
    match value {
        fitparser::Value::Float32(v) => Some(*v as f64),
        fitparser::Value::Float64(v) => Some(*v),
        fitparser::Value::SInt8(v) => Some(*v as f64),
        fitparser::Value::UInt8(v) => Some(*v as f64),
        fitparser::Value::SInt16(v) => Some(*v as f64),
        fitparser::Value::UInt16(v) => Some(*v as f64),
        fitparser::Value::SInt32(v) => Some(*v as f64),
        fitparser::Value::UInt32(v) => Some(*v as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicircle_round_trip_endpoints() {
        assert!((semicircles_to_degrees(2_147_483_647) - 180.0).abs() < 0.0001);
        assert!((semicircles_to_degrees(0) - 0.0).abs() < 0.0001);
        assert!((semicircles_to_degrees(-2_147_483_648) - (-180.0)).abs() < 0.0001);
    }

    #[test]
    fn gpx_without_timestamps_yields_no_points() {
        let gpx_bytes = Bytes::from_static(
            br#"<?xml version="1.0"?>
            <gpx version="1.1" xmlns="http://www.topografix.com/GPX/1/1">
              <trk><trkseg>
                <trkpt lat="1.0" lon="2.0"></trkpt>
              </trkseg></trk>
            </gpx>"#,
        );
        let points = parse_gpx(gpx_bytes).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn gpx_with_timestamps_is_parsed() {
        let gpx_bytes = Bytes::from_static(
            br#"<?xml version="1.0"?>
            <gpx version="1.1" xmlns="http://www.topografix.com/GPX/1/1">
              <trk><trkseg>
                <trkpt lat="1.0" lon="2.0"><ele>10</ele><time>2024-01-01T00:00:00Z</time></trkpt>
                <trkpt lat="1.0001" lon="2.0001"><ele>11</ele><time>2024-01-01T00:00:10Z</time></trkpt>
              </trkseg></trk>
            </gpx>"#,
        );
        let points = parse_gpx(gpx_bytes).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].alt, Some(10.0));
    }
}
