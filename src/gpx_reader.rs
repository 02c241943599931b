//! GPX input adapter.
//!
//! Reads track points (or route points when a file has no tracks) into
//! [`Waypoint`]s. Files the `gpx` crate rejects get one retry after a minimal
//! textual repair; coordinates and elevations are never altered.
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use chrono::{DateTime, Utc};
use gpx::{read, Gpx};
use log::{debug, warn};

use crate::track::Waypoint;

const FEET_PER_METER: f64 = 3.28084;

#[derive(Debug, Clone, PartialEq)]
pub struct GpxCourse {
    /// First name found in the metadata, track or route.
    pub name: Option<String>,
    pub waypoints: Vec<Waypoint>,
}

pub fn load_gpx_file(path: &Path) -> Result<GpxCourse, Box<dyn std::error::Error>> {
    let mut bytes = Vec::new();
    File::open(path)
        .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?
        .read_to_end(&mut bytes)?;

    let gpx = match read(BufReader::new(Cursor::new(&bytes))) {
        Ok(gpx) => gpx,
        Err(e) => {
            warn!("Standard parsing of {} failed ({}), retrying after repair", path.display(), e);
            // invalid UTF-8 decodes to U+FFFD
            let repaired = repair_gpx_text(&String::from_utf8_lossy(&bytes));
            read(BufReader::new(Cursor::new(repaired.as_bytes())))
                .map_err(|e| format!("Could not parse {}: {}", path.display(), e))?
        }
    };

    let course = course_from_gpx(gpx)?;
    debug!("Read {} points from {}", course.waypoints.len(), path.display());
    Ok(course)
}

pub fn read_gpx<R: Read>(reader: R) -> Result<GpxCourse, Box<dyn std::error::Error>> {
    course_from_gpx(read(BufReader::new(reader))?)
}

fn course_from_gpx(gpx: Gpx) -> Result<GpxCourse, Box<dyn std::error::Error>> {
    let mut name = gpx.metadata.as_ref().and_then(|m| m.name.clone());
    let mut points = Vec::new();

    for track in gpx.tracks {
        if name.is_none() {
            name = track.name.clone();
        }
        for segment in track.segments {
            points.extend(segment.points);
        }
    }

    if points.is_empty() {
        for route in gpx.routes {
            if name.is_none() {
                name = route.name.clone();
            }
            points.extend(route.points);
        }
    }

    if points.is_empty() {
        return Err("GPX file contains no track or route points".into());
    }

    let waypoints = points.iter().map(convert_point).collect();
    Ok(GpxCourse { name, waypoints })
}

fn convert_point(point: &gpx::Waypoint) -> Waypoint {
    let geo = point.point();
    let timestamp = point.time.as_ref().and_then(|time| {
        let parsed = time
            .format()
            .ok()
            .and_then(|iso| DateTime::parse_from_rfc3339(&iso).ok())
            .map(|t| t.with_timezone(&Utc));
        if parsed.is_none() {
            warn!("Ignoring unreadable timestamp at {:.5}, {:.5}", geo.y(), geo.x());
        }
        parsed
    });

    Waypoint {
        latitude: geo.y(),
        longitude: geo.x(),
        elevation_ft: point.elevation.map(|m| m * FEET_PER_METER),
        timestamp,
    }
}

/// Fixes the handful of defects exported files commonly carry: a missing XML
/// declaration or version attribute, a truncated tail and control characters.
pub fn repair_gpx_text(content: &str) -> String {
    let mut repaired: String = content
        .trim()
        .chars()
        .filter(|&c| c == '\t' || c == '\n' || c == '\r' || !c.is_control())
        .collect();

    if !repaired.starts_with("<?xml") {
        repaired = format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", repaired);
    }

    if let Some(start) = repaired.find("<gpx") {
        if let Some(len) = repaired[start..].find('>') {
            let tag = &repaired[start..start + len];
            if !tag.contains("version=") {
                repaired.insert_str(start + len, " version=\"1.1\"");
            }
        }
    }

    if repaired.contains("<gpx") && !repaired.ends_with("</gpx>") {
        let unclosed = |open: &str, close: &str| {
            repaired
                .matches(open)
                .count()
                .saturating_sub(repaired.matches(close).count())
        };
        let (segments, tracks, routes) = (
            unclosed("<trkseg>", "</trkseg>"),
            unclosed("<trk>", "</trk>"),
            unclosed("<rte>", "</rte>"),
        );
        // A truncated file usually ends mid-point; drop the partial element.
        if let Some(last) = repaired.rfind("<trkpt").or_else(|| repaired.rfind("<rtept")) {
            let tail = &repaired[last..];
            if !tail.contains("</trkpt>") && !tail.contains("</rtept>") && !tail.contains("/>") {
                repaired.truncate(last);
            }
        }
        repaired.push_str(&"</trkseg>".repeat(segments));
        repaired.push_str(&"</trk>".repeat(tracks));
        repaired.push_str(&"</rte>".repeat(routes));
        repaired.push_str("</gpx>");
    }

    repaired
}
