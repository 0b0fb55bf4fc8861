//! Route file parsing
//!
//! Reads GPX route documents into a [`Route`] with a streaming XML reader.
//! Only the elements the tracker needs are interpreted: `<rtept>` points and
//! the `<name>` of each `<rte>`. Everything else, including the whole
//! `<metadata>` subtree, is skipped by tag name without looking at its
//! contents.
//!
//! Parsing is permissive: any structural problem (malformed XML, a route
//! point without numeric coordinates, coordinates out of range) yields an
//! empty route with no name instead of an error, so callers on the tracking
//! path never fail.

use crate::types::{Route, Waypoint};
use crate::Result;
use anyhow::Context;
use std::path::Path;
use tracing::{debug, warn};
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

const METADATA_TAG: &str = "metadata";
const ROUTE_TAG: &str = "rte";
const ROUTE_POINT_TAG: &str = "rtept";
const NAME_TAG: &str = "name";

/// Why a route document was discarded
#[derive(Debug)]
enum Discard {
    Xml(xml::reader::Error),
    MissingCoordinate(&'static str),
    BadCoordinate(&'static str, String),
    OutOfRange(Waypoint),
}

impl std::fmt::Display for Discard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Discard::Xml(e) => write!(f, "malformed XML: {}", e),
            Discard::MissingCoordinate(axis) => write!(f, "route point without {}", axis),
            Discard::BadCoordinate(axis, raw) => write!(f, "{} '{}' is not a number", axis, raw),
            Discard::OutOfRange(w) => write!(
                f,
                "route point ({}, {}) out of range",
                w.latitude, w.longitude
            ),
        }
    }
}

/// Parse route text into a [`Route`]
///
/// Waypoints come from `<rtept>` elements in document order. The first
/// attribute of a point is its latitude and the second its longitude,
/// whatever they are called. The route name is the text of a `<name>`
/// directly inside an `<rte>`; when several routes carry a name the last one
/// wins. A document without route points yields an empty, unnamed route.
pub fn parse_route(text: &str) -> Route {
    if text.trim().is_empty() {
        debug!("Route text is empty");
        return Route::empty();
    }

    match read_route(text) {
        Ok(route) if route.is_empty() => {
            debug!("Route text has no route points");
            Route::empty()
        }
        Ok(route) => {
            debug!(
                route_name = route.name.as_deref().unwrap_or(""),
                waypoints = route.len(),
                "Parsed route"
            );
            route
        }
        Err(reason) => {
            warn!(%reason, "Discarding route text");
            Route::empty()
        }
    }
}

fn read_route(text: &str) -> std::result::Result<Route, Discard> {
    let mut open: Vec<String> = Vec::new();
    // Depth of the <metadata> element being skipped, if any
    let mut skip_from: Option<usize> = None;
    // Text of a route-level <name> being read
    let mut pending_name: Option<String> = None;

    let mut name: Option<String> = None;
    let mut waypoints = Vec::new();

    for event in EventReader::new(text.as_bytes()) {
        match event.map_err(Discard::Xml)? {
            XmlEvent::StartElement {
                name: tag,
                attributes,
                ..
            } => {
                let tag = tag.local_name;
                if skip_from.is_none() {
                    if tag == METADATA_TAG {
                        skip_from = Some(open.len());
                    } else if tag == ROUTE_POINT_TAG {
                        waypoints.push(route_point(&attributes)?);
                    } else if tag == NAME_TAG
                        && open.last().map(String::as_str) == Some(ROUTE_TAG)
                    {
                        pending_name = Some(String::new());
                    }
                }
                open.push(tag);
            }
            XmlEvent::EndElement { .. } => {
                open.pop();
                if skip_from == Some(open.len()) {
                    skip_from = None;
                }
                if let Some(text) = pending_name.take() {
                    let text = text.trim();
                    if !text.is_empty() {
                        name = Some(text.to_string());
                    }
                }
            }
            XmlEvent::Characters(chunk) | XmlEvent::CData(chunk) => {
                if let Some(text) = pending_name.as_mut() {
                    text.push_str(&chunk);
                }
            }
            _ => {}
        }
    }

    Ok(Route::new(name, waypoints))
}

/// Waypoint from the first two attributes of a route point
fn route_point(attributes: &[OwnedAttribute]) -> std::result::Result<Waypoint, Discard> {
    let latitude = coordinate(attributes, 0, "latitude")?;
    let longitude = coordinate(attributes, 1, "longitude")?;

    let waypoint = Waypoint::new(latitude, longitude);
    if !waypoint.is_valid() {
        return Err(Discard::OutOfRange(waypoint));
    }
    Ok(waypoint)
}

fn coordinate(
    attributes: &[OwnedAttribute],
    index: usize,
    axis: &'static str,
) -> std::result::Result<f64, Discard> {
    let raw = attributes
        .get(index)
        .map(|attr| attr.value.trim())
        .ok_or(Discard::MissingCoordinate(axis))?;
    raw.parse::<f64>()
        .map_err(|_| Discard::BadCoordinate(axis, raw.to_string()))
}

/// Parse route bytes, as delivered by a file share, into a [`Route`]
///
/// Bytes that are not valid UTF-8 produce an empty route.
pub fn parse_route_bytes(data: &[u8]) -> Route {
    match std::str::from_utf8(data) {
        Ok(text) => parse_route(text),
        Err(e) => {
            warn!(error = %e, "Route data is not valid UTF-8");
            Route::empty()
        }
    }
}

/// Read and parse a route file
///
/// Only reading the file can fail; its content is parsed permissively.
pub fn parse_route_file(file_path: &Path) -> Result<Route> {
    let data = std::fs::read(file_path)
        .with_context(|| format!("Failed to read route file: {:?}", file_path))?;
    Ok(parse_route_bytes(&data))
}
