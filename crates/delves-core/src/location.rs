//! Positions, locations and the `x,y,z[,yaw,pitch]` string codec.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A point in block space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// East/west axis.
    pub x: f64,
    /// Vertical axis.
    pub y: f64,
    /// North/south axis.
    pub z: f64,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns `true` if `self` lies within `radius` of `center` on every
    /// axis independently (an axis-aligned cube, not a sphere).
    #[must_use]
    pub fn within_cube(&self, center: &Position, radius: f64) -> bool {
        (self.x - center.x).abs() <= radius
            && (self.y - center.y).abs() <= radius
            && (self.z - center.z).abs() <= radius
    }
}

/// A position plus facing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Where.
    pub position: Position,
    /// Horizontal facing in degrees.
    #[serde(default)]
    pub yaw: f32,
    /// Vertical facing in degrees.
    #[serde(default)]
    pub pitch: f32,
}

impl Location {
    /// Creates a location facing yaw 0, pitch 0.
    #[must_use]
    pub const fn at(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Position::new(x, y, z),
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Parses a location string that may carry one legacy leading token
    /// (a world or template name) before the numeric fields.
    ///
    /// # Errors
    ///
    /// Returns `LocationParseError` if neither the strict form nor the form
    /// with the first token discarded parses.
    pub fn parse_tolerant(s: &str) -> Result<Self, LocationParseError> {
        match s.parse::<Self>() {
            Ok(location) => Ok(location),
            Err(strict_err) => {
                let fields: Vec<&str> = s.split(',').collect();
                if fields.len() == 4 || fields.len() == 6 {
                    parse_fields(&fields[1..])
                } else {
                    Err(strict_err)
                }
            }
        }
    }
}

impl FromStr for Location {
    type Err = LocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').collect();
        parse_fields(&fields)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Position { x, y, z } = self.position;
        write!(f, "{x},{y},{z},{},{}", self.yaw, self.pitch)
    }
}

fn parse_fields(fields: &[&str]) -> Result<Location, LocationParseError> {
    if fields.len() != 3 && fields.len() != 5 {
        return Err(LocationParseError::FieldCount(fields.len()));
    }

    let x = parse_number::<f64>("x", fields[0])?;
    let y = parse_number::<f64>("y", fields[1])?;
    let z = parse_number::<f64>("z", fields[2])?;
    let (yaw, pitch) = if fields.len() == 5 {
        (
            parse_number::<f32>("yaw", fields[3])?,
            parse_number::<f32>("pitch", fields[4])?,
        )
    } else {
        (0.0, 0.0)
    };

    Ok(Location {
        position: Position::new(x, y, z),
        yaw,
        pitch,
    })
}

fn parse_number<T: FromStr>(field: &'static str, raw: &str) -> Result<T, LocationParseError> {
    raw.trim()
        .parse()
        .map_err(|_| LocationParseError::InvalidNumber {
            field,
            value: raw.trim().to_owned(),
        })
}

/// A location in a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldLocation {
    /// World name.
    pub world: String,
    /// Location inside that world.
    pub location: Location,
}

/// Errors produced when decoding a location string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationParseError {
    /// Expected 3 or 5 comma-separated fields.
    #[error("expected 3 or 5 comma-separated fields, found {0}")]
    FieldCount(usize),

    /// A field did not parse as a decimal number.
    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Offending text.
        value: String,
    },
}
