//! Replicated records: stroke segments, text annotations and clear signals.
//!
//! Field names on the wire follow the store schema (`size`, `userId`, ...),
//! so records written by any client of the same room decode here.

use std::fmt;

use kurbo::Point;
use peniko::Color;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};
#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque per-session identity used only to recognise self-originated records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh identity for this session.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("user_{}", &raw[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Error parsing a hex color token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color token: {0:?}")]
pub struct ColorParseError(pub String);

/// An opaque RGB color, carried on the wire as a `#rrggbb` token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb` (case-insensitive, `#` optional).
    pub fn parse(token: &str) -> Result<Self, ColorParseError> {
        let err = || ColorParseError(token.to_string());
        let hex = token.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return Err(err());
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(Self::new(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?)),
            3 => {
                let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(short(0)?, short(1)?, short(2)?))
            }
            _ => Err(err()),
        }
    }

    /// Format as a lowercase `#rrggbb` token.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse(&value)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl From<Rgb> for Color {
    fn from(color: Rgb) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, 255)
    }
}

/// Why an inbound record was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("record has no origin id")]
    MissingOrigin,
    #[error("non-finite coordinate")]
    NonFinite,
    #[error("invalid stroke width: {0}")]
    InvalidWidth(f64),
    #[error("invalid font size: {0}")]
    InvalidFontSize(f64),
    #[error("empty text")]
    EmptyText,
}

/// One straight piece of a freehand stroke, in normalized coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeSegment {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub color: Rgb,
    #[serde(rename = "size")]
    pub width: f64,
    #[serde(rename = "userId")]
    pub origin_id: ClientId,
    pub timestamp: Timestamp,
}

impl StrokeSegment {
    /// Normalized start point.
    pub fn start(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    /// Normalized end point.
    pub fn end(&self) -> Point {
        Point::new(self.x1, self.y1)
    }
}

/// A single-line text placed on the surface, anchored in normalized
/// coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub x: f64,
    pub y: f64,
    pub text: String,
    #[serde(rename = "size")]
    pub font_size: f64,
    pub color: Rgb,
    #[serde(rename = "userId")]
    pub origin_id: ClientId,
    pub timestamp: Timestamp,
}

impl TextAnnotation {
    /// Normalized anchor point.
    pub fn anchor(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Instructs every other client to wipe its surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearSignal {
    #[serde(rename = "userId")]
    pub origin_id: ClientId,
    pub timestamp: Timestamp,
}

/// The three collections a room is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Drawings,
    Texts,
    Clear,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Drawings => "drawings",
            Collection::Texts => "texts",
            Collection::Clear => "clear",
        }
    }
}

/// A record tagged with the collection it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", rename_all = "snake_case")]
pub enum Record {
    #[serde(rename = "drawings")]
    Stroke(StrokeSegment),
    #[serde(rename = "texts")]
    Text(TextAnnotation),
    #[serde(rename = "clear")]
    Clear(ClearSignal),
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::Stroke(_) => Collection::Drawings,
            Record::Text(_) => Collection::Texts,
            Record::Clear(_) => Collection::Clear,
        }
    }

    pub fn origin_id(&self) -> &ClientId {
        match self {
            Record::Stroke(s) => &s.origin_id,
            Record::Text(t) => &t.origin_id,
            Record::Clear(c) => &c.origin_id,
        }
    }

    /// Check that a record can be applied to a surface.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.origin_id().as_str().is_empty() {
            return Err(RecordError::MissingOrigin);
        }
        match self {
            Record::Stroke(s) => {
                if ![s.x0, s.y0, s.x1, s.y1].iter().all(|v| v.is_finite()) {
                    return Err(RecordError::NonFinite);
                }
                if !(s.width.is_finite() && s.width > 0.0) {
                    return Err(RecordError::InvalidWidth(s.width));
                }
            }
            Record::Text(t) => {
                if !(t.x.is_finite() && t.y.is_finite()) {
                    return Err(RecordError::NonFinite);
                }
                if !(t.font_size.is_finite() && t.font_size > 0.0) {
                    return Err(RecordError::InvalidFontSize(t.font_size));
                }
                if t.text.trim().is_empty() {
                    return Err(RecordError::EmptyText);
                }
            }
            Record::Clear(_) => {}
        }
        Ok(())
    }
}
