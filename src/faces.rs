//! Corner placement for texture extraction
//!
//! A photographed mattress shows up to three faces. Each face is a
//! quadrilateral given by four corners in percentage image coordinates
//! (0..=100 on both axes). Corners may be seeded by the vision detector and
//! are then refined by hand; a manual edit always replaces the seed.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A point in percentage coordinates over the image width/height
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert to pixel coordinates; 100% lands on the last pixel
    pub fn to_pixels(&self, width: u32, height: u32) -> (f64, f64) {
        let max_x = width.saturating_sub(1) as f64;
        let max_y = height.saturating_sub(1) as f64;
        (self.x / 100.0 * max_x, self.y / 100.0 * max_y)
    }

    /// Clamp into the visible range, mapping NaN to 0
    pub fn clamped(&self) -> Self {
        let clamp = |v: f64| if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
        Self {
            x: clamp(self.x),
            y: clamp(self.y),
        }
    }
}

/// Which corner of a face
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Corners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Default for Corners {
    fn default() -> Self {
        // Slightly inset frame
        Self {
            top_left: Point::new(10.0, 10.0),
            top_right: Point::new(90.0, 10.0),
            bottom_right: Point::new(90.0, 90.0),
            bottom_left: Point::new(10.0, 90.0),
        }
    }
}

impl Corners {
    /// The whole image
    pub fn full() -> Self {
        Self {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(100.0, 0.0),
            bottom_right: Point::new(100.0, 100.0),
            bottom_left: Point::new(0.0, 100.0),
        }
    }

    /// Corners in the order top-left, top-right, bottom-right, bottom-left
    pub fn ordered(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Corners in source pixel coordinates, same order as [`Corners::ordered`]
    pub fn to_pixels(&self, width: u32, height: u32) -> [(f64, f64); 4] {
        self.ordered().map(|p| p.to_pixels(width, height))
    }

    pub fn set(&mut self, corner: Corner, point: Point) {
        let slot = match corner {
            Corner::TopLeft => &mut self.top_left,
            Corner::TopRight => &mut self.top_right,
            Corner::BottomRight => &mut self.bottom_right,
            Corner::BottomLeft => &mut self.bottom_left,
        };
        *slot = point.clamped();
    }

    pub fn clamped(&self) -> Self {
        Self {
            top_left: self.top_left.clamped(),
            top_right: self.top_right.clamped(),
            bottom_right: self.bottom_right.clamped(),
            bottom_left: self.bottom_left.clamped(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FaceData {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub corners: Corners,
}

/// Which face of the mattress
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Face {
    TopSurface,
    FrontPanel,
    SidePanel,
}

/// The three faces the vision detector reports
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaceSet {
    #[serde(default)]
    pub top_surface: FaceData,
    #[serde(default)]
    pub front_panel: FaceData,
    #[serde(default)]
    pub side_panel: FaceData,
}

impl FaceSet {
    fn face_mut(&mut self, face: Face) -> &mut FaceData {
        match face {
            Face::TopSurface => &mut self.top_surface,
            Face::FrontPanel => &mut self.front_panel,
            Face::SidePanel => &mut self.side_panel,
        }
    }

    /// Apply a manual corner correction; the face becomes visible
    pub fn set_corner(&mut self, face: Face, corner: Corner, point: Point) {
        let data = self.face_mut(face);
        data.corners.set(corner, point);
        data.visible = true;
    }

    pub fn visible_count(&self) -> usize {
        [self.top_surface, self.front_panel, self.side_panel]
            .iter()
            .filter(|f| f.visible)
            .count()
    }

    fn clamped(mut self) -> Self {
        for face in [Face::TopSurface, Face::FrontPanel, Face::SidePanel] {
            let data = self.face_mut(face);
            data.corners = data.corners.clamped();
        }
        self
    }
}

/// Parse the vision detector's reply into a face set.
///
/// The reply may wrap the JSON object in prose or a fenced code block.
/// Coordinates are clamped into range and absent faces stay invisible.
pub fn parse_detection(reply: &str) -> Result<FaceSet> {
    let json = extract_json_object(reply)
        .ok_or_else(|| Error::validation("detection reply contains no JSON object"))?;

    let faces: FaceSet = serde_json::from_str(json)
        .map_err(|e| Error::validation(format!("malformed detection reply: {}", e)))?;

    Ok(faces.clamped())
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
