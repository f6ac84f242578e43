//! Frame metadata documents.
//!
//! Each frame ships a JSON sidecar describing where the rendered image sits
//! on the map and which elevation it was cut at. Field names mirror the
//! remote documents verbatim.

use serde::{Deserialize, Serialize};

/// `[longitude, latitude]` pair, in the order the map surface consumes.
pub type LonLat = [f64; 2];

/// Geographic corners of a rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub nw: LonLat,
    pub ne: LonLat,
    pub se: LonLat,
    pub sw: LonLat,
}

impl BoundingBox {
    /// Corner array in NW, NE, SE, SW order for `MapSurface::set_coordinates`.
    pub fn corners(&self) -> [LonLat; 4] {
        [self.nw, self.ne, self.se, self.sw]
    }
}

/// Metadata sidecar for one renderable frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub bounding_box_lon_lat: BoundingBox,
    pub elevation_angle_degrees: f64,
    /// Total sweeps in the volume this frame belongs to.
    pub sweeps: u32,
}
