//! Map surface contract.
//!
//! The rendering surface is an external collaborator: the engine pushes
//! "set image" and "set coordinates" commands at it and reads nothing
//! back. Hosts adapt their map widget (or a recording stub in tests)
//! behind this trait.

use crate::data::LonLat;

/// Push-only handle to the external map overlay.
pub trait MapSurface {
    /// Replace the overlay image. The URL is a self-contained
    /// `data:image/png;base64,...` payload.
    fn set_image(&mut self, data_url: &str);

    /// Re-anchor the overlay to new geographic corners, in
    /// NW, NE, SE, SW order.
    fn set_coordinates(&mut self, corners: [LonLat; 4]);
}
