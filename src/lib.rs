//! Coordinate-centered HiPS mosaic engine.
//!
//! Tessella resolves a target sky position to a nested HEALPix tile,
//! plans the 3×3 grid of neighbouring HiPS tiles around it, fetches
//! them sequentially, and assembles a mosaic cropped so the requested
//! coordinates land on the exact center pixel.

pub mod coords;
pub mod fetch;
pub mod healpix;
pub mod mosaic;
pub mod neighbors;
pub mod plan;
pub mod sphere;
pub mod survey;
pub mod workflow;
