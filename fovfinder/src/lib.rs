//! fovfinder - instrument field-of-view planning
//!
//! Overlays a detector's chip outline and readout windows on a reference sky
//! image at a chosen pointing and position angle, and writes annotated
//! finding charts for use at the telescope.
//!
//! The pieces, bottom up:
//!
//! - [`coord`]: angle units, sexagesimal text and small spherical helpers
//! - [`geometry`]: instrument description, readout layouts and sky polygons
//! - [`projection`]: sky-to-pixel projection and rotation of overlay shapes
//! - [`reference`]: FITS reference images and their TAN world coordinates
//! - [`imagery`]: image servers and the HTTP client they share
//! - [`resolver`]: object name lookup
//! - [`loader`]: background image download with polling
//! - [`session`]: the planning state that ties it all to a canvas
//! - [`render`] and [`chart`]: raster output

pub mod chart;
pub mod config;
pub mod coord;
pub mod geometry;
pub mod imagery;
pub mod loader;
pub mod logging;
pub mod projection;
pub mod reference;
pub mod render;
pub mod resolver;
pub mod session;

/// Crate version, for logs and the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
