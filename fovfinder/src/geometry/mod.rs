//! Detector window geometry on the sky
//!
//! Converts instrument pixel-space window definitions into sky-plane
//! polygons around a target, and assembles the compound overlay for a full
//! readout mode.
//!
//! # Layout
//!
//! ```text
//! ModeLayout ──► WindowSpec (pixels) ──► window_to_sky_polygon ──► SkyPolygon
//!                                         (rotator center, plate scale,
//!                                          E-W flip, tangent offsets)
//! ```
//!
//! Offsets are measured from the rotator center and applied on the tangent
//! plane at the target; window corners are then built by successive offsets
//! from the lower-left corner so that shapes stay accurate at any declination.

mod shapes;
mod types;

pub use shapes::{ShapeRole, SkyOutline, SkyPath, SkyPolygon, SkyShape};
pub use types::{
    DriftPair, GeometryError, InstrumentConfig, ModeLayout, TargetState, WindowPair, WindowSpec,
};

use crate::coord::{add_offset_radec, pixels_to_degrees, SkyPoint};

/// Computes the sky polygon covered by one readout window.
///
/// Windows with negative sizes are first normalized to the same pixel area
/// anchored at its lower-left corner, so every result starts at the
/// lower-left corner and runs counterclockwise in the detector frame.
///
/// # Arguments
///
/// * `window` - Window start and size in detector pixels
/// * `target` - Pointing; the rotator center lands on the target position
/// * `config` - Instrument plate scale, rotator center and flips
pub fn window_to_sky_polygon(
    window: WindowSpec,
    target: &TargetState,
    config: &InstrumentConfig,
) -> SkyPolygon {
    let window = window.normalized();

    let mut xoff_deg = pixels_to_degrees(window.x - config.rotcen_x, config.px_scale);
    let yoff_deg = pixels_to_degrees(window.y - config.rotcen_y, config.px_scale);
    if !config.flip_ew {
        xoff_deg = -xoff_deg;
    }

    let (ll_ra, ll_dec) = add_offset_radec(target.ra, target.dec, xoff_deg, yoff_deg);

    let mut xsize_deg = pixels_to_degrees(window.nx, config.px_scale);
    let ysize_deg = pixels_to_degrees(window.ny, config.px_scale);
    if !config.flip_ew {
        xsize_deg = -xsize_deg;
    }

    SkyPolygon::from_corners([
        (ll_ra, ll_dec),
        add_offset_radec(ll_ra, ll_dec, xsize_deg, 0.0),
        add_offset_radec(ll_ra, ll_dec, xsize_deg, ysize_deg),
        add_offset_radec(ll_ra, ll_dec, 0.0, ysize_deg),
    ])
}

/// Sky position of the detector center.
///
/// The target sits on the rotator center, which need not be the middle of
/// the chip.
pub fn chip_center(target: &TargetState, config: &InstrumentConfig) -> SkyPoint {
    let xoff_pix = config.nx_total as f64 / 2.0 - config.rotcen_x;
    let yoff_pix = config.ny_total as f64 / 2.0 - config.rotcen_y;

    let mut xoff_deg = pixels_to_degrees(xoff_pix, config.px_scale);
    let yoff_deg = pixels_to_degrees(yoff_pix, config.px_scale);
    if !config.flip_ew {
        xoff_deg = -xoff_deg;
    }

    add_offset_radec(target.ra, target.dec, xoff_deg, yoff_deg).into()
}

/// Window specs for every readout window in a layout, in drawing order.
///
/// Windowed pairs read out through two ports; the upper windows are anchored
/// from the opposite detector edge with their height negated.
pub fn layout_windows(layout: &ModeLayout, config: &InstrumentConfig) -> Vec<WindowSpec> {
    let ny_total = config.ny_total as f64;
    match layout {
        ModeLayout::FullFrame => Vec::new(),
        ModeLayout::Windowed(pairs) => pairs
            .iter()
            .flat_map(|p| {
                [
                    WindowSpec::new(p.xsll, p.ys, p.nx, p.ny),
                    WindowSpec::new(p.xsul, ny_total - p.ys, p.nx, -p.ny),
                    WindowSpec::new(p.xslr, p.ys, p.nx, p.ny),
                    WindowSpec::new(p.xsur, ny_total - p.ys, p.nx, -p.ny),
                ]
            })
            .collect(),
        ModeLayout::Drift(pairs) => pairs
            .iter()
            .flat_map(|p| {
                [
                    WindowSpec::new(p.xsl, p.ys, p.nx, p.ny),
                    WindowSpec::new(p.xsr, p.ys, p.nx, p.ny),
                ]
            })
            .collect(),
    }
}

/// Builds every sky shape for the current readout mode.
///
/// The result always starts with the full-frame outline and the two dashed
/// centerlines through the chip center (along detector y, then x), followed
/// by the mode's readout windows.
pub fn build_mode_layout(
    target: &TargetState,
    config: &InstrumentConfig,
    layout: &ModeLayout,
) -> Vec<SkyShape> {
    let full_frame = WindowSpec::new(0.0, 0.0, config.nx_total as f64, config.ny_total as f64);

    let mut shapes = Vec::with_capacity(3 + 4 * layout.pair_count());
    shapes.push(SkyShape::polygon(
        ShapeRole::Chip,
        window_to_sky_polygon(full_frame, target, config),
    ));

    let center = chip_center(target, config);
    let half_x = config.fov_x() / 2.0;
    let half_y = config.fov_y() / 2.0;
    let offset = |dx: f64, dy: f64| -> SkyPoint {
        add_offset_radec(center.ra, center.dec, dx, dy).into()
    };
    shapes.push(SkyShape::path(
        ShapeRole::Centerline,
        SkyPath::new(vec![offset(0.0, -half_y), offset(0.0, half_y)]),
    ));
    shapes.push(SkyShape::path(
        ShapeRole::Centerline,
        SkyPath::new(vec![offset(-half_x, 0.0), offset(half_x, 0.0)]),
    ));

    shapes.extend(
        layout_windows(layout, config)
            .into_iter()
            .map(|w| SkyShape::polygon(ShapeRole::Window, window_to_sky_polygon(w, target, config))),
    );

    tracing::debug!(
        instrument = %config.name,
        layout = %layout,
        shapes = shapes.len(),
        "Built mode layout"
    );

    shapes
}
