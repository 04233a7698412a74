//! Finder command - write an annotated finding chart from a FITS image.

use std::path::PathBuf;

use clap::Args;

use fovfinder::chart::{find_font, make_finder};
use fovfinder::config::ConfigFile;
use fovfinder::reference::ReferenceImage;
use fovfinder::render::{OverlayStyle, RasterCanvas};
use fovfinder::session::{RedrawOutcome, Session};

use super::common::{print_success, report_redraw, resolve_layout, InstrumentArgs};
use crate::error::CliError;

/// Arguments of `fovfinder finder`.
#[derive(Debug, Args)]
pub struct FinderArgs {
    /// FITS reference image with a TAN world coordinate system
    pub image: PathBuf,

    /// Object name for the label
    #[arg(long, default_value = "Target")]
    pub name: String,

    /// Target as "RA Dec"; defaults to the image center
    #[arg(long, allow_hyphen_values = true)]
    pub coords: Option<String>,

    /// Telescope position angle in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pa: f64,

    /// Readout layout (default from config)
    #[arg(long)]
    pub mode: Option<String>,

    #[command(flatten)]
    pub instrument: InstrumentArgs,

    /// Leave the detector overlay off the chart
    #[arg(long)]
    pub no_overlay: bool,

    /// TrueType font for the label (default from config, else the bundled font)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Output path; `.jpg` is appended when it has no extension
    #[arg(short, long, default_value = "finder.jpg")]
    pub output: PathBuf,
}

/// Run the finder command.
pub fn run(args: FinderArgs, config: &ConfigFile) -> Result<(), CliError> {
    let font_path = args.font.as_deref().or(config.chart.font.as_deref());
    let font = find_font(font_path)?;

    let image = ReferenceImage::open(&args.image)?;
    let (ra, dec) = match &args.coords {
        Some(text) => fovfinder::coord::parse_coordinates(text)?,
        None => image
            .wcs()
            .pixel_to_sky((image.width() as f64 - 1.0) / 2.0, (image.height() as f64 - 1.0) / 2.0),
    };

    let instrument = args.instrument.apply(config)?;
    let layout = resolve_layout(args.mode.as_deref(), config)?;
    let mut session = Session::new(instrument, layout, RasterCanvas::new(OverlayStyle::default()));
    session.set_target(ra, dec);
    session.set_target_name(args.name.as_str());
    if let RedrawOutcome::Failed(message) = session.set_position_angle(args.pa) {
        return Err(CliError::Usage(message));
    }

    let chart_image = if args.no_overlay {
        image::DynamicImage::ImageLuma8(image.to_luma8())
    } else {
        let redraw = session.set_image(image);
        report_redraw(&redraw);
        if let RedrawOutcome::Failed(message) = redraw {
            return Err(CliError::Image(message));
        }
        image::DynamicImage::ImageRgba8(session.canvas().render()?)
    };

    let written = make_finder(
        &chart_image,
        &args.name,
        &session.ra_text(),
        &session.dec_text(),
        session.target().pa,
        &font,
        &args.output,
    )?;
    print_success(&format!("Wrote finding chart {}", written.display()));
    Ok(())
}
