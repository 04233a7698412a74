//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use fovfinder::config::ConfigFile;
use fovfinder::geometry::{InstrumentConfig, ModeLayout};
use fovfinder::imagery::{HttpClient, ReqwestClient, ServerBank};
use fovfinder::resolver::SesameResolver;
use fovfinder::session::{Canvas, PollOutcome, RedrawOutcome, Session};

use crate::error::CliError;

/// Target and pointing arguments shared by commands that place the overlay.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Object name, resolved through Sesame unless --coords is given
    #[arg(long)]
    pub name: Option<String>,

    /// Coordinates as "RA Dec": RA in hours, Dec in degrees, sexagesimal (HH:MM:SS DD:MM:SS) or decimal
    #[arg(long, allow_hyphen_values = true)]
    pub coords: Option<String>,

    /// Telescope position angle in degrees
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub pa: f64,

    /// Readout layout: full, windowed:xsll,xsul,xslr,xsur,ys,nx,ny;... or drift:xsl,xsr,ys,nx,ny;...
    #[arg(long)]
    pub mode: Option<String>,
}

/// Instrument overrides on top of the `[instrument]` configuration section.
#[derive(Debug, Clone, Default, Args)]
pub struct InstrumentArgs {
    /// Plate scale in arcseconds per pixel
    #[arg(long)]
    pub px_scale: Option<f64>,

    /// Detector width in pixels
    #[arg(long)]
    pub nxtot: Option<u32>,

    /// Detector height in pixels
    #[arg(long)]
    pub nytot: Option<u32>,

    /// Rotator position angle offset in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub pa_offset: Option<f64>,
}

impl InstrumentArgs {
    /// Applies the overrides to the configured instrument.
    ///
    /// Changing the detector size moves the rotator center to the new
    /// detector center.
    pub fn apply(&self, config: &ConfigFile) -> Result<InstrumentConfig, CliError> {
        let mut instrument = config.instrument.clone();
        if let Some(scale) = self.px_scale {
            instrument.px_scale = scale;
        }
        if self.nxtot.is_some() || self.nytot.is_some() {
            instrument.nx_total = self.nxtot.unwrap_or(instrument.nx_total);
            instrument.ny_total = self.nytot.unwrap_or(instrument.ny_total);
            instrument.rotcen_x = instrument.nx_total as f64 / 2.0;
            instrument.rotcen_y = instrument.ny_total as f64 / 2.0;
        }
        if let Some(offset) = self.pa_offset {
            instrument.pa_offset = offset;
        }
        instrument.validate()?;
        Ok(instrument)
    }
}

/// Readout layout from the command line, falling back to the configuration.
pub fn resolve_layout(cli_mode: Option<&str>, config: &ConfigFile) -> Result<ModeLayout, CliError> {
    match cli_mode {
        Some(text) => Ok(text.parse()?),
        None => Ok(config.readout.clone()),
    }
}

/// HTTP client with the configured timeout.
pub fn http_client(config: &ConfigFile) -> Result<Arc<dyn HttpClient>, CliError> {
    let client = ReqwestClient::with_timeout(config.imagery.timeout_secs)?;
    Ok(Arc::new(client))
}

/// Server bank holding the built-in archives.
pub fn server_bank(client: Arc<dyn HttpClient>) -> Arc<ServerBank> {
    Arc::new(ServerBank::with_defaults(client))
}

/// Directory survey images are downloaded to, created if needed.
pub fn download_dir(config: &ConfigFile) -> Result<PathBuf, CliError> {
    let dir = config.imagery.download_dir();
    std::fs::create_dir_all(&dir).map_err(|e| {
        CliError::Config(format!(
            "cannot create download directory {}: {}",
            dir.display(),
            e
        ))
    })?;
    Ok(dir)
}

/// Points the session at the target given by name or coordinates, then sets
/// the position angle.
///
/// Coordinates win over the name; a name given alongside coordinates is
/// only used as a label.
pub fn apply_target<C: Canvas>(
    session: &mut Session<C>,
    args: &TargetArgs,
    client: Option<Arc<dyn HttpClient>>,
) -> Result<(), CliError> {
    match (&args.coords, &args.name) {
        (Some(coords), name) => {
            session.set_coordinates_text(coords)?;
            if let Some(name) = name {
                session.set_target_name(name.as_str());
            }
        }
        (None, Some(name)) => {
            let client = client.ok_or_else(|| {
                CliError::Usage("resolving a name needs network access".to_string())
            })?;
            let resolver = SesameResolver::new(client);
            session.resolve_target(&resolver, name)?;
        }
        (None, None) => {
            return Err(CliError::Usage(
                "a target is required: give --name or --coords".to_string(),
            ))
        }
    }
    if let RedrawOutcome::Failed(message) = session.set_position_angle(args.pa) {
        return Err(CliError::Usage(message));
    }
    Ok(())
}

/// Blocks on an outstanding image load behind a spinner.
pub fn wait_for_image<C: Canvas>(session: &mut Session<C>) -> PollOutcome {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(fovfinder::session::LOADING_MESSAGE);

    let outcome = session.finish_load(|state| {
        spinner.set_message(format!(
            "{} ({})",
            fovfinder::session::LOADING_MESSAGE,
            state.display_status()
        ));
    });
    spinner.finish_and_clear();
    outcome
}

/// Prints the result of a finished load; returns an error message if it failed.
pub fn report_poll(outcome: &PollOutcome) -> Option<String> {
    match outcome {
        PollOutcome::Idle | PollOutcome::Pending => None,
        PollOutcome::Loaded { path, redraw } => {
            print_success(&format!("Loaded {}", path.display()));
            report_redraw(redraw);
            None
        }
        PollOutcome::Failed { error, redraw } => {
            print_error(error);
            report_redraw(redraw);
            Some(error.clone())
        }
    }
}

/// Prints a redraw failure, if any.
pub fn report_redraw(outcome: &RedrawOutcome) {
    if let RedrawOutcome::Failed(message) = outcome {
        print_warning(message);
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// `label: value` line with the label dimmed.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<10} {}", style(format!("{}:", label)).dim(), value);
}

/// Prints the session's pointing and layout.
pub fn print_summary<C: Canvas>(session: &Session<C>) {
    let target = session.target();
    if let Some(name) = &target.name {
        print_field("Target", style(name).bold());
    }
    print_field("RA", session.ra_text());
    print_field("Dec", session.dec_text());
    print_field("PA", format!("{:.1}", target.pa));
    print_field("Layout", session.layout());
    print_field(
        "Image",
        session
            .image()
            .map(|i| format!("{}x{}", i.width(), i.height()))
            .unwrap_or_else(|| "(none)".to_string()),
    );
    if session.name_flagged() {
        print_warning("last name lookup failed");
    }
}
