//! Plan command - render the detector overlay for one pointing.

use std::path::PathBuf;

use clap::Args;

use fovfinder::config::ConfigFile;
use fovfinder::render::{OverlayStyle, RasterCanvas};
use fovfinder::session::{PollOutcome, RedrawOutcome, Session};

use super::common::{
    apply_target, download_dir, http_client, print_success, print_summary, report_redraw,
    resolve_layout, server_bank, wait_for_image, InstrumentArgs, TargetArgs,
};
use crate::error::CliError;

/// Arguments of `fovfinder plan`.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub instrument: InstrumentArgs,

    /// Image server short name (default from config)
    #[arg(long)]
    pub server: Option<String>,

    /// Draw on a blank field instead of downloading a survey image
    #[arg(long)]
    pub blank: bool,

    /// Output image; the format follows the extension
    #[arg(short, long, default_value = "fov.png")]
    pub output: PathBuf,
}

/// Run the plan command.
pub fn run(args: PlanArgs, config: &ConfigFile) -> Result<(), CliError> {
    let instrument = args.instrument.apply(config)?;
    let layout = resolve_layout(args.target.mode.as_deref(), config)?;
    let client = http_client(config)?;

    let mut session = Session::new(instrument, layout, RasterCanvas::new(OverlayStyle::default()));
    apply_target(&mut session, &args.target, Some(client.clone()))?;

    if args.blank {
        let redraw = session.create_blank_image()?;
        report_redraw(&redraw);
    } else {
        let server = args
            .server
            .unwrap_or_else(|| config.imagery.server.clone());
        let bank = server_bank(client);
        if !bank.contains(&server) {
            return Err(CliError::Usage(format!(
                "unknown image server '{}'; available: {}",
                server,
                bank.server_names().join(", ")
            )));
        }

        session.load_image(bank, &server, &download_dir(config)?)?;
        match wait_for_image(&mut session) {
            PollOutcome::Loaded { path, redraw } => {
                print_success(&format!("Loaded {}", path.display()));
                if let RedrawOutcome::Failed(message) = redraw {
                    return Err(CliError::Image(message));
                }
            }
            PollOutcome::Failed { error, .. } => return Err(CliError::Image(error)),
            PollOutcome::Idle | PollOutcome::Pending => {}
        }
    }

    print_summary(&session);
    session.canvas().save(&args.output)?;
    print_success(&format!("Wrote {}", args.output.display()));
    Ok(())
}
