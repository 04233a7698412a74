//! Shell command - interactive planning session.
//!
//! Survey downloads run in the background; the loader is polled before
//! every prompt so a finished image is picked up as soon as the user comes
//! back to the keyboard.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;

use fovfinder::chart::{find_font, make_finder};
use fovfinder::config::ConfigFile;
use fovfinder::imagery::{HttpClient, ServerBank};
use fovfinder::render::{OverlayStyle, RasterCanvas};
use fovfinder::resolver::SesameResolver;
use fovfinder::session::{PollOutcome, Session};

use super::common::{
    download_dir, http_client, print_error, print_success, print_summary, print_warning,
    report_poll, report_redraw, resolve_layout, server_bank, wait_for_image, InstrumentArgs,
};
use crate::error::CliError;

const HELP: &str = "\
Commands:
  name <object>        resolve an object name and move there
  coords <ra> <dec>    move to coordinates (sexagesimal or degrees)
  pa <degrees>         set the telescope position angle
  mode <layout>        set the readout layout (full, windowed:..., drift:...)
  load [server]        fetch a survey image in the background
  wait                 block until the current fetch finishes
  blank                draw on a blank field instead
  save [path]          write the overlay image (default fov.png)
  finder [path]        write a finding chart (default finder.jpg)
  status               show the current pointing
  help                 show this text
  quit                 leave the shell";

/// Arguments of `fovfinder shell`.
#[derive(Debug, Args)]
pub struct ShellArgs {
    /// Initial readout layout (default from config)
    #[arg(long)]
    pub mode: Option<String>,

    #[command(flatten)]
    pub instrument: InstrumentArgs,
}

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Name(String),
    Coords(String),
    Pa(f64),
    Mode(String),
    Load(Option<String>),
    Wait,
    Blank,
    Save(Option<PathBuf>),
    Finder(Option<PathBuf>),
    Status,
    Help,
    Quit,
    Empty,
}

impl ShellCommand {
    /// Parses one input line.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let rest_opt = || (!rest.is_empty()).then(|| rest.to_string());
        let required = |what: &str| {
            if rest.is_empty() {
                Err(format!("'{}' needs {}", word, what))
            } else {
                Ok(rest.to_string())
            }
        };

        match word.to_lowercase().as_str() {
            "" => Ok(ShellCommand::Empty),
            "name" => required("an object name").map(ShellCommand::Name),
            "coords" | "c" => required("coordinates").map(ShellCommand::Coords),
            "pa" => {
                let value = required("an angle")?;
                match value.parse::<f64>() {
                    Ok(pa) if pa.is_finite() => Ok(ShellCommand::Pa(pa)),
                    _ => Err(format!("'{}' is not an angle", value)),
                }
            }
            "mode" => required("a layout").map(ShellCommand::Mode),
            "load" => Ok(ShellCommand::Load(rest_opt())),
            "wait" => Ok(ShellCommand::Wait),
            "blank" => Ok(ShellCommand::Blank),
            "save" => Ok(ShellCommand::Save(rest_opt().map(PathBuf::from))),
            "finder" => Ok(ShellCommand::Finder(rest_opt().map(PathBuf::from))),
            "status" | "s" => Ok(ShellCommand::Status),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "exit" | "q" => Ok(ShellCommand::Quit),
            other => Err(format!("unknown command '{}'; type 'help'", other)),
        }
    }
}

struct Shell<'a> {
    config: &'a ConfigFile,
    session: Session<RasterCanvas>,
    client: Arc<dyn HttpClient>,
    bank: Arc<ServerBank>,
}

impl Shell<'_> {
    /// Runs one command; returns false to leave the shell.
    fn execute(&mut self, command: ShellCommand) -> Result<bool, CliError> {
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => return Ok(false),
            ShellCommand::Status => {
                print_summary(&self.session);
                println!(
                    "  {:<10} {}",
                    style("Loader:").dim(),
                    self.session.load_state().display_status()
                );
            }
            ShellCommand::Name(name) => {
                let resolver = SesameResolver::new(self.client.clone());
                let redraw = self.session.resolve_target(&resolver, &name)?;
                report_redraw(&redraw);
                print_summary(&self.session);
            }
            ShellCommand::Coords(text) => {
                let redraw = self.session.set_coordinates_text(&text)?;
                report_redraw(&redraw);
                print_summary(&self.session);
            }
            ShellCommand::Pa(pa) => report_redraw(&self.session.set_position_angle(pa)),
            ShellCommand::Mode(text) => {
                let layout = resolve_layout(Some(&text), self.config)?;
                report_redraw(&self.session.set_layout(layout));
            }
            ShellCommand::Load(server) => {
                let server = server.unwrap_or_else(|| self.config.imagery.server.clone());
                let dir = download_dir(self.config)?;
                self.session.load_image(self.bank.clone(), &server, &dir)?;
                println!("{}", style(fovfinder::session::LOADING_MESSAGE).dim());
            }
            ShellCommand::Wait => {
                let outcome = wait_for_image(&mut self.session);
                if outcome == PollOutcome::Idle {
                    print_warning("nothing is loading");
                }
                report_poll(&outcome);
            }
            ShellCommand::Blank => {
                report_redraw(&self.session.create_blank_image()?);
                print_success("Blank field ready");
            }
            ShellCommand::Save(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from("fov.png"));
                self.session.canvas().save(&path)?;
                print_success(&format!("Wrote {}", path.display()));
            }
            ShellCommand::Finder(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from("finder.jpg"));
                let font = find_font(self.config.chart.font.as_deref())?;
                let chart = image::DynamicImage::ImageRgba8(self.session.canvas().render()?);
                let name = self
                    .session
                    .target()
                    .name
                    .clone()
                    .unwrap_or_else(|| "Target".to_string());
                let written = make_finder(
                    &chart,
                    &name,
                    &self.session.ra_text(),
                    &self.session.dec_text(),
                    self.session.target().pa,
                    &font,
                    &path,
                )?;
                print_success(&format!("Wrote finding chart {}", written.display()));
            }
        }
        Ok(true)
    }
}

/// Run the interactive shell.
pub fn run(args: ShellArgs, config: &ConfigFile) -> Result<(), CliError> {
    let instrument = args.instrument.apply(config)?;
    let layout = resolve_layout(args.mode.as_deref(), config)?;
    let client = http_client(config)?;

    let mut shell = Shell {
        config,
        session: Session::new(instrument, layout, RasterCanvas::new(OverlayStyle::default())),
        bank: server_bank(client.clone()),
        client,
    };

    println!(
        "{} {}  (type 'help' for commands)",
        style("fovfinder").bold(),
        fovfinder::VERSION
    );
    let theme = ColorfulTheme::default();

    loop {
        report_poll(&shell.session.poll_load());

        let line: String = Input::with_theme(&theme)
            .with_prompt(shell.session.config().name.as_str())
            .allow_empty(true)
            .interact_text()?;

        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                print_error(&message);
                continue;
            }
        };

        match shell.execute(command) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => print_error(&e.to_string()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ShellCommand::parse("name  M 1 "),
            Ok(ShellCommand::Name("M 1".to_string()))
        );
        assert_eq!(
            ShellCommand::parse("coords 05:34:31.9 +22:00:52"),
            Ok(ShellCommand::Coords("05:34:31.9 +22:00:52".to_string()))
        );
        assert_eq!(ShellCommand::parse("PA -15"), Ok(ShellCommand::Pa(-15.0)));
        assert_eq!(ShellCommand::parse("load"), Ok(ShellCommand::Load(None)));
        assert_eq!(
            ShellCommand::parse("load eso"),
            Ok(ShellCommand::Load(Some("eso".to_string())))
        );
        assert_eq!(
            ShellCommand::parse("save out.png"),
            Ok(ShellCommand::Save(Some(PathBuf::from("out.png"))))
        );
        assert_eq!(ShellCommand::parse("   "), Ok(ShellCommand::Empty));
        assert_eq!(ShellCommand::parse("q"), Ok(ShellCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert!(ShellCommand::parse("name").is_err());
        assert!(ShellCommand::parse("pa east").is_err());
        assert!(ShellCommand::parse("pa NaN").is_err());
        assert!(ShellCommand::parse("pa inf").is_err());
        assert!(ShellCommand::parse("teleport").is_err());
    }
}
