//! Resolve command - look up an object name.

use console::style;

use fovfinder::config::ConfigFile;
use fovfinder::coord::{format_sexagesimal, AngleUnit};
use fovfinder::resolver::{NameResolver, SesameResolver};

use super::common::{http_client, print_field};
use crate::error::CliError;

/// Run the resolve command.
pub fn run(name: &str, config: &ConfigFile) -> Result<(), CliError> {
    let resolver = SesameResolver::new(http_client(config)?);
    let (ra, dec) = resolver.resolve(name)?;

    println!("{}", style(name).bold());
    print_field("RA", format_sexagesimal(ra, AngleUnit::Hours, 2));
    print_field("Dec", format_sexagesimal(dec, AngleUnit::Degrees, 1));
    print_field("Degrees", format!("{:.5} {:+.5}", ra, dec));
    Ok(())
}
