//! CLI error type.

use std::fmt;

use fovfinder::chart::ChartError;
use fovfinder::config::ConfigError;
use fovfinder::coord::CoordError;
use fovfinder::geometry::GeometryError;
use fovfinder::imagery::FetchError;
use fovfinder::loader::LoadError;
use fovfinder::logging::LoggingError;
use fovfinder::reference::ImageError;
use fovfinder::render::RenderError;
use fovfinder::resolver::ResolveError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Bad configuration key or value given on the command line.
    Config(String),
    /// The configuration file could not be read or written.
    ConfigFile(ConfigError),
    /// Bad command line arguments.
    Usage(String),
    Coordinates(CoordError),
    Layout(GeometryError),
    Resolve(ResolveError),
    Fetch(FetchError),
    Load(LoadError),
    /// The survey image could not be loaded or projected on.
    Image(String),
    ReferenceImage(ImageError),
    Render(RenderError),
    Chart(ChartError),
    Logging(LoggingError),
    /// Interactive prompt failed.
    Prompt(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Coordinates(e) => write!(f, "Invalid coordinates: {}", e),
            CliError::Layout(e) => write!(f, "{}", e),
            CliError::Resolve(e) => write!(f, "Unable to resolve target: {}", e),
            CliError::Fetch(e) => write!(f, "Image fetch failed: {}", e),
            CliError::Load(e) => write!(f, "{}", e),
            CliError::Image(msg) => write!(f, "{}", msg),
            CliError::ReferenceImage(e) => write!(f, "{}", e),
            CliError::Render(e) => write!(f, "{}", e),
            CliError::Chart(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Prompt(msg) => write!(f, "Prompt failed: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(e: $source) -> Self {
                    CliError::$variant(e)
                }
            }
        )*
    };
}

impl_from! {
    ConfigError => ConfigFile,
    CoordError => Coordinates,
    GeometryError => Layout,
    ResolveError => Resolve,
    FetchError => Fetch,
    LoadError => Load,
    ImageError => ReferenceImage,
    RenderError => Render,
    ChartError => Chart,
    LoggingError => Logging,
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        CliError::Prompt(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = CliError::from(FetchError::UnknownServer("xyz".to_string()));
        let message = err.to_string();
        assert!(message.starts_with("Image fetch failed: "));
        assert!(!message.contains("HTTP client"));
    }
}
