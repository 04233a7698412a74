//! Planning session
//!
//! A [`Session`] owns the target, the readout layout and the displayed
//! reference image, and keeps the detector overlay on its [`Canvas`] in step
//! with them. Every mutator ends in an explicit [`Session::redraw`]; image
//! loads complete through [`Session::poll_load`], which redraws the same way.

mod canvas;

pub use canvas::{Canvas, CanvasEvent, RecordingCanvas};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::coord::{format_sexagesimal, parse_coordinates, AngleUnit, CoordError};
use crate::geometry::{build_mode_layout, InstrumentConfig, ModeLayout, TargetState};
use crate::imagery::{FetchError, ImageQuery, ServerBank};
use crate::loader::{ImageLoader, LoadError, LoadPoll, LoadState, LoaderConfig};
use crate::projection::{
    effective_rotation, project_shapes, rotate, PixelShape, ProjectionError, SkyToPixel,
};
use crate::reference::{ImageError, ReferenceImage, BLANK_FIELD_SCALE_DEG};
use crate::resolver::{NameResolver, ResolveError};

/// Canvas tag of the detector overlay.
pub const OVERLAY_TAG: &str = "ccd_overlay";

/// Message shown while a survey image is fetched.
pub const LOADING_MESSAGE: &str = "Getting image; please wait...";

/// File name survey images are saved under.
pub const SKY_IMAGE_FILE: &str = "sky.fits";

/// What a redraw did.
#[derive(Debug, Clone, PartialEq)]
pub enum RedrawOutcome {
    /// No reference image, nothing drawn.
    Skipped,
    /// Overlay replaced.
    Drawn,
    /// Drawing failed; the previous overlay is untouched.
    Failed(String),
}

/// What a load poll did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No load outstanding.
    Idle,
    /// Still fetching.
    Pending,
    /// A new image was loaded and drawn on.
    Loaded { path: PathBuf, redraw: RedrawOutcome },
    /// The fetch or the file load failed; the previous image stays.
    Failed { error: String, redraw: RedrawOutcome },
}

/// Interactive planning state for one instrument.
pub struct Session<C: Canvas> {
    config: InstrumentConfig,
    layout: ModeLayout,
    target: TargetState,
    image: Option<ReferenceImage>,
    canvas: C,
    loader: ImageLoader,
    name_flagged: bool,
}

impl<C: Canvas> Session<C> {
    pub fn new(config: InstrumentConfig, layout: ModeLayout, canvas: C) -> Self {
        Self::with_loader_config(config, layout, canvas, LoaderConfig::default())
    }

    pub fn with_loader_config(
        config: InstrumentConfig,
        layout: ModeLayout,
        canvas: C,
        loader_config: LoaderConfig,
    ) -> Self {
        tracing::debug!(instrument = %config.name, layout = %layout, "New session");
        Self {
            config,
            layout,
            target: TargetState::default(),
            image: None,
            canvas,
            loader: ImageLoader::new(loader_config),
            name_flagged: false,
        }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    pub fn layout(&self) -> &ModeLayout {
        &self.layout
    }

    pub fn target(&self) -> &TargetState {
        &self.target
    }

    pub fn image(&self) -> Option<&ReferenceImage> {
        self.image.as_ref()
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }

    pub fn load_state(&self) -> &LoadState {
        self.loader.state()
    }

    /// Loader, for callers that drive the polling cadence.
    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Whether the last name lookup failed.
    pub fn name_flagged(&self) -> bool {
        self.name_flagged
    }

    /// Moves the target.
    pub fn set_target(&mut self, ra: f64, dec: f64) -> RedrawOutcome {
        self.target.ra = ra;
        self.target.dec = dec;
        self.redraw()
    }

    pub fn set_target_name(&mut self, name: impl Into<String>) -> RedrawOutcome {
        let name = name.into();
        self.target.name = if name.trim().is_empty() { None } else { Some(name) };
        self.redraw()
    }

    /// Sets the telescope position angle, normalized into [0, 360).
    ///
    /// A non-finite angle is refused; the target and overlay are unchanged.
    pub fn set_position_angle(&mut self, pa: f64) -> RedrawOutcome {
        if !pa.is_finite() {
            let message = format!("position angle {} is not finite", pa);
            tracing::warn!("{}", message);
            return RedrawOutcome::Failed(message);
        }
        self.target = self.target.clone().with_pa(pa);
        self.redraw()
    }

    pub fn set_layout(&mut self, layout: ModeLayout) -> RedrawOutcome {
        self.layout = layout;
        self.redraw()
    }

    /// Moves the target to coordinates typed as text.
    ///
    /// The target is unchanged when the text does not parse.
    pub fn set_coordinates_text(&mut self, text: &str) -> Result<RedrawOutcome, CoordError> {
        let (ra, dec) = parse_coordinates(text)?;
        Ok(self.set_target(ra, dec))
    }

    /// Looks up `name` and moves the target there.
    ///
    /// On failure the name is flagged and the target is unchanged.
    pub fn resolve_target<R: NameResolver + ?Sized>(
        &mut self,
        resolver: &R,
        name: &str,
    ) -> Result<RedrawOutcome, ResolveError> {
        match resolver.resolve(name) {
            Ok((ra, dec)) => {
                self.name_flagged = false;
                self.target.name = Some(name.trim().to_string());
                self.target.ra = ra;
                self.target.dec = dec;
                Ok(self.redraw())
            }
            Err(err) => {
                tracing::warn!(name, error = %err, "Unable to resolve target");
                self.name_flagged = true;
                Err(err)
            }
        }
    }

    /// Target RA as sexagesimal hours.
    pub fn ra_text(&self) -> String {
        format_sexagesimal(self.target.ra, AngleUnit::Hours, 2)
    }

    /// Target Dec as sexagesimal degrees.
    pub fn dec_text(&self) -> String {
        format_sexagesimal(self.target.dec, AngleUnit::Degrees, 1)
    }

    /// Survey field for the current target: twice the larger detector
    /// dimension on a side.
    pub fn image_query(&self) -> ImageQuery {
        let fov_deg = 2.0 * self.config.fov_x().max(self.config.fov_y());
        ImageQuery::square(self.ra_text(), self.dec_text(), 60.0 * fov_deg)
    }

    /// Computes the overlay for the current state without drawing it.
    pub fn project_overlay(&self) -> Result<Vec<PixelShape>, ProjectionError> {
        let image = self.image.as_ref().ok_or(ProjectionError::NoImage)?;
        overlay_shapes(&self.target, &self.config, &self.layout, image)
    }

    /// Rebuilds the overlay and replaces it on the canvas.
    ///
    /// Skipped without a reference image. Errors are logged and reported,
    /// never propagated.
    pub fn redraw(&mut self) -> RedrawOutcome {
        match self.project_overlay() {
            Ok(shapes) => {
                tracing::debug!(shapes = shapes.len(), pa = self.target.pa, "Drawing CCD overlay");
                self.canvas.replace_overlay(OVERLAY_TAG, shapes);
                RedrawOutcome::Drawn
            }
            Err(ProjectionError::NoImage) => {
                tracing::debug!("No reference image, overlay not drawn");
                RedrawOutcome::Skipped
            }
            Err(err) => {
                let message = format!("failed to draw CCD: {}", err);
                tracing::error!("{}", message);
                RedrawOutcome::Failed(message)
            }
        }
    }

    /// Shows an already loaded image and redraws on it.
    pub fn set_image(&mut self, image: ReferenceImage) -> RedrawOutcome {
        self.canvas.display_image(&image);
        self.image = Some(image);
        self.redraw()
    }

    /// Starts fetching a survey image of the current field.
    ///
    /// The image is saved as `sky.fits` in `tmpdir`, replacing any earlier
    /// file. Completion is picked up by [`poll_load`](Self::poll_load).
    pub fn load_image(
        &mut self,
        bank: Arc<ServerBank>,
        server: &str,
        tmpdir: &Path,
    ) -> Result<(), LoadError> {
        if self.loader.is_loading() {
            return Err(LoadError::AlreadyLoading);
        }

        self.canvas.show_message(Some(LOADING_MESSAGE));

        let query = self.image_query();
        let dest = tmpdir.join(SKY_IMAGE_FILE);
        let server = server.to_string();
        tracing::info!(
            server = %server,
            ra = %query.ra,
            dec = %query.dec,
            size_arcmin = query.width_arcmin,
            "Loading survey image"
        );

        let started = self.loader.request(move || {
            if dest.exists() {
                std::fs::remove_file(&dest).map_err(|source| FetchError::Io {
                    path: dest.clone(),
                    source,
                })?;
            }
            bank.get_image(&server, &dest, &query)
        });

        if started.is_err() {
            self.canvas.show_message(None);
        }
        started
    }

    /// Checks the outstanding load and finishes it if the worker is done.
    ///
    /// Whatever the result, a finished load redraws and clears the loading
    /// message exactly once.
    pub fn poll_load(&mut self) -> PollOutcome {
        let outcome = match self.loader.poll() {
            LoadPoll::Idle => return PollOutcome::Idle,
            LoadPoll::Pending => return PollOutcome::Pending,
            LoadPoll::Ready(path) => match ReferenceImage::open(&path) {
                Ok(image) => {
                    self.canvas.display_image(&image);
                    self.image = Some(image);
                    let redraw = self.redraw();
                    PollOutcome::Loaded { path, redraw }
                }
                Err(err) => {
                    let error = format!("failed to load file {}: {}", path.display(), err);
                    tracing::error!("{}", error);
                    let redraw = self.redraw();
                    PollOutcome::Failed { error, redraw }
                }
            },
            LoadPoll::Failed(err) => {
                let error = format!("Failed to download sky image: {}", err);
                let redraw = self.redraw();
                PollOutcome::Failed { error, redraw }
            }
        };

        self.canvas.show_message(None);
        outcome
    }

    /// Polls on the loader's cadence until the outstanding load finishes.
    ///
    /// `on_wait` runs before every sleep.
    pub fn finish_load(&mut self, mut on_wait: impl FnMut(&LoadState)) -> PollOutcome {
        loop {
            if !self.loader.is_loading() {
                return self.poll_load();
            }
            on_wait(self.loader.state());
            std::thread::sleep(self.loader.next_poll_delay());
            match self.poll_load() {
                PollOutcome::Pending => continue,
                done => return done,
            }
        }
    }

    /// Replaces the image with a blank field centred on the target.
    pub fn create_blank_image(&mut self) -> Result<RedrawOutcome, ImageError> {
        let fov_deg = 2.0 * self.config.fov_x().max(self.config.fov_y());
        let image = ReferenceImage::blank_field(
            self.target.ra,
            self.target.dec,
            fov_deg,
            BLANK_FIELD_SCALE_DEG,
        )?;
        tracing::info!(
            width = image.width(),
            ra = self.target.ra,
            dec = self.target.dec,
            "Created blank field"
        );
        Ok(self.set_image(image))
    }
}

/// Builds, projects and rotates the overlay for one state.
fn overlay_shapes<W: SkyToPixel + ?Sized>(
    target: &TargetState,
    config: &InstrumentConfig,
    layout: &ModeLayout,
    image: &W,
) -> Result<Vec<PixelShape>, ProjectionError> {
    let sky = build_mode_layout(target, config, layout);
    let mut shapes = project_shapes(&sky, image)?;
    let (cx, cy) = image.sky_to_pixel(target.ra, target.dec)?;
    rotate(&mut shapes, effective_rotation(target.pa, config), cx, cy);

    let finite = shapes
        .iter()
        .flat_map(|s| s.points.iter())
        .all(|(x, y)| x.is_finite() && y.is_finite());
    if !finite {
        return Err(ProjectionError::NonFinite {
            ra: target.ra,
            dec: target.dec,
        });
    }
    Ok(shapes)
}
