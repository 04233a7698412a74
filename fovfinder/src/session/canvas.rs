//! Display surface the session draws on

use crate::projection::PixelShape;
use crate::reference::ReferenceImage;

/// Something that can show a reference image with a tagged overlay.
///
/// The session never reads back from the canvas; it only pushes state.
pub trait Canvas {
    /// Shows or clears (`None`) a transient status message.
    fn show_message(&mut self, message: Option<&str>);

    /// Displays a newly loaded reference image.
    fn display_image(&mut self, image: &ReferenceImage);

    /// Removes everything tagged `tag` and draws `shapes` in its place.
    fn replace_overlay(&mut self, tag: &str, shapes: Vec<PixelShape>);
}

/// One call made on a [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    Message(Option<String>),
    Image { width: usize, height: usize },
    Overlay { tag: String, shapes: usize },
}

/// Canvas that records calls and keeps the latest overlay.
///
/// Used by headless runs and tests.
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    events: Vec<CanvasEvent>,
    overlay: Option<(String, Vec<PixelShape>)>,
    message: Option<String>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CanvasEvent] {
        &self.events
    }

    /// Shapes of the current overlay, if one was drawn.
    pub fn overlay(&self) -> Option<&[PixelShape]> {
        self.overlay.as_ref().map(|(_, shapes)| shapes.as_slice())
    }

    /// Message currently on screen.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Number of times the message was cleared.
    pub fn message_clears(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, CanvasEvent::Message(None)))
            .count()
    }

    /// Number of overlay replacements.
    pub fn overlay_draws(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, CanvasEvent::Overlay { .. }))
            .count()
    }
}

impl Canvas for RecordingCanvas {
    fn show_message(&mut self, message: Option<&str>) {
        self.message = message.map(str::to_string);
        self.events.push(CanvasEvent::Message(self.message.clone()));
    }

    fn display_image(&mut self, image: &ReferenceImage) {
        self.events.push(CanvasEvent::Image {
            width: image.width(),
            height: image.height(),
        });
    }

    fn replace_overlay(&mut self, tag: &str, shapes: Vec<PixelShape>) {
        self.events.push(CanvasEvent::Overlay {
            tag: tag.to_string(),
            shapes: shapes.len(),
        });
        self.overlay = Some((tag.to_string(), shapes));
    }
}
