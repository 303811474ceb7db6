//! Editing session: navigation over an image list plus the mask being edited.
//!
//! The session owns the current image, its mask, the viewport and the undo
//! history. Hosts feed it [`InputEvent`]s and draw the [`Frame`] returned by
//! [`Session::render`]. Switching images discards the in-memory mask without
//! saving; [`Session::is_dirty`] tells the host whether there is anything to
//! lose.

use std::path::{Path, PathBuf};

use segtool_raster::viewport::ZOOM_STEP_PERCENT;
use segtool_raster::{
    Bounds, Frame, HistoryConfig, ImagePoint, MaskHistory, MaskStore, RasterError, Size,
    SourceImage, StrokeGesture, Tint, ViewPoint, Viewport, compositor, stroke,
};

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::input::{Command, EventKind, InputEvent, KeyBindings, PointerButton, Tool};
use crate::workspace::{SavedFiles, Workspace};

/// Viewport size used until the host reports its own.
pub const DEFAULT_VIEW_SIZE: Size = Size::new(800, 600);

/// Brush radius change per keyboard step, in image pixels.
const RADIUS_STEP: f32 = 1.0;

/// Decodes source images for the session.
pub trait ImageLoader {
    fn load(&self, path: &Path) -> std::result::Result<SourceImage, RasterError>;
}

/// Loads images from the filesystem with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImageLoader;

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> std::result::Result<SourceImage, RasterError> {
        SourceImage::open(path)
    }
}

/// How a workspace attached to the session treats existing masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceMode {
    /// Fresh workspace: every image starts with a blank mask.
    New,
    /// Reopened workspace: saved masks are loaded when present.
    Open,
}

/// Editor settings the session starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub brush_radius: f32,
    pub zoom_percent: u32,
    pub tint: Tint,
    pub history: HistoryConfig,
    pub keybindings: KeyBindings,
    pub view_size: Size,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            brush_radius: config.editor.brush_radius,
            zoom_percent: config.editor.zoom_percent,
            tint: config.editor.tint(),
            history: config.editor.history(),
            keybindings: config.keybindings.clone(),
            view_size: DEFAULT_VIEW_SIZE,
        }
    }
}

/// A decoded image with the mask being painted on it.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    image: SourceImage,
    mask: MaskStore,
}

impl LoadedImage {
    pub fn image(&self) -> &SourceImage {
        &self.image
    }

    pub fn mask(&self) -> &MaskStore {
        &self.mask
    }
}

/// What the session currently shows.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// No image has been loaded, or the list is empty.
    NoImage,
    ImageLoaded(LoadedImage),
    /// The image at the current index could not be decoded.
    LoadFailed { message: String },
}

/// What an operation changed, so the host knows what to refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    None,
    ViewChanged,
    MaskChanged,
    ImageChanged,
    ToolChanged(Tool),
    BrushChanged(f32),
    Saved(SavedFiles),
}

/// Pointer drag in progress.
#[derive(Debug, Clone)]
enum Drag {
    Stroke(StrokeGesture),
    Pan { last: ViewPoint },
}

type Handler = fn(&mut Session, InputEvent) -> Result<SessionAction>;

/// Pick the handler for an event under the active tool.
fn handler_for(tool: Tool, kind: EventKind) -> Handler {
    match (tool, kind) {
        (Tool::Brush | Tool::Eraser, EventKind::PointerDown) => Session::begin_stroke,
        (Tool::Pan, EventKind::PointerDown) => Session::begin_pan,
        (_, EventKind::PointerMove) => Session::continue_drag,
        (_, EventKind::PointerUp) => Session::end_drag,
        (_, EventKind::Scroll) => Session::scroll_zoom,
        (_, EventKind::Key) => Session::key_command,
    }
}

pub struct Session {
    images: Vec<PathBuf>,
    index: usize,
    state: SessionState,
    viewport: Viewport,
    view_size: Size,
    history: MaskHistory,
    tool: Tool,
    brush_radius: f32,
    tint: Tint,
    keybindings: KeyBindings,
    drag: Option<Drag>,
    dirty: bool,
    workspace: Option<(Workspace, WorkspaceMode)>,
    loader: Box<dyn ImageLoader>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("images", &self.images.len())
            .field("index", &self.index)
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .field("tool", &self.tool)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Session {
    /// Create a session over `images`. Nothing is loaded until
    /// [`Session::load_image`] is called.
    pub fn new(images: Vec<PathBuf>, options: SessionOptions) -> Self {
        Self {
            images,
            index: 0,
            state: SessionState::NoImage,
            viewport: Viewport::new(options.zoom_percent as f32 / 100.0),
            view_size: options.view_size,
            history: MaskHistory::with_config(options.history),
            tool: Tool::default(),
            brush_radius: stroke::clamp_radius(options.brush_radius),
            tint: options.tint,
            keybindings: options.keybindings,
            drag: None,
            dirty: false,
            workspace: None,
            loader: Box::new(FileImageLoader),
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_workspace(mut self, workspace: Workspace, mode: WorkspaceMode) -> Self {
        self.workspace = Some((workspace, mode));
        self
    }

    /// Session over a workspace's images, with the first image loaded.
    pub fn from_workspace(
        workspace: Workspace,
        mode: WorkspaceMode,
        options: SessionOptions,
    ) -> Result<Self> {
        let images = workspace.images()?;
        let mut session = Self::new(images, options).with_workspace(workspace, mode);
        session.load_image(0);
        Ok(session)
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.images.get(self.index).map(PathBuf::as_path)
    }

    /// Get progress string like "3/15".
    pub fn progress(&self) -> String {
        if self.images.is_empty() {
            return "0/0".to_string();
        }
        format!("{}/{}", self.index + 1, self.images.len())
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mask(&self) -> Option<&MaskStore> {
        match &self.state {
            SessionState::ImageLoaded(loaded) => Some(&loaded.mask),
            _ => None,
        }
    }

    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref().map(|(ws, _)| ws)
    }

    /// The viewport as applied to the current image, pan clamped.
    pub fn viewport(&self) -> Viewport {
        match self.bounds() {
            Some(bounds) => self.viewport.clamped(bounds),
            None => self.viewport,
        }
    }

    pub fn view_size(&self) -> Size {
        self.view_size
    }

    pub fn history(&self) -> &MaskHistory {
        &self.history
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn brush_radius(&self) -> f32 {
        self.brush_radius
    }

    pub fn tint(&self) -> Tint {
        self.tint
    }

    pub fn keybindings(&self) -> &KeyBindings {
        &self.keybindings
    }

    /// Whether the mask has edits that were not saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn bounds(&self) -> Option<Bounds> {
        match &self.state {
            SessionState::ImageLoaded(loaded) => {
                Some(Bounds::new(loaded.image.size(), self.view_size))
            }
            _ => None,
        }
    }

    // === Navigation ===

    /// Load the image at `index`, replacing the current image and mask.
    ///
    /// Decode failures leave the session in [`SessionState::LoadFailed`] at
    /// that index.
    pub fn load_image(&mut self, index: usize) -> SessionAction {
        let Some(path) = self.images.get(index).cloned() else {
            log::warn!(
                "Image index {} out of range ({} images)",
                index,
                self.images.len()
            );
            return SessionAction::None;
        };

        self.index = index;
        self.drag = None;
        self.dirty = false;
        self.history.clear();

        // The stored pan is kept as last used; each image sees it re-clamped.
        self.state = match self.open_image(&path) {
            Ok(loaded) => {
                log::debug!(
                    "Loaded image {} {:?} ({}x{})",
                    self.progress(),
                    path,
                    loaded.image.size().width,
                    loaded.image.size().height
                );
                SessionState::ImageLoaded(loaded)
            }
            Err(e) => {
                log::warn!("Failed to load image {:?}: {}", path, e);
                SessionState::LoadFailed {
                    message: e.to_string(),
                }
            }
        };
        SessionAction::ImageChanged
    }

    fn open_image(&self, path: &Path) -> std::result::Result<LoadedImage, RasterError> {
        let image = self.loader.load(path)?;
        let size = image.size();

        let restored = match &self.workspace {
            Some((workspace, WorkspaceMode::Open)) => workspace.existing_mask_for(path),
            _ => None,
        };
        let mask = match restored {
            Some(mask_path) => {
                log::debug!("Restoring mask {:?}", mask_path);
                MaskStore::load_or_create(&mask_path, size)?
            }
            None => MaskStore::create(size)?,
        };
        Ok(LoadedImage { image, mask })
    }

    /// Move to the next image, wrapping around.
    pub fn next(&mut self) -> SessionAction {
        if self.images.is_empty() {
            return SessionAction::None;
        }
        self.load_image((self.index + 1) % self.images.len())
    }

    /// Move to the previous image, wrapping around.
    pub fn previous(&mut self) -> SessionAction {
        if self.images.is_empty() {
            return SessionAction::None;
        }
        let index = if self.index == 0 {
            self.images.len() - 1
        } else {
            self.index - 1
        };
        self.load_image(index)
    }

    // === View ===

    /// Report the size of the widget the frame is drawn into.
    pub fn set_view_size(&mut self, size: Size) -> SessionAction {
        if size == self.view_size {
            return SessionAction::None;
        }
        self.view_size = size;
        if let Some(bounds) = self.bounds() {
            self.viewport.clamp(bounds);
        }
        SessionAction::ViewChanged
    }

    pub fn set_zoom_percent(&mut self, percent: u32) -> SessionAction {
        let before = self.viewport;
        match self.bounds() {
            Some(bounds) => self.viewport.set_zoom_percent(percent, bounds),
            None => self.viewport = Viewport::new(percent as f32 / 100.0),
        }
        view_action(before != self.viewport)
    }

    pub fn zoom_in(&mut self) -> SessionAction {
        self.set_zoom_percent(self.viewport.zoom_percent() + ZOOM_STEP_PERCENT)
    }

    pub fn zoom_out(&mut self) -> SessionAction {
        self.set_zoom_percent(
            self.viewport
                .zoom_percent()
                .saturating_sub(ZOOM_STEP_PERCENT),
        )
    }

    /// Back to 1:1 with no pan.
    pub fn reset_view(&mut self) -> SessionAction {
        let before = self.viewport;
        self.viewport.reset();
        if let Some(bounds) = self.bounds() {
            self.viewport.clamp(bounds);
        }
        view_action(before != self.viewport)
    }

    /// Image pixel under a viewport position, if any.
    pub fn pointer_to_image(&self, position: ViewPoint) -> Option<ImagePoint> {
        let bounds = self.bounds()?;
        self.viewport.clamped(bounds).to_image(position, bounds)
    }

    // === Tools ===

    pub fn set_tool(&mut self, tool: Tool) -> SessionAction {
        if tool == self.tool {
            return SessionAction::None;
        }
        log::debug!("Tool: {}", tool.name());
        self.tool = tool;
        SessionAction::ToolChanged(tool)
    }

    pub fn set_brush_radius(&mut self, radius: f32) -> SessionAction {
        let radius = stroke::clamp_radius(radius);
        if (radius - self.brush_radius).abs() < f32::EPSILON {
            return SessionAction::None;
        }
        self.brush_radius = radius;
        SessionAction::BrushChanged(radius)
    }

    pub fn set_tint(&mut self, tint: Tint) -> SessionAction {
        if tint == self.tint {
            return SessionAction::None;
        }
        self.tint = tint;
        SessionAction::ViewChanged
    }

    // === Input ===

    /// Route an input event to the handler for the active tool.
    pub fn handle_event(&mut self, event: InputEvent) -> Result<SessionAction> {
        let handler = handler_for(self.tool, event.kind());
        handler(self, event)
    }

    fn begin_stroke(&mut self, event: InputEvent) -> Result<SessionAction> {
        let InputEvent::PointerDown { position, button } = event else {
            return Ok(SessionAction::None);
        };
        match button {
            PointerButton::Middle => return self.begin_pan(event),
            PointerButton::Secondary => return Ok(SessionAction::None),
            PointerButton::Primary => {}
        }
        let Some(mode) = self.tool.stroke_mode() else {
            return Ok(SessionAction::None);
        };
        let Some(point) = self.pointer_to_image(position) else {
            return Ok(SessionAction::None);
        };
        let SessionState::ImageLoaded(loaded) = &mut self.state else {
            return Ok(SessionAction::None);
        };

        self.history.begin_gesture(&loaded.mask);
        let gesture = StrokeGesture::begin(&mut loaded.mask, Some(point), self.brush_radius, mode);
        self.drag = Some(Drag::Stroke(gesture));
        self.dirty = true;
        Ok(SessionAction::MaskChanged)
    }

    fn begin_pan(&mut self, event: InputEvent) -> Result<SessionAction> {
        let InputEvent::PointerDown { position, button } = event else {
            return Ok(SessionAction::None);
        };
        if button == PointerButton::Secondary {
            return Ok(SessionAction::None);
        }
        self.drag = Some(Drag::Pan { last: position });
        Ok(SessionAction::None)
    }

    fn continue_drag(&mut self, event: InputEvent) -> Result<SessionAction> {
        let InputEvent::PointerMove { position } = event else {
            return Ok(SessionAction::None);
        };
        let point = self.pointer_to_image(position);
        let bounds = self.bounds();

        match (&mut self.drag, &mut self.state) {
            (Some(Drag::Stroke(gesture)), SessionState::ImageLoaded(loaded)) => {
                gesture.extend(&mut loaded.mask, point);
                Ok(SessionAction::MaskChanged)
            }
            (Some(Drag::Pan { last }), _) => {
                let Some(bounds) = bounds else {
                    return Ok(SessionAction::None);
                };
                let dx = (position.x - last.x).round();
                let dy = (position.y - last.y).round();
                if dx == 0.0 && dy == 0.0 {
                    return Ok(SessionAction::None);
                }
                // Keep the sub-pixel remainder for the next move.
                *last = ViewPoint::new(last.x + dx, last.y + dy);

                let before = self.viewport;
                self.viewport.pan_by(-(dx as i32), -(dy as i32), bounds);
                Ok(view_action(before != self.viewport))
            }
            _ => Ok(SessionAction::None),
        }
    }

    fn end_drag(&mut self, _event: InputEvent) -> Result<SessionAction> {
        self.drag = None;
        Ok(SessionAction::None)
    }

    fn scroll_zoom(&mut self, event: InputEvent) -> Result<SessionAction> {
        let InputEvent::Scroll { position, delta } = event else {
            return Ok(SessionAction::None);
        };
        let current = self.viewport.zoom_percent();
        let percent = if delta > 0.0 {
            current + ZOOM_STEP_PERCENT
        } else if delta < 0.0 {
            current.saturating_sub(ZOOM_STEP_PERCENT)
        } else {
            return Ok(SessionAction::None);
        };

        let Some(bounds) = self.bounds() else {
            return Ok(self.set_zoom_percent(percent));
        };
        let before = self.viewport;
        self.viewport
            .zoom_at(percent as f32 / 100.0, position, bounds);
        Ok(view_action(before != self.viewport))
    }

    fn key_command(&mut self, event: InputEvent) -> Result<SessionAction> {
        let InputEvent::Key { key, modifiers } = event else {
            return Ok(SessionAction::None);
        };
        match self.keybindings.command_for(key, modifiers) {
            Some(command) => self.execute(command),
            None => Ok(SessionAction::None),
        }
    }

    /// Run a keyboard command.
    pub fn execute(&mut self, command: Command) -> Result<SessionAction> {
        Ok(match command {
            Command::SelectTool(tool) => self.set_tool(tool),
            Command::Undo => self.undo(),
            Command::Redo => self.redo(),
            Command::NextImage => self.next(),
            Command::PreviousImage => self.previous(),
            Command::ZoomIn => self.zoom_in(),
            Command::ZoomOut => self.zoom_out(),
            Command::ResetView => self.reset_view(),
            Command::BrushLarger => self.set_brush_radius(self.brush_radius + RADIUS_STEP),
            Command::BrushSmaller => self.set_brush_radius(self.brush_radius - RADIUS_STEP),
            Command::Save => SessionAction::Saved(self.save_mask()?),
        })
    }

    // === History ===

    /// Undo the last gesture. A stroke in progress is ended first so later
    /// moves cannot paint without a snapshot.
    pub fn undo(&mut self) -> SessionAction {
        self.end_stroke_drag();
        let SessionState::ImageLoaded(loaded) = &mut self.state else {
            return SessionAction::None;
        };
        if self.history.undo(&mut loaded.mask) {
            self.dirty = true;
            SessionAction::MaskChanged
        } else {
            SessionAction::None
        }
    }

    pub fn redo(&mut self) -> SessionAction {
        self.end_stroke_drag();
        let SessionState::ImageLoaded(loaded) = &mut self.state else {
            return SessionAction::None;
        };
        if self.history.redo(&mut loaded.mask) {
            self.dirty = true;
            SessionAction::MaskChanged
        } else {
            SessionAction::None
        }
    }

    fn end_stroke_drag(&mut self) {
        if matches!(self.drag, Some(Drag::Stroke(_))) {
            log::debug!("Ending active stroke before history change");
            self.drag = None;
        }
    }

    // === Output ===

    /// Save the current mask, and a copy of its original, to the workspace.
    pub fn save_mask(&mut self) -> Result<SavedFiles> {
        let SessionState::ImageLoaded(loaded) = &self.state else {
            return Err(Error::validation("No mask to save"));
        };
        let Some((workspace, _)) = &self.workspace else {
            return Err(Error::validation("No workspace to save into"));
        };
        let Some(path) = self.images.get(self.index) else {
            return Err(Error::validation("No image selected"));
        };

        let saved = workspace.save_mask_with_original(path, &loaded.mask)?;
        self.dirty = false;
        Ok(saved)
    }

    /// Compose the current frame, or `None` when no image is loaded.
    pub fn render(&self) -> Result<Option<Frame>> {
        let SessionState::ImageLoaded(loaded) = &self.state else {
            return Ok(None);
        };
        let frame = compositor::render(
            &loaded.image,
            &loaded.mask,
            &self.viewport,
            self.view_size,
            self.tint,
        )?;
        Ok(Some(frame))
    }
}

fn view_action(changed: bool) -> SessionAction {
    if changed {
        SessionAction::ViewChanged
    } else {
        SessionAction::None
    }
}
