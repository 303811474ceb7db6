//! Toolkit-neutral input events, editing tools and keybindings.
//!
//! A host translates its native window events into [`InputEvent`]s and feeds
//! them to [`crate::session::Session::handle_event`]. Keyboard shortcuts are
//! resolved to [`Command`]s through [`KeyBindings`], which are customizable
//! through the config file.

use segtool_raster::{StrokeMode, ViewPoint};
use serde::{Deserialize, Serialize};

/// Editing tool selected in the toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    /// Paint mask coverage
    #[default]
    Brush,
    /// Clear mask coverage
    Eraser,
    /// Drag the view
    Pan,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Pan => "Pan",
        }
    }

    /// Stroke mode for drawing tools, `None` for the pan tool.
    pub fn stroke_mode(&self) -> Option<StrokeMode> {
        match self {
            Tool::Brush => Some(StrokeMode::Paint),
            Tool::Eraser => Some(StrokeMode::Erase),
            Tool::Pan => None,
        }
    }
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Keyboard keys (simplified set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Space,
    Left,
    Right,
}

impl Key {
    /// Letters compare case-insensitively.
    fn normalized(self) -> Self {
        match self {
            Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
            other => other,
        }
    }
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers {
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
    };

    pub const CTRL: Self = Self {
        shift: false,
        ctrl: true,
        alt: false,
    };
}

/// A key together with the modifiers that must be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shortcut {
    pub key: Key,
    #[serde(default)]
    pub modifiers: Modifiers,
}

impl Shortcut {
    pub const fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub const fn key(key: Key) -> Self {
        Self::new(key, Modifiers::NONE)
    }

    pub const fn ctrl(key: Key) -> Self {
        Self::new(key, Modifiers::CTRL)
    }

    fn matches(&self, key: Key, modifiers: Modifiers) -> bool {
        self.key.normalized() == key.normalized() && self.modifiers == modifiers
    }
}

/// Events the session responds to, in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerDown {
        position: ViewPoint,
        button: PointerButton,
    },
    PointerMove {
        position: ViewPoint,
    },
    PointerUp {
        position: ViewPoint,
        button: PointerButton,
    },
    /// Wheel motion; positive `delta` scrolls up (zooms in).
    Scroll {
        position: ViewPoint,
        delta: f32,
    },
    Key {
        key: Key,
        modifiers: Modifiers,
    },
}

/// Discriminant of [`InputEvent`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    PointerMove,
    PointerUp,
    Scroll,
    Key,
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::PointerDown { .. } => EventKind::PointerDown,
            InputEvent::PointerMove { .. } => EventKind::PointerMove,
            InputEvent::PointerUp { .. } => EventKind::PointerUp,
            InputEvent::Scroll { .. } => EventKind::Scroll,
            InputEvent::Key { .. } => EventKind::Key,
        }
    }
}

/// Actions reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectTool(Tool),
    Undo,
    Redo,
    NextImage,
    PreviousImage,
    ZoomIn,
    ZoomOut,
    ResetView,
    BrushLarger,
    BrushSmaller,
    Save,
}

/// Keybinding configuration for the application.
///
/// Shortcuts missing from a config file keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub tool_brush: Shortcut,
    pub tool_eraser: Shortcut,
    pub tool_pan: Shortcut,
    pub undo: Shortcut,
    pub redo: Shortcut,
    pub next_image: Shortcut,
    pub previous_image: Shortcut,
    pub zoom_in: Shortcut,
    pub zoom_out: Shortcut,
    pub reset_view: Shortcut,
    pub brush_larger: Shortcut,
    pub brush_smaller: Shortcut,
    pub save: Shortcut,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            tool_brush: Shortcut::key(Key::Char('b')),
            tool_eraser: Shortcut::key(Key::Char('e')),
            tool_pan: Shortcut::key(Key::Char('h')),
            undo: Shortcut::ctrl(Key::Char('z')),
            redo: Shortcut::ctrl(Key::Char('y')),
            next_image: Shortcut::key(Key::Right),
            previous_image: Shortcut::key(Key::Left),
            zoom_in: Shortcut::key(Key::Char('+')),
            zoom_out: Shortcut::key(Key::Char('-')),
            reset_view: Shortcut::key(Key::Char('0')),
            brush_larger: Shortcut::key(Key::Char(']')),
            brush_smaller: Shortcut::key(Key::Char('[')),
            save: Shortcut::ctrl(Key::Char('s')),
        }
    }
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> [(Shortcut, Command); 13] {
        [
            (self.tool_brush, Command::SelectTool(Tool::Brush)),
            (self.tool_eraser, Command::SelectTool(Tool::Eraser)),
            (self.tool_pan, Command::SelectTool(Tool::Pan)),
            (self.undo, Command::Undo),
            (self.redo, Command::Redo),
            (self.next_image, Command::NextImage),
            (self.previous_image, Command::PreviousImage),
            (self.zoom_in, Command::ZoomIn),
            (self.zoom_out, Command::ZoomOut),
            (self.reset_view, Command::ResetView),
            (self.brush_larger, Command::BrushLarger),
            (self.brush_smaller, Command::BrushSmaller),
            (self.save, Command::Save),
        ]
    }

    /// Get the command bound to a key press, if any.
    pub fn command_for(&self, key: Key, modifiers: Modifiers) -> Option<Command> {
        self.table()
            .into_iter()
            .find(|(shortcut, _)| shortcut.matches(key, modifiers))
            .map(|(_, command)| command)
    }

    /// Get the shortcut for a specific tool.
    pub fn shortcut_for_tool(&self, tool: Tool) -> Shortcut {
        match tool {
            Tool::Brush => self.tool_brush,
            Tool::Eraser => self.tool_eraser,
            Tool::Pan => self.tool_pan,
        }
    }

    /// Set the shortcut for a tool.
    pub fn set_tool_shortcut(&mut self, tool: Tool, shortcut: Shortcut) {
        match tool {
            Tool::Brush => self.tool_brush = shortcut,
            Tool::Eraser => self.tool_eraser = shortcut,
            Tool::Pan => self.tool_pan = shortcut,
        }
    }

    /// Shortcuts bound to more than one command.
    pub fn conflicts(&self) -> Vec<Shortcut> {
        let table = self.table();
        let mut conflicts = Vec::new();
        for (i, (a, _)) in table.iter().enumerate() {
            let clash = table[i + 1..]
                .iter()
                .any(|(b, _)| b.matches(a.key, a.modifiers));
            if clash && !conflicts.contains(a) {
                conflicts.push(*a);
            }
        }
        conflicts
    }
}
