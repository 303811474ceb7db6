//! Sessions driven through input events against workspaces on disk.

use image::{Rgba, RgbaImage};
use segtool_raster::{ImagePoint, Size, ViewPoint};

use super::Fixture;
use crate::input::{InputEvent, PointerButton, Tool};
use crate::session::{Session, SessionAction, SessionOptions, SessionState, WorkspaceMode};
use crate::workspace::Workspace;

/// Options with one view pixel per image pixel for a 20x10 image.
fn options() -> SessionOptions {
    SessionOptions {
        view_size: Size::new(20, 10),
        brush_radius: 2.0,
        ..Default::default()
    }
}

fn stroke(session: &mut Session, from: (f32, f32), to: (f32, f32)) {
    let button = PointerButton::Primary;
    session
        .handle_event(InputEvent::PointerDown {
            position: ViewPoint::new(from.0, from.1),
            button,
        })
        .unwrap();
    session
        .handle_event(InputEvent::PointerMove {
            position: ViewPoint::new(to.0, to.1),
        })
        .unwrap();
    session
        .handle_event(InputEvent::PointerUp {
            position: ViewPoint::new(to.0, to.1),
            button,
        })
        .unwrap();
}

fn marked(session: &Session) -> usize {
    session.mask().map_or(0, |m| m.marked_pixel_count())
}

#[test]
fn test_navigation_clears_history_and_mask() {
    let fx = Fixture::new("nav", &["a.png", "b.png", "c.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    let mut session = Session::from_workspace(ws, WorkspaceMode::New, options()).unwrap();
    assert_eq!(session.progress(), "1/3");

    stroke(&mut session, (3.5, 5.5), (15.5, 5.5));
    assert!(marked(&session) > 0);
    assert!(session.history().can_undo());
    assert!(session.is_dirty());

    assert_eq!(session.next(), SessionAction::ImageChanged);
    assert_eq!(marked(&session), 0);
    assert!(!session.history().can_undo());
    assert!(!session.is_dirty());

    session.next();
    session.previous();
    assert_eq!(session.index(), 1);
    assert_eq!(session.current_path(), Some(fx.image("b.png").as_path()));
    assert_eq!(session.progress(), "2/3");
}

#[test]
fn test_saved_mask_is_restored_on_reopen() {
    let fx = Fixture::new("reopen", &["a.png", "b.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    let dir = ws.dir().to_path_buf();

    let mut session = Session::from_workspace(ws, WorkspaceMode::New, options()).unwrap();
    stroke(&mut session, (2.5, 2.5), (17.5, 7.5));
    let painted = marked(&session);
    let saved = session.save_mask().unwrap();
    assert!(saved.copied_original);
    assert!(saved.mask.is_file());
    assert!(!session.is_dirty());

    let reopened = Workspace::open(&dir, &fx.settings).unwrap();
    let session = Session::from_workspace(reopened, WorkspaceMode::Open, options()).unwrap();
    assert_eq!(marked(&session), painted);
}

#[test]
fn test_new_mode_ignores_existing_masks() {
    let fx = Fixture::new("newmode", &["a.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    let dir = ws.dir().to_path_buf();

    let mut session = Session::from_workspace(ws, WorkspaceMode::New, options()).unwrap();
    stroke(&mut session, (2.5, 2.5), (10.5, 2.5));
    session.save_mask().unwrap();

    let ws = Workspace::open(&dir, &fx.settings).unwrap();
    let session = Session::from_workspace(ws, WorkspaceMode::New, options()).unwrap();
    assert_eq!(marked(&session), 0);
}

#[test]
fn test_mismatched_mask_is_rescaled() {
    let fx = Fixture::new("rescale", &["a.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    // Half-size mask with the left half marked.
    let small = RgbaImage::from_fn(10, 5, |x, _| {
        if x < 5 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });
    small.save(ws.mask_path_for(&fx.image("a.png"))).unwrap();

    let session = Session::from_workspace(ws, WorkspaceMode::Open, options()).unwrap();
    let mask = session.mask().unwrap();
    assert_eq!(mask.size(), Size::new(20, 10));
    assert_eq!(mask.marked_pixel_count(), 100);
    assert_eq!(mask.alpha_at(ImagePoint::new(9, 9)), Some(255));
    assert_eq!(mask.alpha_at(ImagePoint::new(10, 0)), Some(0));
}

#[test]
fn test_corrupt_mask_falls_back_to_blank() {
    let fx = Fixture::new("corrupt", &["a.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    std::fs::write(ws.mask_path_for(&fx.image("a.png")), b"not a png").unwrap();

    let session = Session::from_workspace(ws, WorkspaceMode::Open, options()).unwrap();
    assert!(matches!(session.state(), SessionState::ImageLoaded(_)));
    assert!(session.mask().unwrap().is_empty());
}

#[test]
fn test_erase_then_paint_and_undo() {
    let fx = Fixture::new("erase", &["a.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    let mut session = Session::from_workspace(ws, WorkspaceMode::New, options()).unwrap();

    stroke(&mut session, (1.5, 5.5), (18.5, 5.5));
    let full = marked(&session);

    session.set_tool(Tool::Eraser);
    stroke(&mut session, (10.5, 5.5), (10.5, 5.5));
    let erased = marked(&session);
    assert!(erased < full);
    assert_eq!(
        session.mask().unwrap().alpha_at(ImagePoint::new(10, 5)),
        Some(0)
    );

    session.set_tool(Tool::Brush);
    stroke(&mut session, (10.5, 5.5), (10.5, 5.5));
    assert_eq!(
        session.mask().unwrap().alpha_at(ImagePoint::new(10, 5)),
        Some(255)
    );

    assert_eq!(session.history().undo_count(), 3);
    session.undo();
    assert_eq!(marked(&session), erased);
    session.undo();
    assert_eq!(marked(&session), full);
}

#[test]
fn test_rendered_frame_shows_saved_mask() {
    let fx = Fixture::new("render", &["a.png"], 20, 10);
    let ws = Workspace::create(fx.source(), &fx.settings).unwrap();
    let mut session = Session::from_workspace(ws, WorkspaceMode::New, options()).unwrap();
    stroke(&mut session, (5.5, 5.5), (5.5, 5.5));

    let frame = session.render().unwrap().unwrap();
    assert_eq!(frame.size(), Size::new(20, 10));
    let tinted = frame.pixel(5, 5).unwrap();
    let plain = frame.pixel(18, 1).unwrap();
    assert!(tinted.red() > plain.red());
}
