//! Command-line front end.
//!
//! Each subcommand drives the same library types an interactive host uses:
//! workspaces are created and reopened through [`Workspace`], painting goes
//! through [`Session`] input events, and previews through the compositor.
//!
//! ```text
//! segtool new ./scans
//! segtool status ./workspace/scans
//! segtool paint ./workspace/scans --index 2 --stroke 10,10,80,40 --radius 6
//! segtool render ./scans/a.png --mask ./workspace/scans/Mask/a_mask.png -o view.png
//! segtool prepare ./scans/a.png --crop 0,0,320,320 --contrast -o input.png
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use segtool_raster::{MaskStore, RasterError, Size, SourceImage, ViewPoint, Viewport, render};

use crate::config::ConfigStore;
use crate::error::{Error, Result};
use crate::inference::{CropSelection, InferenceWorkbench};
use crate::input::{InputEvent, PointerButton, Tool};
use crate::session::{Session, SessionOptions, SessionState, WorkspaceMode};
use crate::workspace::Workspace;

// ============================================================================
// Argument definitions
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "segtool",
    about = "Paint binary segmentation masks over image folders",
    long_about = "Creates annotation workspaces for a folder of images, paints and \
                  saves masks, renders overlay previews and prepares images for \
                  segmentation models."
)]
pub struct CliArgs {
    /// Configuration file. Defaults to the user config directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Create a workspace for a folder of images.
    New {
        /// Folder holding the images to annotate.
        source: PathBuf,
    },

    /// List a workspace's images and whether each has a saved mask.
    Status {
        /// Workspace directory created by `new`.
        workspace: PathBuf,
    },

    /// Paint strokes on one image's mask and save it.
    Paint {
        /// Workspace directory created by `new`.
        workspace: PathBuf,

        /// Position of the image in the workspace list.
        #[arg(long, default_value_t = 0)]
        index: usize,

        /// Stroke from X0,Y0 to X1,Y1 in image pixels. May be repeated.
        #[arg(long = "stroke", value_name = "X0,Y0,X1,Y1", required = true, value_parser = parse_segment)]
        strokes: Vec<[u32; 4]>,

        /// Brush radius in image pixels. Defaults to the configured radius.
        #[arg(long)]
        radius: Option<f32>,

        /// Erase instead of paint.
        #[arg(long)]
        erase: bool,
    },

    /// Render the tinted overlay of an image as it appears in the view.
    Render {
        /// Image to display.
        image: PathBuf,

        /// Mask to overlay. A blank mask is used when omitted.
        #[arg(long)]
        mask: Option<PathBuf>,

        /// Zoom in percent.
        #[arg(long, default_value_t = 100)]
        zoom: u32,

        /// Pan offset in scaled pixels.
        #[arg(long, value_name = "X,Y", default_value = "0,0", value_parser = parse_pan)]
        pan: (i32, i32),

        /// View size.
        #[arg(long, value_name = "WxH", default_value = "800x600", value_parser = parse_size)]
        view: Size,

        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Crop and contrast-enhance an image the way it is fed to a model.
    Prepare {
        /// Image to prepare.
        image: PathBuf,

        /// Crop rectangle from X0,Y0 to X1,Y1 in image pixels.
        #[arg(long, value_name = "X0,Y0,X1,Y1", value_parser = parse_segment)]
        crop: Option<[u32; 4]>,

        /// Equalize the histogram.
        #[arg(long)]
        contrast: bool,

        /// Output PNG path.
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print the effective configuration.
    Config {
        /// Write the effective configuration to the config file.
        #[arg(long)]
        save: bool,
    },
}

// ============================================================================
// Value parsers
// ============================================================================

fn parse_numbers<T: std::str::FromStr>(s: &str, separator: char) -> Option<Vec<T>> {
    s.split(separator)
        .map(|part| part.trim().parse().ok())
        .collect()
}

fn parse_segment(s: &str) -> std::result::Result<[u32; 4], String> {
    match parse_numbers::<u32>(s, ',').as_deref() {
        Some(&[x0, y0, x1, y1]) => Ok([x0, y0, x1, y1]),
        _ => Err(format!("expected X0,Y0,X1,Y1, got '{s}'")),
    }
}

fn parse_pan(s: &str) -> std::result::Result<(i32, i32), String> {
    match parse_numbers::<i32>(s, ',').as_deref() {
        Some(&[x, y]) => Ok((x, y)),
        _ => Err(format!("expected X,Y, got '{s}'")),
    }
}

fn parse_size(s: &str) -> std::result::Result<Size, String> {
    match parse_numbers::<u32>(&s.to_ascii_lowercase(), 'x').as_deref() {
        Some(&[w, h]) if w > 0 && h > 0 => Ok(Size::new(w, h)),
        _ => Err(format!("expected WxH with non-zero sides, got '{s}'")),
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run one subcommand and return an OS exit code.
pub fn run(args: CliArgs, mut store: ConfigStore) -> ExitCode {
    let result = match args.command {
        CliCommand::New { source } => cmd_new(&source, &store),
        CliCommand::Status { workspace } => cmd_status(&workspace, &store),
        CliCommand::Paint {
            workspace,
            index,
            strokes,
            radius,
            erase,
        } => cmd_paint(&workspace, index, &strokes, radius, erase, &store),
        CliCommand::Render {
            image,
            mask,
            zoom,
            pan,
            view,
            output,
        } => cmd_render(&image, mask.as_deref(), zoom, pan, view, &output, &store),
        CliCommand::Prepare {
            image,
            crop,
            contrast,
            output,
        } => cmd_prepare(&image, crop, contrast, &output),
        CliCommand::Config { save } => cmd_config(&mut store, save),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed ({:?})", e.kind());
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn cmd_new(source: &Path, store: &ConfigStore) -> Result<()> {
    let workspace = Workspace::create(source, &store.get().workspace)?;
    let info = workspace.info();
    println!("Workspace:  {}", info.workspace_dir.display());
    println!("Originals:  {}", info.original_dir.display());
    println!("Masks:      {}", info.mask_dir.display());
    println!("Images:     {}", workspace.images()?.len());
    Ok(())
}

fn cmd_status(dir: &Path, store: &ConfigStore) -> Result<()> {
    let workspace = Workspace::open(dir, &store.get().workspace)?;
    let images = workspace.images()?;
    println!("Source: {}", workspace.source_dir().display());

    let mut masked = 0;
    for (i, image) in images.iter().enumerate() {
        let name = image.file_name().unwrap_or_default().to_string_lossy();
        match workspace.existing_mask_for(image) {
            Some(mask) => {
                masked += 1;
                let mask_name = mask.file_name().unwrap_or_default().to_string_lossy();
                println!("  [{i:>3}] {name}  ->  {mask_name}");
            }
            None => println!("  [{i:>3}] {name}"),
        }
    }
    println!("{masked}/{} images have masks", images.len());
    Ok(())
}

fn cmd_paint(
    dir: &Path,
    index: usize,
    strokes: &[[u32; 4]],
    radius: Option<f32>,
    erase: bool,
    store: &ConfigStore,
) -> Result<()> {
    let config = store.get();
    let workspace = Workspace::open(dir, &config.workspace)?;
    let images = workspace.images()?;
    if index >= images.len() {
        return Err(Error::validation(format!(
            "Image index {index} is out of range ({} images)",
            images.len()
        )));
    }

    let mut session = Session::new(images, SessionOptions::from_config(config))
        .with_workspace(workspace, WorkspaceMode::Open);
    session.load_image(index);
    let image_size = match session.state() {
        SessionState::ImageLoaded(loaded) => loaded.image().size(),
        SessionState::LoadFailed { message } => return Err(Error::validation(message.clone())),
        SessionState::NoImage => return Err(Error::validation("No image loaded")),
    };

    // One view pixel per image pixel, so stroke coordinates map directly.
    session.set_view_size(image_size);
    session.set_zoom_percent(100);
    session.set_tool(if erase { Tool::Eraser } else { Tool::Brush });
    if let Some(radius) = radius {
        session.set_brush_radius(radius);
    }

    let center = |x: u32, y: u32| ViewPoint::new(x as f32 + 0.5, y as f32 + 0.5);
    let button = PointerButton::Primary;
    for &[x0, y0, x1, y1] in strokes {
        session.handle_event(InputEvent::PointerDown {
            position: center(x0, y0),
            button,
        })?;
        session.handle_event(InputEvent::PointerMove {
            position: center(x1, y1),
        })?;
        session.handle_event(InputEvent::PointerUp {
            position: center(x1, y1),
            button,
        })?;
    }

    let saved = session.save_mask()?;
    let marked = session.mask().map_or(0, MaskStore::marked_pixel_count);
    println!(
        "{}: {} stroke(s), {} marked pixels",
        session.progress(),
        strokes.len(),
        marked
    );
    println!("Mask:     {}", saved.mask.display());
    if saved.copied_original {
        println!("Original: {}", saved.original.display());
    }
    Ok(())
}

fn cmd_render(
    image_path: &Path,
    mask_path: Option<&Path>,
    zoom: u32,
    pan: (i32, i32),
    view: Size,
    output: &Path,
    store: &ConfigStore,
) -> Result<()> {
    let image = SourceImage::open(image_path)?;
    let mask = match mask_path {
        Some(path) => MaskStore::load(path, image.size())?,
        None => MaskStore::create(image.size())?,
    };
    let viewport = Viewport::new(zoom as f32 / 100.0).with_pan(pan.0, pan.1);
    let frame = render(&image, &mask, &viewport, view, store.get().editor.tint())?;

    frame
        .to_rgba_image()
        .save(output)
        .map_err(|e| RasterError::write(output, e))?;
    let size = frame.size();
    let (x, y) = frame.offset();
    println!(
        "Rendered {}x{} at ({x}, {y}) to {}",
        size.width,
        size.height,
        output.display()
    );
    Ok(())
}

fn cmd_prepare(
    image_path: &Path,
    crop: Option<[u32; 4]>,
    contrast: bool,
    output: &Path,
) -> Result<()> {
    let mut bench = InferenceWorkbench::default();
    bench.load_image(image_path)?;
    if contrast {
        bench.enhance_contrast()?;
    }
    if let Some([x0, y0, x1, y1]) = crop {
        let selection = CropSelection::from_drag((x0, y0), (x1, y1))
            .ok_or_else(|| Error::validation("Crop rectangle has no area"))?;
        bench.crop(selection)?;
    }

    let prepared = bench
        .inference_source()
        .ok_or_else(|| Error::validation("No image loaded"))?;
    prepared
        .save(output)
        .map_err(|e| RasterError::write(output, e))?;
    println!(
        "Prepared {}x{} image at {}",
        prepared.width(),
        prepared.height(),
        output.display()
    );
    Ok(())
}

fn cmd_config(store: &mut ConfigStore, save: bool) -> Result<()> {
    match store.path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# (defaults, no config file)"),
    }
    let json = store.get().to_json().map_err(|e| Error::validation(e.to_string()))?;
    println!("{json}");
    if save {
        store.save()?;
        log::info!("Configuration saved");
    }
    Ok(())
}
