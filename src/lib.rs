//! segtool: paint binary segmentation masks over folders of images.
//!
//! The pixel work lives in the `segtool_raster` crate. This crate adds the
//! parts a working tool needs around it: the annotation [`session`] with its
//! tool and key handling, on-disk [`workspace`] layout, persisted
//! [`config`], model-driven [`inference`] helpers and the [`cli`].

pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod input;
pub mod session;
pub mod workspace;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use config::{AppConfig, ConfigStore};
pub use error::{Error, ErrorKind, Result};
pub use input::{Command, InputEvent, KeyBindings, Tool};
pub use session::{Session, SessionAction, SessionOptions, SessionState, WorkspaceMode};
pub use workspace::{Workspace, WorkspaceError};
