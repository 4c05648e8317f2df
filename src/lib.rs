//! # Graft Core Library
//!
//! This crate contains the core logic of the `graft` tool, which copies UI
//! components out of a registry and into an application, rewriting their
//! imports so they resolve against the application's alias layout.
//!
//! Installed files carry a provenance header (`@graft-origin`, `@graft-version`)
//! so later installs can tell registry copies from user-owned files, and a
//! customized copy from a stale one.
//!
//! This library is built for the `graft` CLI, but you can also reuse it as a backend in other tools.
//!
//! ## Modules Overview
//! - [`registry`] – Registry manifest types, validation and loading (local or HTTP)
//! - [`resolver`] – Dependency closure over components and library modules
//! - [`transform`] – Import specifier rewriting passes
//! - [`provenance`] – Provenance headers and drift classification
//! - [`config`] – The project's `graft.json`
//! - [`installer`] – Writing resolved units into a project
//! - [`util`] – Casing, path and version helpers
//! - [`error`] – Error types

pub mod config;
pub mod error;
pub mod installer;
pub mod provenance;
pub mod registry;
pub mod resolver;
pub mod transform;
pub mod util;

pub use config::*;
pub use error::{GraftError, Result};
pub use installer::*;
pub use registry::*;
pub use resolver::*;
pub use util::*;
