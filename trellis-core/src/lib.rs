//! Trellis core library: domain types, local theme reader, configuration,
//! and the remote state contract.
//!
//! - [`types`] — blocks, partials, fields, theme tokens, patches
//! - [`local`] — reads a theme working directory
//! - [`config`] — `~/.trellis/config.yaml` plus environment overrides
//! - [`remote`] — [`RemoteState`] and the in-memory [`MemoryRemote`]
//! - [`error`] — [`ThemeError`], [`RemoteError`]

pub mod config;
pub mod error;
pub mod local;
pub mod remote;
pub mod types;

pub use config::{Config, Credentials};
pub use error::{RemoteError, ThemeError};
pub use remote::{MemoryRemote, RemoteCall, RemoteState};
pub use types::{
    BlockPatch, Field, FieldType, LocalBlock, LocalPartial, LocalTheme, PartialPatch, RemoteBlock,
    RemotePartial, Site, SiteId, ThemeConfig, ThemeName,
};
