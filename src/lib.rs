pub mod bento;
pub mod build;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod logging;
pub mod manifest;
pub mod store;
pub mod tag;
pub mod vfs;

pub use bento::Bento;
pub use build::BuildConfig;
pub use error::{Error, Result};
pub use export::Format;
pub use manifest::{ManifestInfo, SCHEMA_VERSION};
pub use store::bentos::BentoStore;
pub use store::models::ModelStore;
pub use tag::Tag;
