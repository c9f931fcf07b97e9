pub mod dest;

use std::fs;
use std::path::PathBuf;

use crate::bento::Bento;
use crate::error::Result;
use crate::vfs::dir::DirFs;
use crate::vfs::{archive, copy_tree, Address, Backend};

pub use dest::{Format, ResolvedDest};

/// Serialize a bento's file tree into an archive or directory.
///
/// The destination string routes the backend (`osfs://`, `zip://`, `temp://`
/// or a bare path), the format comes from `output_format` or the
/// destination's extension, and `subpath` selects a subdirectory of a
/// directory destination. All validation happens before any destination-side
/// I/O, so a rejected export never leaves a partial file behind. Returns the
/// path the artifact was actually written to.
pub fn export_bento(
    bento: &Bento,
    destination: &str,
    output_format: Option<&str>,
    subpath: Option<&str>,
) -> Result<PathBuf> {
    let addr = Address::parse(destination)?;
    if addr.backend == Backend::Temp {
        fs::create_dir_all(&addr.path)?;
    }

    let resolved = dest::resolve_destination(&addr, &bento.export_name(), output_format, subpath)?;
    tracing::info!(
        tag = %bento.tag(),
        path = %resolved.path.display(),
        format = ?resolved.format,
        "exporting bento"
    );

    match resolved.format {
        Format::Bento => archive::write_tar(bento.fs(), &resolved.path, false)?,
        Format::Gz => archive::write_tar(bento.fs(), &resolved.path, true)?,
        Format::Zip => archive::write_zip(bento.fs(), &resolved.path)?,
        Format::Folder => {
            let mut target = DirFs::create(&resolved.path)?;
            copy_tree(bento.fs(), &mut target)?;
        }
    }
    Ok(resolved.path)
}
