use crate::bento::Bento;
use crate::error::{Error, Result};
use crate::export::Format;
use crate::manifest::{ManifestInfo, MANIFEST_FILENAME};
use crate::vfs::dir::DirFs;
use crate::vfs::memory::MemoryFs;
use crate::vfs::{archive, copy_tree, Address, Backend, Vfs};

/// Reconstruct a bento from an exported archive or directory.
///
/// Source routing mirrors the exporter's scheme table; a bare path ending in
/// a recognized archive extension is auto-detected, a bare directory is read
/// as an uncompressed tree, and anything else is treated as the default tar
/// container. The result holds its tree in memory and is not bound to any
/// store; `Bento::save` materializes it and resolves model references.
pub fn import_bento(source: &str, input_format: Option<&str>) -> Result<Bento> {
    let addr = Address::parse(source)?;
    let format = match input_format {
        Some(name) => Some(Format::from_name(name)?),
        None => None,
    };

    let tree: MemoryFs = match addr.backend {
        Backend::Zip => archive::open_zip(&addr.path)?,
        Backend::Os | Backend::Temp => {
            let detected = format.or_else(|| {
                if addr.path.is_dir() {
                    Some(Format::Folder)
                } else {
                    addr.path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .and_then(Format::from_extension)
                }
            });
            match detected.unwrap_or(Format::Bento) {
                Format::Bento => archive::open_tar(&addr.path, false)?,
                Format::Gz => archive::open_tar(&addr.path, true)?,
                Format::Zip => archive::open_zip(&addr.path)?,
                Format::Folder => {
                    let source = DirFs::open_read_only(&addr.path)
                        .map_err(|e| Error::corrupt_archive(&addr.path, e))?;
                    let mut tree = MemoryFs::new();
                    copy_tree(&source, &mut tree)?;
                    tree
                }
            }
        }
    };

    let raw = tree.read(MANIFEST_FILENAME).map_err(|_| {
        Error::corrupt_archive(&addr.path, format!("missing {MANIFEST_FILENAME}"))
    })?;
    let text = String::from_utf8(raw)
        .map_err(|e| Error::CorruptManifest(format!("{MANIFEST_FILENAME}: {e}")))?;
    let info = ManifestInfo::from_yaml(&text)?;
    let tag = info.tag()?;
    tracing::info!(tag = %tag, source, "imported bento");

    Ok(Bento::from_parts(tag, info, Box::new(tree)))
}
