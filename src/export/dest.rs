use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::vfs::{Address, Backend};

/// Archive format of an export, selected explicitly or derived from the
/// destination's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Uncompressed tar with the `.bento` extension; the default.
    Bento,
    /// Gzip-compressed tar.
    Gz,
    /// Zip archive.
    Zip,
    /// Plain directory tree, no container file.
    Folder,
}

impl Format {
    pub fn from_name(name: &str) -> Result<Format> {
        match name {
            "bento" => Ok(Format::Bento),
            "gz" => Ok(Format::Gz),
            "zip" => Ok(Format::Zip),
            "folder" => Ok(Format::Folder),
            other => Err(Error::invalid_destination(
                other,
                "unsupported output format, expected bento, gz, zip or folder",
            )),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext {
            "bento" => Some(Format::Bento),
            "gz" => Some(Format::Gz),
            "zip" => Some(Format::Zip),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Bento => "bento",
            Format::Gz => "gz",
            Format::Zip => "zip",
            Format::Folder => "",
        }
    }
}

/// Fully validated export target: the concrete format and the exact path the
/// artifact will be written to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDest {
    pub format: Format,
    pub path: PathBuf,
}

/// Apply the destination rules:
///
/// - `zip://` forces the zip format and uses the path verbatim.
/// - An existing directory (or a trailing-separator path, which must exist as
///   a directory) receives `<export_name>.<ext>`; `subpath` may select an
///   existing subdirectory inside it.
/// - Anything else names the output file: a recognized extension is kept
///   verbatim and selects the format, otherwise `.<format>` is appended. The
///   parent directory must exist.
///
/// All failures here are raised before any destination-side I/O happens.
pub fn resolve_destination(
    addr: &Address,
    export_name: &str,
    output_format: Option<&str>,
    subpath: Option<&str>,
) -> Result<ResolvedDest> {
    let requested = output_format.map(Format::from_name).transpose()?;

    if addr.backend == Backend::Zip {
        if subpath.is_some() {
            return Err(Error::invalid_destination(
                addr.path.display(),
                "subpath requires a directory destination",
            ));
        }
        if !matches!(requested, None | Some(Format::Zip)) {
            return Err(Error::invalid_destination(
                addr.path.display(),
                "zip destinations only support the zip format",
            ));
        }
        ensure_parent_exists(&addr.path)?;
        return Ok(ResolvedDest {
            format: Format::Zip,
            path: addr.path.clone(),
        });
    }

    let is_directory_target = addr.path.is_dir() || addr.dir_hint;
    if is_directory_target {
        if !addr.path.is_dir() {
            return Err(Error::invalid_destination(
                addr.path.display(),
                "does not resolve to an existing directory",
            ));
        }
        let mut base = addr.path.clone();
        if let Some(subpath) = subpath {
            base = base.join(subpath.trim_start_matches(['/', '\\']));
            if !base.is_dir() {
                return Err(Error::invalid_destination(
                    base.display(),
                    "subpath does not exist inside the destination",
                ));
            }
        }
        let format = requested.unwrap_or(Format::Bento);
        let path = match format {
            Format::Folder => base.join(export_name),
            _ => base.join(format!("{export_name}.{}", format.extension())),
        };
        return Ok(ResolvedDest { format, path });
    }

    // file target
    if subpath.is_some() {
        return Err(Error::invalid_destination(
            addr.path.display(),
            "subpath requires a directory destination",
        ));
    }
    ensure_parent_exists(&addr.path)?;

    let from_ext = addr
        .path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::from_extension);
    match (requested, from_ext) {
        (None, Some(format)) => Ok(ResolvedDest {
            format,
            path: addr.path.clone(),
        }),
        (Some(format), Some(derived)) => {
            if format != derived {
                return Err(Error::invalid_destination(
                    addr.path.display(),
                    format!(
                        "output format {:?} conflicts with the destination extension",
                        format.extension()
                    ),
                ));
            }
            Ok(ResolvedDest {
                format,
                path: addr.path.clone(),
            })
        }
        (requested, None) => {
            let format = requested.unwrap_or(Format::Bento);
            let path = match format {
                Format::Folder => addr.path.clone(),
                _ => {
                    let mut raw = addr.path.clone().into_os_string();
                    raw.push(format!(".{}", format.extension()));
                    PathBuf::from(raw)
                }
            };
            Ok(ResolvedDest { format, path })
        }
    }
}

fn ensure_parent_exists(path: &std::path::Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if parent.is_dir() {
                Ok(())
            } else {
                Err(Error::invalid_destination(
                    path.display(),
                    "parent directory does not exist",
                ))
            }
        }
        _ => Ok(()),
    }
}
