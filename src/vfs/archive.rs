use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder, Header};

use crate::error::{Error, Result};
use crate::vfs::memory::MemoryFs;
use crate::vfs::Vfs;

/// Read a tar (optionally gzip-compressed) archive into memory.
pub fn open_tar(path: &Path, gzip: bool) -> Result<MemoryFs> {
    let file = File::open(path).map_err(|e| Error::corrupt_archive(path, e))?;
    let reader: Box<dyn Read> = if gzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut archive = Archive::new(reader);
    let mut fs = MemoryFs::new();
    let entries = archive
        .entries()
        .map_err(|e| Error::corrupt_archive(path, e))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::corrupt_archive(path, e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| Error::corrupt_archive(path, e))?
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::corrupt_archive(path, e))?;
        fs.write(&name, &data)?;
    }
    Ok(fs)
}

/// Write every file of `src` into a tar archive at `out`. Entries are
/// appended in walk order (lexicographic) with a fixed mode and zero mtime,
/// so repeated exports of unchanged content are byte-identical.
pub fn write_tar(src: &dyn Vfs, out: &Path, gzip: bool) -> Result<()> {
    let file = File::create(out)?;
    if gzip {
        let encoder = GzEncoder::new(file, Compression::default());
        let mut builder = Builder::new(encoder);
        append_all(&mut builder, src)?;
        builder.into_inner()?.finish()?;
    } else {
        let mut builder = Builder::new(file);
        append_all(&mut builder, src)?;
        builder.finish()?;
    }
    Ok(())
}

fn append_all<W: Write>(builder: &mut Builder<W>, src: &dyn Vfs) -> Result<()> {
    for path in src.walk()? {
        let data = src.read(&path)?;
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, &path, data.as_slice())?;
    }
    Ok(())
}

/// Read a zip archive into memory.
pub fn open_zip(path: &Path) -> Result<MemoryFs> {
    let file = File::open(path).map_err(|e| Error::corrupt_archive(path, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| Error::corrupt_archive(path, e))?;

    let mut fs = MemoryFs::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::corrupt_archive(path, e))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::corrupt_archive(path, e))?;
        fs.write(&name, &data)?;
    }
    Ok(fs)
}

/// Write every file of `src` into a zip archive at `out`, in walk order.
pub fn write_zip(src: &dyn Vfs, out: &Path) -> Result<()> {
    let file = File::create(out)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in src.walk()? {
        writer
            .start_file(path.clone(), options)
            .map_err(zip_io_error)?;
        writer.write_all(&src.read(&path)?)?;
    }
    writer.finish().map_err(zip_io_error)?;
    Ok(())
}

fn zip_io_error(err: zip::result::ZipError) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::Other, err))
}
