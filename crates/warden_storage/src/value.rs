use std::{
    fs,
    io::{BufWriter, Write as _},
};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Read a JSON file, returning `None` if it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Utf8Path) -> Result<Option<T>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => return Err(error.into()),
    };

    serde_json::from_reader(std::io::BufReader::new(file))
        .map(Some)
        .map_err(|error| Error::Corrupt {
            path: path.to_owned(),
            error,
        })
}

/// Write a value as pretty JSON.
///
/// The value is written to a sibling temporary file which is then renamed
/// over `path`, so readers never observe a partially written file.
pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    let file = fs::File::create(&tmp)?;
    let mut buf = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut buf, value)?;
    buf.write_all(b"\n")?;
    buf.flush()?;

    let file = buf.into_inner().map_err(std::io::IntoInnerError::into_error)?;
    file.sync_all()?;
    drop(file);

    if let Err(error) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(error.into());
    }

    Ok(())
}

fn temp_path(path: &Utf8Path) -> Utf8PathBuf {
    let name = path.file_name().unwrap_or("state.json");
    path.with_file_name(format!(".{name}.tmp"))
}
