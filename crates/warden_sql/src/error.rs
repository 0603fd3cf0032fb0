use camino::Utf8PathBuf;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unable to open database {path}: {error}")]
    Open {
        path: Utf8PathBuf,
        error: rusqlite::Error,
    },

    #[error("SQL error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        if std::mem::discriminant(self) != std::mem::discriminant(other) {
            return false;
        }

        // Good enough for testing purposes
        format!("{self:?}") == format!("{other:?}")
    }
}
