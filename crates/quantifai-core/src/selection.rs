//! Upload capture: the user's file, date range and contextual flags.
//!
//! [`UploadCapture`] owns the current [`UploadSelection`] and is the only
//! thing that mutates it. The file is kept as an opaque byte handle; nothing
//! here parses its content or validates the dates.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectionError {
    /// A flag name outside `weather`/`holiday`/`promo`. This is a caller bug,
    /// not something to show the user.
    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A selected file: its name plus shared, immutable bytes.
///
/// Cloning is cheap; the payload is reference counted.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl UploadFile {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Reads a file from disk into a handle named after its base name.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::Io`] if the file cannot be read.
    pub async fn from_path(path: &Path) -> Result<Self, SelectionError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| SelectionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
            .into_owned();
        Ok(Self::new(name, bytes))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One of the three contextual toggles sent alongside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Weather,
    Holiday,
    Promo,
}

impl Flag {
    pub const ALL: [Flag; 3] = [Flag::Weather, Flag::Holiday, Flag::Promo];

    /// Multipart field name the analysis service reads this flag from.
    ///
    /// `Weather` travels as `rain`; the others keep their own name.
    #[must_use]
    pub fn wire_field(self) -> &'static str {
        match self {
            Flag::Weather => "rain",
            Flag::Holiday => "holiday",
            Flag::Promo => "promo",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flag::Weather => write!(f, "weather"),
            Flag::Holiday => write!(f, "holiday"),
            Flag::Promo => write!(f, "promo"),
        }
    }
}

impl FromStr for Flag {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weather" => Ok(Flag::Weather),
            "holiday" => Ok(Flag::Holiday),
            "promo" => Ok(Flag::Promo),
            _ => Err(SelectionError::UnknownFlag(s.to_string())),
        }
    }
}

/// The three flags, always all present.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    pub weather: bool,
    pub holiday: bool,
    pub promo: bool,
}

impl Flags {
    #[must_use]
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Weather => self.weather,
            Flag::Holiday => self.holiday,
            Flag::Promo => self.promo,
        }
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        match flag {
            Flag::Weather => self.weather = value,
            Flag::Holiday => self.holiday = value,
            Flag::Promo => self.promo = value,
        }
    }
}

/// The user's current input batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSelection {
    pub file: Option<UploadFile>,
    /// Stored verbatim; no format or ordering check.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub flags: Flags,
}

impl UploadSelection {
    /// A selection without a file cannot be submitted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.file.is_some()
    }
}

/// Owner of the [`UploadSelection`], mutated in response to user events.
#[derive(Debug, Default)]
pub struct UploadCapture {
    selection: UploadSelection,
}

impl UploadCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selected file. `None` means the picker was cancelled and
    /// keeps whatever file was already selected.
    pub fn select_file(&mut self, file: Option<UploadFile>) {
        if let Some(file) = file {
            self.selection.file = Some(file);
        }
    }

    pub fn set_date_range(&mut self, start: Option<String>, end: Option<String>) {
        self.selection.start_date = start;
        self.selection.end_date = end;
    }

    /// Sets a flag by name.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::UnknownFlag`] for any name other than
    /// `weather`, `holiday` or `promo`; the selection is left untouched.
    pub fn toggle_flag(&mut self, name: &str, value: bool) -> Result<(), SelectionError> {
        let flag = name.parse::<Flag>()?;
        self.set_flag(flag, value);
        Ok(())
    }

    pub fn set_flag(&mut self, flag: Flag, value: bool) {
        self.selection.flags.set(flag, value);
    }

    #[must_use]
    pub fn selection(&self) -> &UploadSelection {
        &self.selection
    }

    /// Clones the current selection. File bytes are shared, not copied.
    #[must_use]
    pub fn snapshot(&self) -> UploadSelection {
        self.selection.clone()
    }
}
