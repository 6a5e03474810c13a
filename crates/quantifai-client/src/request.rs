//! Wire projection of an [`UploadSelection`].

use quantifai_core::{Flag, UploadFile, UploadSelection};
use reqwest::multipart::{Form, Part};

use crate::error::AnalysisError;

/// Multipart payload for one `POST /analyze` call.
///
/// Built fresh from a selection for every submission. Text fields are kept
/// in the order they go on the wire: `start_date`, `end_date`, then the three
/// flag fields. Flags are always the literal strings `"true"`/`"false"`.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    file: UploadFile,
    fields: Vec<(&'static str, String)>,
}

impl AnalysisRequest {
    /// Returns `None` when the selection has no file.
    #[must_use]
    pub fn from_selection(selection: &UploadSelection) -> Option<Self> {
        let file = selection.file.clone()?;

        let mut fields = vec![
            (
                "start_date",
                selection.start_date.clone().unwrap_or_default(),
            ),
            ("end_date", selection.end_date.clone().unwrap_or_default()),
        ];
        for flag in Flag::ALL {
            fields.push((
                flag.wire_field(),
                encode_flag(selection.flags.get(flag)).to_string(),
            ));
        }

        Some(Self { file, fields })
    }

    #[must_use]
    pub fn file(&self) -> &UploadFile {
        &self.file
    }

    #[must_use]
    pub fn fields(&self) -> &[(&'static str, String)] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Assembles the multipart body. The file bytes are copied here, once
    /// per call.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Http`] if the file part's MIME type is
    /// rejected by `reqwest`.
    pub fn to_form(&self) -> Result<Form, AnalysisError> {
        let part = Part::bytes(self.file.bytes().to_vec())
            .file_name(self.file.name().to_owned())
            .mime_str(guess_mime(self.file.name()))?;

        let form = self
            .fields
            .iter()
            .fold(Form::new().part("file", part), |form, (name, value)| {
                form.text(*name, value.clone())
            });
        Ok(form)
    }
}

fn encode_flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
