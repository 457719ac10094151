use serde::Serialize;

/// User-facing outcomes that are not successful extractions.
///
/// These are shown to users verbatim, so they never carry engine or
/// collaborator error details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionNotice {
    UnsupportedFileType,
    NoTextFound,
    ExtractionFailed,
}

impl ExtractionNotice {
    pub fn message(&self) -> &'static str {
        match self {
            Self::UnsupportedFileType => "Could not read this file type.",
            Self::NoTextFound => "No text found in image.",
            Self::ExtractionFailed => "Text extraction failed.",
        }
    }
}

impl std::fmt::Display for ExtractionNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
