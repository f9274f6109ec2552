use std::fmt;

/// One file handed over by the uploader: its display name, raw bytes and
/// image subtype (`png`, `jpeg`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub mime_subtype: String,
}

impl UploadedFile {
    pub fn new(
        filename: impl Into<String>,
        bytes: Vec<u8>,
        mime_subtype: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            bytes,
            mime_subtype: mime_subtype.into(),
        }
    }

    pub fn mime_type(&self) -> String {
        format!("image/{}", self.mime_subtype)
    }
}

/// The closet as the uploader currently reports it, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadBatch {
    files: Vec<UploadedFile>,
}

impl UploadBatch {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self { files }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn files(&self) -> &[UploadedFile] {
        self.files.as_slice()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedFile> {
        self.files.iter()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.files
            .iter()
            .map(|file| file.filename.as_str())
            .collect()
    }
}

/// Memoization key for an upload batch.
///
/// Built from the file count and the ordered filenames only. Two batches that
/// differ solely in file content map to the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint(batch: &UploadBatch) -> Fingerprint {
    Fingerprint(format!("{}-{}", batch.len(), batch.filenames().join("-")))
}
