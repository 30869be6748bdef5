use serde::{Deserialize, Serialize};

/// Conversion target used when the provider leaves the field empty.
pub const CONVERSION_TO_PDF: &str = "pdf";

/// One document-processing job as discovered from the external store.
/// Immutable once created; a job exists for the dispatcher only between
/// enqueue and post-dialogue release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub conversion_target: String,
    /// Opaque extra parameters forwarded verbatim to the host.
    #[serde(default)]
    pub extra_parameters: String,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_target(id, CONVERSION_TO_PDF)
    }

    pub fn with_target(id: impl Into<String>, conversion_target: impl Into<String>) -> Self {
        let mut conversion_target = conversion_target.into();
        if conversion_target.is_empty() {
            conversion_target = CONVERSION_TO_PDF.to_string();
        }
        Self {
            id: id.into(),
            conversion_target,
            extra_parameters: String::new(),
        }
    }

    /// Re-apply the target default after deserialization, where serde's
    /// `default` yields an empty string.
    pub fn normalized(mut self) -> Self {
        if self.conversion_target.is_empty() {
            self.conversion_target = CONVERSION_TO_PDF.to_string();
        }
        self
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[id = {}, convTo = {}]", self.id, self.conversion_target)
    }
}
