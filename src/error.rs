//! Engine error taxonomy.
//!
//! Every fallible engine operation reports one of these. The type is `Clone`
//! because a single in-flight load may have to hand its failure to several
//! waiters (see [`crate::resources::cache`]).

/// Errors surfaced by asset loading, device setup and GPU uploads.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Network/filesystem failure while fetching mesh, material or texture bytes.
    #[error("failed to fetch asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    /// No adapter or device could be acquired. Fatal to engine start.
    #[error("no graphics device available: {0}")]
    DeviceUnavailable(String),

    /// A device-dependent operation ran before a device was bound.
    #[error("{0} requires a graphics device but none has been bound yet")]
    ResourceNotReady(&'static str),

    /// Decoding or uploading a texture failed.
    #[error("failed to upload texture {label}: {reason}")]
    TextureUpload { label: String, reason: String },

    /// The string could not be rasterized (no usable font, empty bitmap, ...).
    #[error("failed to rasterize text: {0}")]
    TextRaster(String),
}

impl EngineError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::AssetFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn texture(label: impl Into<String>, reason: impl ToString) -> Self {
        Self::TextureUpload {
            label: label.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
