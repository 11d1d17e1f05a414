use std::fmt;

/// Which on-device primitive an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Detection,
    Translation,
    Generation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Detection => "language detection",
            Capability::Translation => "translation",
            Capability::Generation => "generation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// The runtime does not provide the primitive at all.
    #[error("{0} capability is unavailable")]
    Unavailable(Capability),

    /// A single call failed; callers fall back and carry on.
    #[error("{capability} failed: {message}")]
    Failed { capability: Capability, message: String },
}

impl CapabilityError {
    pub fn failed(capability: Capability, message: impl Into<String>) -> Self {
        CapabilityError::Failed { capability, message: message.into() }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CapabilityError::Unavailable(_))
    }
}

pub type CapResult<T> = std::result::Result<T, CapabilityError>;
