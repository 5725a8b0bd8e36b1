//! Procedure return values.

/// Status code returned as the first value of every procedure call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdbStatus {
    /// The image was loaded.
    Success,
    /// The user dismissed the item chooser.
    Cancel,
    /// The load failed and one message was shown.
    ExecutionError,
    /// The call itself was malformed; nothing was attempted.
    CallingError,
}

impl PdbStatus {
    /// The host's numeric status code.
    pub fn code(self) -> i32 {
        match self {
            PdbStatus::ExecutionError => 0,
            PdbStatus::CallingError => 1,
            PdbStatus::Success => 3,
            PdbStatus::Cancel => 4,
        }
    }
}

/// The values handed back to the host.
///
/// The image id is present only on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnValues {
    /// Always the first return value.
    pub status: PdbStatus,
    /// ID of the created image, present only on success.
    pub image: Option<u32>,
}

impl ReturnValues {
    /// Success with the created image.
    pub fn success(image: u32) -> Self {
        Self {
            status: PdbStatus::Success,
            image: Some(image),
        }
    }

    /// A status with no image.
    pub fn status(status: PdbStatus) -> Self {
        Self {
            status,
            image: None,
        }
    }

    /// Number of return values: the status, plus the image on success.
    pub fn len(&self) -> usize {
        1 + usize::from(self.image.is_some())
    }

    /// Whether the status is `Success`.
    pub fn is_success(&self) -> bool {
        self.status == PdbStatus::Success
    }
}
