//! JSON result line emitted for every driver call.

use serde::Serialize;

/// Outcome category reported to the node agent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum Status {
    /// The operation completed.
    Success,
    /// The operation failed; `message` explains why.
    Failure,
    /// The verb is not implemented by this driver.
    #[serde(rename = "Not supported")]
    NotSupported,
}

/// Result of one driver invocation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Outcome category.
    pub status: Status,
    /// Human-readable detail for failures and unsupported verbs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Device path after attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Unique volume name reported by `getvolumename`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_name: Option<String>,
    /// Attachment state reported by `isattached`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached: Option<bool>,
}

const RENDER_FALLBACK: &str = r#"{"status":"Failure","message":"cannot render driver result"}"#;

impl OperationResult {
    const fn with_status(status: Status, message: Option<String>) -> Self {
        Self {
            status,
            message,
            device: None,
            volume_name: None,
            attached: None,
        }
    }

    /// A bare success.
    #[must_use]
    pub const fn success() -> Self {
        Self::with_status(Status::Success, None)
    }

    /// A failure carrying `message`.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::with_status(Status::Failure, Some(message.into()))
    }

    /// An unsupported verb.
    #[must_use]
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::with_status(Status::NotSupported, Some(message.into()))
    }

    /// Sets the device path.
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Sets the volume name.
    #[must_use]
    pub fn with_volume_name(mut self, name: impl Into<String>) -> Self {
        self.volume_name = Some(name.into());
        self
    }

    /// Sets the attachment flag.
    #[must_use]
    pub const fn with_attached(mut self, attached: bool) -> Self {
        self.attached = Some(attached);
        self
    }

    /// Renders the single-line JSON form.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| RENDER_FALLBACK.to_owned())
    }

    /// Process exit code: zero on success, one otherwise.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self.status {
            Status::Success => 0,
            Status::Failure | Status::NotSupported => 1,
        }
    }
}
