//! The error envelope shared with the realtime transport.
//!
//! Every failure the SDK surfaces — precondition violations, attachment
//! failures, transport rejections — is described by the same envelope the
//! transport itself uses: a numeric code, an HTTP-ish status code, a
//! message, and an optional underlying cause. Causes chain, so a room
//! failure can carry the channel error that triggered it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RoomFeature;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// The catalogue of error codes the SDK itself produces.
///
/// Codes are stable wire-level integers; observability pipelines and other
/// SDKs match on them, so the numeric assignments in [`ErrorCode::code`]
/// must never be reshuffled. Per-feature codes (attachment/detachment) are
/// contiguous ranges offset by [`RoomFeature::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// The request was malformed or not valid in the current state.
    BadRequest,

    /// A failure the transport reported without a usable cause.
    UnknownError,

    /// A contributor's channel failed to attach.
    AttachmentFailed(RoomFeature),

    /// A contributor's channel failed to detach.
    DetachmentFailed(RoomFeature),

    /// The operation is not permitted while the room is failed.
    RoomInFailedState,

    /// The operation is not permitted while the room is releasing.
    RoomIsReleasing,

    /// The operation is not permitted once the room has been released.
    RoomIsReleased,

    /// A room was requested twice with differing options.
    InconsistentRoomOptions,

    /// A presence operation was attempted while the room was neither
    /// attached nor attaching.
    PresenceOperationRequiresRoomAttach(RoomFeature),

    /// The room left the attaching state without reaching attached while
    /// a presence operation was waiting on it.
    RoomTransitionedToInvalidStateForPresenceOperation,
}

impl ErrorCode {
    /// The wire-level numeric code.
    pub fn code(self) -> u32 {
        match self {
            ErrorCode::BadRequest => 40_000,
            ErrorCode::UnknownError => 50_000,
            ErrorCode::AttachmentFailed(f) => 102_001 + f.index(),
            ErrorCode::DetachmentFailed(f) => 102_050 + f.index(),
            ErrorCode::RoomInFailedState => 102_101,
            ErrorCode::RoomIsReleasing => 102_102,
            ErrorCode::RoomIsReleased => 102_103,
            ErrorCode::InconsistentRoomOptions => 102_104,
            ErrorCode::PresenceOperationRequiresRoomAttach(_) => 102_106,
            ErrorCode::RoomTransitionedToInvalidStateForPresenceOperation => {
                102_107
            }
        }
    }

    /// The HTTP-style status code paired with this error.
    ///
    /// 400 marks caller mistakes (wrong room state, mismatched options);
    /// 500 marks failures originating in the transport or the room's own
    /// recovery machinery.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCode::BadRequest
            | ErrorCode::RoomInFailedState
            | ErrorCode::RoomIsReleasing
            | ErrorCode::RoomIsReleased
            | ErrorCode::InconsistentRoomOptions
            | ErrorCode::PresenceOperationRequiresRoomAttach(_) => 400,
            ErrorCode::UnknownError
            | ErrorCode::AttachmentFailed(_)
            | ErrorCode::DetachmentFailed(_)
            | ErrorCode::RoomTransitionedToInvalidStateForPresenceOperation => {
                500
            }
        }
    }

    /// Human-readable default message for the code.
    pub fn default_message(self) -> String {
        match self {
            ErrorCode::BadRequest => "bad request".into(),
            ErrorCode::UnknownError => "unknown error".into(),
            ErrorCode::AttachmentFailed(f) => {
                format!("the {f} feature failed to attach")
            }
            ErrorCode::DetachmentFailed(f) => {
                format!("the {f} feature failed to detach")
            }
            ErrorCode::RoomInFailedState => {
                "cannot perform operation; room is in failed state".into()
            }
            ErrorCode::RoomIsReleasing => {
                "cannot perform operation; room is releasing".into()
            }
            ErrorCode::RoomIsReleased => {
                "cannot perform operation; room is released".into()
            }
            ErrorCode::InconsistentRoomOptions => {
                "room already exists with different options".into()
            }
            ErrorCode::PresenceOperationRequiresRoomAttach(f) => {
                format!(
                    "presence operations on the {f} feature require the \
                     room to be attached"
                )
            }
            ErrorCode::RoomTransitionedToInvalidStateForPresenceOperation => {
                "room transitioned to an invalid state while a presence \
                 operation was waiting for attachment"
                    .into()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorInfo
// ---------------------------------------------------------------------------

/// The transport's error envelope: `{code, statusCode, message, cause}`.
///
/// `cause` chains envelopes, so a room-level error (say, `attachment
/// failed: presence`) can carry the channel error that produced it. The
/// chain is preserved across serialization.
#[derive(
    Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "camelCase")]
#[error("{message} (code {code}, status {status_code})")]
pub struct ErrorInfo {
    pub code: u32,
    pub status_code: u16,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<ErrorInfo>>,
}

impl ErrorInfo {
    /// Builds an envelope from one of the SDK's own codes.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code: code.code(),
            status_code: code.status_code(),
            message: code.default_message(),
            cause: None,
        }
    }

    /// Builds an envelope from an SDK code with an underlying cause.
    pub fn with_cause(code: ErrorCode, cause: ErrorInfo) -> Self {
        Self {
            cause: Some(Box::new(cause)),
            ..Self::from_code(code)
        }
    }

    /// Builds a raw envelope, for errors originating in the transport.
    pub fn new(code: u32, status_code: u16, message: impl fmt::Display) -> Self {
        Self {
            code,
            status_code,
            message: message.to_string(),
            cause: None,
        }
    }

    /// The fabricated cause used when the transport reports a failure
    /// without a reason. This should not happen; when it does, the SDK
    /// logs it and substitutes this rather than dropping the event.
    pub fn unknown() -> Self {
        Self::from_code(ErrorCode::UnknownError)
    }

    /// Whether this envelope carries the given SDK code.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code == code.code()
    }
}

// =========================================================================
// Tests
// =========================================================================
