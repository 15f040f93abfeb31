use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::{json, Value};

use crate::patcher::PatchError;

const INTERNAL_ERROR_CODE: &str = "INTERNAL_ERROR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    Usage,
    Storage,
}

impl CodedErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Usage => 2,
            Self::Storage => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Usage,
        }
    }

    pub fn storage(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Storage,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

pub fn find_patch_error(error: &Error) -> Option<&PatchError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<PatchError>())
}

/// Builds the `--json` failure envelope for any driver error.
pub fn envelope_for(error: &Error) -> ErrorEnvelope {
    if let Some(coded) = find_coded_error(error) {
        return coded.envelope();
    }

    if let Some(patch) = find_patch_error(error) {
        return ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: patch.code().to_owned(),
                message: format!("{error:#}"),
                details: Some(json!({ "kind": patch.code() })),
            },
        };
    }

    ErrorEnvelope {
        ok: false,
        error: ErrorEnvelopeBody {
            code: INTERNAL_ERROR_CODE.to_owned(),
            message: format!("{error:#}"),
            details: None,
        },
    }
}

pub fn exit_code_for(error: &Error) -> i32 {
    find_coded_error(error)
        .map(|coded| coded.kind.exit_code())
        .unwrap_or(1)
}
