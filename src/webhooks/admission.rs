//! AdmissionReview envelope decoding and encoding.
//!
//! The candidate object is kept as the exact bytes the API server sent
//! (`RawValue`) so validation sees the document untouched. No admission
//! decision is made here.

use kube::core::GroupVersionKind;
use kube::core::admission::Operation;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use thiserror::Error;

use crate::webhooks::validator::Verdict;

/// Group of the AdmissionReview API
pub const ADMISSION_GROUP: &str = "admission.k8s.io";
/// API version used for responses when the request does not name one
pub const DEFAULT_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of the admission envelope
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Errors at the envelope boundary
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// Body is not an AdmissionReview
    #[error("Unable to deserialize AdmissionReview: {0}")]
    Decode(String),

    /// AdmissionReview carries no request
    #[error("AdmissionReview request is missing")]
    MissingRequest,

    /// Response could not be serialized
    #[error("Unable to serialize AdmissionReview response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The parts of an admission request the webhook consumes.
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewRequest {
    /// apiVersion of the enclosing AdmissionReview
    pub api_version: String,
    /// Correlation id the response must echo
    pub uid: String,
    pub operation: Option<Operation>,
    pub kind: Option<GroupVersionKind>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    /// Raw bytes of the candidate object, empty when absent
    pub object: Vec<u8>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewEnvelope {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    request: Option<RequestEnvelope>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestEnvelope {
    uid: String,
    #[serde(default)]
    kind: Option<GroupVersionKind>,
    #[serde(default)]
    operation: Option<Operation>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    object: Option<Box<RawValue>>,
}

/// Extract the request UID and raw candidate object from an envelope.
pub fn decode_request(body: &[u8]) -> Result<ReviewRequest, AdmissionError> {
    let envelope: ReviewEnvelope =
        serde_json::from_slice(body).map_err(|e| AdmissionError::Decode(e.to_string()))?;

    if let Some(kind) = envelope.kind.as_deref() {
        if kind != ADMISSION_REVIEW_KIND {
            return Err(AdmissionError::Decode(format!(
                "unexpected kind `{}`, expected `{}`",
                kind, ADMISSION_REVIEW_KIND
            )));
        }
    }

    let api_version = match envelope.api_version {
        Some(version) => {
            if version.split('/').next() != Some(ADMISSION_GROUP) {
                return Err(AdmissionError::Decode(format!(
                    "unexpected apiVersion `{}`, expected `{}/*`",
                    version, ADMISSION_GROUP
                )));
            }
            version
        }
        None => DEFAULT_API_VERSION.to_string(),
    };

    let request = envelope.request.ok_or(AdmissionError::MissingRequest)?;

    Ok(ReviewRequest {
        api_version,
        uid: request.uid,
        operation: request.operation,
        kind: request.kind,
        name: request.name,
        namespace: request.namespace,
        object: request
            .object
            .map(|raw| raw.get().as_bytes().to_vec())
            .unwrap_or_default(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseEnvelope<'a> {
    api_version: &'a str,
    kind: &'a str,
    response: ResponseBody<'a>,
}

#[derive(Serialize)]
struct ResponseBody<'a> {
    uid: &'a str,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<ResponseStatus<'a>>,
}

#[derive(Serialize)]
struct ResponseStatus<'a> {
    message: &'a str,
}

/// Wrap a verdict into an `admission.k8s.io/v1` AdmissionReview response.
pub fn encode_response(verdict: &Verdict) -> Result<Vec<u8>, AdmissionError> {
    encode_versioned_response(verdict, DEFAULT_API_VERSION)
}

/// Wrap a verdict into an AdmissionReview response of the given apiVersion.
pub fn encode_versioned_response(
    verdict: &Verdict,
    api_version: &str,
) -> Result<Vec<u8>, AdmissionError> {
    let envelope = ResponseEnvelope {
        api_version,
        kind: ADMISSION_REVIEW_KIND,
        response: ResponseBody {
            uid: verdict.uid(),
            allowed: verdict.is_allowed(),
            status: verdict
                .reason()
                .map(|message| ResponseStatus { message }),
        },
    };
    Ok(serde_json::to_vec(&envelope)?)
}
