//! The uniform success/failure result every action produces.

use crate::error::{CoreError, ErrorKind, ErrorRecord};
use crate::resolver::JsonMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    Success { data: JsonMap, cost: f64 },
    Failure(Failure),
}

/// User-facing failure: an actionable message plus structured detail for programs.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub message: String,
    pub kind: ErrorKind,
    pub status_code: Option<u16>,
    pub retry_after_secs: Option<u64>,
}

impl From<ErrorRecord> for Failure {
    fn from(record: ErrorRecord) -> Self {
        Self {
            message: record.message,
            kind: record.kind,
            status_code: record.status_code,
            retry_after_secs: record.retry_after_secs,
        }
    }
}

impl ResponseEnvelope {
    pub fn success(data: JsonMap) -> Self {
        Self::Success { data, cost: 0.0 }
    }

    /// Negative or non-finite costs are recorded as zero.
    pub fn success_with_cost(data: JsonMap, cost: f64) -> Self {
        let cost = if cost.is_finite() && cost > 0.0 { cost } else { 0.0 };
        Self::Success { data, cost }
    }

    pub fn failure(record: ErrorRecord) -> Self {
        Self::Failure(record.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn data(&self) -> Option<&JsonMap> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure(_) => None,
        }
    }

    pub fn failure_info(&self) -> Option<&Failure> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure_info().map(|f| f.message.as_str())
    }

    pub fn to_wire(&self) -> EnvelopeWire {
        match self {
            Self::Success { data, cost } => EnvelopeWire {
                ok: true,
                data: Some(data.clone()),
                error: None,
                error_kind: None,
                status_code: None,
                retry_after_secs: None,
                cost_usd: Some(*cost),
            },
            Self::Failure(failure) => EnvelopeWire {
                ok: false,
                data: None,
                error: Some(failure.message.clone()),
                error_kind: Some(failure.kind),
                status_code: failure.status_code,
                retry_after_secs: failure.retry_after_secs,
                cost_usd: None,
            },
        }
    }
}

/// Serialized form: `{ok, data?, error?}` plus optional structured failure detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeWire {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl From<ResponseEnvelope> for EnvelopeWire {
    fn from(envelope: ResponseEnvelope) -> Self {
        envelope.to_wire()
    }
}

impl TryFrom<EnvelopeWire> for ResponseEnvelope {
    type Error = CoreError;

    fn try_from(wire: EnvelopeWire) -> Result<Self, Self::Error> {
        match (wire.ok, wire.data, wire.error) {
            (true, Some(data), None) => Ok(Self::success_with_cost(
                data,
                wire.cost_usd.unwrap_or(0.0),
            )),
            (false, None, Some(message)) => Ok(Self::Failure(Failure {
                message,
                kind: wire.error_kind.unwrap_or(ErrorKind::Unexpected),
                status_code: wire.status_code,
                retry_after_secs: wire.retry_after_secs,
            })),
            (ok, _, _) => Err(CoreError::Invalid(format!(
                "envelope with ok={} must carry exactly one of data or error",
                ok
            ))),
        }
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResponseEnvelope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = EnvelopeWire::deserialize(deserializer)?;
        Self::try_from(wire).map_err(serde::de::Error::custom)
    }
}
