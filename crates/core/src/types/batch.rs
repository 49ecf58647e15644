//! Batched export wire types.
//!
//! The resumable customer export is a sequence of `fetchBatch` calls. The
//! server holds no cursor; the client carries `offset` forward from each
//! response's `newOffset`.
//!
//! ```text
//! {"success":true,"rows":[...],"newOffset":500,"totalCount":1200,"completed":false}
//! {"success":true,"rows":[...],"newOffset":1000,"totalCount":-1,"completed":false}
//! {"success":false,"message":"Security check failed."}
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::contact::ContactRecord;

/// Wire value of `totalCount` on pages after the first.
pub const TOTAL_COUNT_SENTINEL: i64 = -1;

/// Size of the candidate email set.
///
/// Only the first page (`offset == 0`) pays for the count; later pages send
/// the `-1` sentinel, which drivers must never let overwrite a known total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalCount {
    Known(u64),
    #[default]
    Unknown,
}

impl TotalCount {
    /// Returns the count if known.
    #[must_use]
    pub const fn known(self) -> Option<u64> {
        match self {
            Self::Known(n) => Some(n),
            Self::Unknown => None,
        }
    }

    /// Keep an already known total when a later page reports the sentinel.
    #[must_use]
    pub const fn or(self, previous: Self) -> Self {
        match self {
            Self::Known(_) => self,
            Self::Unknown => previous,
        }
    }
}

impl Serialize for TotalCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(n) => serializer.serialize_u64(*n),
            Self::Unknown => serializer.serialize_i64(TOTAL_COUNT_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for TotalCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(u64::try_from(raw).map_or(Self::Unknown, Self::Known))
    }
}

/// One page of the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub rows: Vec<ContactRecord>,
    /// Offset to request next: the request offset plus `rows.len()`.
    pub new_offset: u64,
    pub total_count: TotalCount,
    /// `true` iff this page held fewer rows than the batch size.
    pub completed: bool,
}

/// Response envelope of the batch endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse", into = "WireResponse")]
pub enum BatchResponse {
    Success(BatchResult),
    Failure { message: String },
}

impl BatchResponse {
    /// Build a failure response.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Flat JSON shape shared by both outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rows: Option<Vec<ContactRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_count: Option<TotalCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl From<BatchResponse> for WireResponse {
    fn from(response: BatchResponse) -> Self {
        match response {
            BatchResponse::Success(result) => Self {
                success: true,
                rows: Some(result.rows),
                new_offset: Some(result.new_offset),
                total_count: Some(result.total_count),
                completed: Some(result.completed),
                message: None,
            },
            BatchResponse::Failure { message } => Self {
                success: false,
                rows: None,
                new_offset: None,
                total_count: None,
                completed: None,
                message: Some(message),
            },
        }
    }
}

impl TryFrom<WireResponse> for BatchResponse {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        if !wire.success {
            return Ok(Self::Failure {
                message: wire
                    .message
                    .unwrap_or_else(|| "export request failed".to_owned()),
            });
        }

        let new_offset = wire.new_offset.ok_or("missing field `newOffset`")?;
        let completed = wire.completed.ok_or("missing field `completed`")?;

        Ok(Self::Success(BatchResult {
            rows: wire.rows.unwrap_or_default(),
            new_offset,
            total_count: wire.total_count.unwrap_or_default(),
            completed,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_total_count_wire_values() {
        assert_eq!(serde_json::to_value(TotalCount::Known(1200)).unwrap(), json!(1200));
        assert_eq!(serde_json::to_value(TotalCount::Unknown).unwrap(), json!(-1));
        assert_eq!(
            serde_json::from_value::<TotalCount>(json!(-1)).unwrap(),
            TotalCount::Unknown
        );
        assert_eq!(
            serde_json::from_value::<TotalCount>(json!(0)).unwrap(),
            TotalCount::Known(0)
        );
    }

    #[test]
    fn test_total_count_sentinel_never_overwrites() {
        let first = TotalCount::Known(1200);
        assert_eq!(TotalCount::Unknown.or(first), first);
        assert_eq!(TotalCount::Known(5).or(first), TotalCount::Known(5));
    }

    #[test]
    fn test_success_envelope_shape() {
        let response = BatchResponse::Success(BatchResult {
            rows: vec![],
            new_offset: 1200,
            total_count: TotalCount::Unknown,
            completed: true,
        });
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "success": true,
                "rows": [],
                "newOffset": 1200,
                "totalCount": -1,
                "completed": true
            })
        );
        let back: BatchResponse = serde_json::from_value(value).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let value = serde_json::to_value(BatchResponse::failure("Security check failed.")).unwrap();
        assert_eq!(
            value,
            json!({"success": false, "message": "Security check failed."})
        );
    }

    #[test]
    fn test_success_missing_offset_is_rejected() {
        let result = serde_json::from_value::<BatchResponse>(json!({
            "success": true,
            "rows": [],
            "completed": false
        }));
        assert!(result.is_err());
    }
}
