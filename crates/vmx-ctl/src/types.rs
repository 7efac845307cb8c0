//! Response envelope written to stdout, one JSON object per request.

use serde::Serialize;
use serde_json::Value;
use vmx_driver::DriverError;

/// Outcome of one request.
#[derive(Debug, Serialize)]
pub struct Response {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Operation name, when the request parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<&'static str>,
    /// Operation result; `null` for operations without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Failure details.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable kind, e.g. `snapshot_not_found`.
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl Response {
    /// A successful result.
    pub fn success(op: &'static str, result: Value) -> Self {
        Self {
            ok: true,
            op: Some(op),
            result: Some(result),
            error: None,
        }
    }

    /// A failed request.
    pub fn failure(op: Option<&'static str>, error: &DriverError) -> Self {
        Self {
            ok: false,
            op,
            result: None,
            error: Some(ErrorBody {
                kind: error.kind(),
                message: error.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let json = serde_json::to_value(Response::success("list_snapshots", serde_json::json!(["a"])))
            .unwrap();
        assert_eq!(json["ok"], true);
        assert_eq!(json["result"][0], "a");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_shape() {
        let error = DriverError::SnapshotNotFound("gold".into());
        let json = serde_json::to_value(Response::failure(Some("clone"), &error)).unwrap();
        assert_eq!(json["ok"], false);
        assert_eq!(json["error"]["kind"], "snapshot_not_found");
        assert_eq!(json["error"]["message"], "snapshot not found: gold");
        assert!(json.get("result").is_none());
    }
}
