//! Request and response bodies of the write endpoints.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ledger::ChangeKind;
use crate::types::{DbId, ShiftId};

/// One entry of a batch update, `{targetId, kind, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchChange {
    pub target_id: ShiftId,
    pub kind: ChangeKind,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub changes: Vec<BatchChange>,
}

/// Soft business-rule violation accompanying a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchWarning {
    #[serde(default)]
    pub target_id: Option<ShiftId>,
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// Result of a successful batch write.
///
/// `created`, `updated` and `deleted` may be sent either as counts or as
/// lists of ids; both are read as counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<BatchWarning>,
    #[serde(default, deserialize_with = "count_or_list")]
    pub created: u64,
    #[serde(default, deserialize_with = "count_or_list")]
    pub updated: u64,
    #[serde(default, deserialize_with = "count_or_list")]
    pub deleted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub worker_id: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub template_id: DbId,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn count_or_list<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(0),
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("invalid count: {n}"))),
        serde_json::Value::Array(items) => Ok(items.len() as u64),
        other => Err(serde::de::Error::custom(format!(
            "expected a count or a list, got {other}"
        ))),
    }
}
