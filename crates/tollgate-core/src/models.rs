//! Typed records for the entities the dashboard consumes.
//!
//! Wire format is camelCase JSON. Required fields are non-optional:
//! decoding a payload that is missing one fails immediately with a
//! `serde_json` error rather than producing a half-populated record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decode a JSON value into a typed record, failing fast on malformed
/// input.
pub fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(value)
}

/// A telecom operator the billing platform integrates with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    /// Unique operator ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// ISO country code.
    pub country_code: String,
    /// Whether the integration is currently enabled.
    pub active: bool,
}

/// A billed client account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAccount {
    /// Unique client ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Operator this client is provisioned under.
    pub operator_id: String,
    /// Current account balance.
    pub balance: f64,
    /// ISO currency code for the balance.
    pub currency: String,
}

/// Status of an automation execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Queued, not yet started.
    Pending,
    /// Currently running.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
}

/// One run of an automation job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    /// Unique execution ID.
    pub id: String,
    /// Name of the automation job.
    pub job_name: String,
    /// Current status.
    pub status: ExecutionStatus,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished, if it has.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Status of an invoice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Not yet issued.
    Draft,
    /// Issued, awaiting payment.
    Issued,
    /// Paid in full.
    Paid,
    /// Past due date.
    Overdue,
}

/// A client invoice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Unique invoice ID.
    pub id: String,
    /// Client the invoice is billed to.
    pub client_id: String,
    /// Invoiced amount.
    pub amount: f64,
    /// ISO currency code.
    pub currency: String,
    /// Current status.
    pub status: InvoiceStatus,
    /// When the invoice was issued.
    pub issued_at: DateTime<Utc>,
}

/// Severity of an operational alert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational only.
    Info,
    /// Needs attention soon.
    Warning,
    /// Needs attention now.
    Critical,
}

/// A realtime notification pushed over the WebSocket channel.
///
/// Notifications are point-in-time events, not a backlog: consumers
/// see only the most recent one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// An automation execution changed status.
    #[serde(rename_all = "camelCase")]
    ExecutionUpdate {
        /// Execution that changed.
        execution_id: String,
        /// New status.
        status: ExecutionStatus,
    },
    /// An invoice was issued to a client.
    #[serde(rename_all = "camelCase")]
    InvoiceIssued {
        /// The new invoice.
        invoice_id: String,
        /// Client it was billed to.
        client_id: String,
        /// Invoiced amount.
        amount: f64,
    },
    /// A free-form operational alert.
    #[serde(rename_all = "camelCase")]
    Alert {
        /// Severity level.
        severity: AlertSeverity,
        /// Human-readable message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operator_roundtrip() {
        let op = Operator {
            id: "op-1".into(),
            name: "Nordtel".into(),
            country_code: "NO".into(),
            active: true,
        };
        let v = serde_json::to_value(&op).unwrap();
        assert_eq!(v["countryCode"], "NO");
        let back: Operator = decode(v).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn missing_required_field_fails() {
        let v = json!({"id": "op-1", "name": "Nordtel", "active": true});
        let result: Result<Operator, _> = decode(v);
        assert!(result.is_err());
    }

    #[test]
    fn client_account_decodes() {
        let v = json!({
            "id": "cl-9",
            "name": "Acme Telco",
            "operatorId": "op-1",
            "balance": 120.5,
            "currency": "EUR"
        });
        let client: ClientAccount = decode(v).unwrap();
        assert_eq!(client.operator_id, "op-1");
        assert!((client.balance - 120.5).abs() < f64::EPSILON);
    }

    #[test]
    fn execution_status_wire_names() {
        let e: ExecutionStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(e, ExecutionStatus::Running);
        assert_eq!(serde_json::to_string(&ExecutionStatus::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn execution_without_finish_time() {
        let v = json!({
            "id": "ex-1",
            "jobName": "rating-sync",
            "status": "running",
            "startedAt": "2026-02-01T10:00:00Z"
        });
        let e: Execution = decode(v).unwrap();
        assert!(e.finished_at.is_none());
        // finished_at is omitted from the wire when absent
        let out = serde_json::to_value(&e).unwrap();
        assert!(out.get("finishedAt").is_none());
    }

    #[test]
    fn invoice_decodes() {
        let v = json!({
            "id": "inv-3",
            "clientId": "cl-9",
            "amount": 42.0,
            "currency": "EUR",
            "status": "issued",
            "issuedAt": "2026-02-02T00:00:00Z"
        });
        let inv: Invoice = decode(v).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Issued);
    }

    #[test]
    fn notification_tagged_decoding() {
        let v = json!({
            "type": "execution_update",
            "executionId": "ex-1",
            "status": "completed"
        });
        let n: Notification = decode(v).unwrap();
        assert_eq!(
            n,
            Notification::ExecutionUpdate {
                execution_id: "ex-1".into(),
                status: ExecutionStatus::Completed,
            }
        );
    }

    #[test]
    fn notification_alert_roundtrip() {
        let n = Notification::Alert {
            severity: AlertSeverity::Critical,
            message: "rating backlog".into(),
        };
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["type"], "alert");
        assert_eq!(v["severity"], "critical");
        let back: Notification = decode(v).unwrap();
        assert_eq!(back, n);
    }

    #[test]
    fn notification_unknown_type_fails() {
        let v = json!({"type": "mystery", "message": "?"});
        let result: Result<Notification, _> = decode(v);
        assert!(result.is_err());
    }
}
