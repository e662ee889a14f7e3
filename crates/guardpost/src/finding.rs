//! Parsed findings and the alerts derived from them.

use serde_json::Value;

/// The decoded body of one store object.
#[derive(Debug, Clone)]
pub struct Finding {
    body: Value,
}

impl Finding {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, serde_json::Error> {
        let body = serde_json::from_slice(raw)?;
        Ok(Self { body })
    }

    /// Severity as the detection service wrote it. GuardDuty-style feeds
    /// use numbers, others use strings; both render as-is. Absent or
    /// unrenderable severities become "Unknown".
    pub fn severity(&self) -> String {
        match self.body.get("severity") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "Unknown".to_string(),
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// Outbound notification derived from one finding. Ephemeral; built right
/// before dispatch and dropped after.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub subject: String,
    pub body: String,
}

impl Alert {
    pub fn from_finding(finding: &Finding) -> Self {
        let body = serde_json::to_string_pretty(finding.body())
            .unwrap_or_else(|_| finding.body().to_string());
        Self {
            subject: format!("Security Alert: Severity {}", finding.severity()),
            body,
        }
    }
}
