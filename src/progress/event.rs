//! Progress events and their wire representation
//!
//! Events are ephemeral: they exist only in transit between the pipeline and
//! subscribers and are never persisted. The status tag is a closed set
//! rather than a free-form string, and the optional payload is structured
//! JSON rather than an open-ended dynamic object.

use serde::{Deserialize, Serialize};

/// Status tag attached to every progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Source file is being decoded and parsed
    Reading,
    /// Statistics are being derived from parsed records
    Embedding,
    /// Records are being binned into clusters
    Clustering,
    /// Result invariants are being checked and the result assembled
    Verification,
    /// The run finished and a result is available
    Complete,
    /// The run moved to its failed state
    Error,
}

/// One stage/percentage update for a job
///
/// `progress` is 0-100 and non-decreasing over the lifetime of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Opaque caller-supplied token correlating the run with its stream
    pub job_id: String,
    /// Closed status tag
    pub status: AnalysisStatus,
    /// Percentage complete, 0-100
    pub progress: u8,
    /// Human-readable stage label
    pub stage: String,
    /// Free-text detail for the stage
    pub message: String,
    /// Optional structured payload (summary on completion, detail on error)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Messages exchanged on the progress channel, newline-delimited JSON
///
/// `subscribe`/`unsubscribe` are control messages mirroring local listener
/// state to the counterparty; `analysis_progress` carries the events
/// themselves in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Start fanning events for a job to this connection
    Subscribe {
        /// Job being subscribed to
        #[serde(rename = "jobId")]
        job_id: String,
    },
    /// Stop fanning events for a job to this connection
    Unsubscribe {
        /// Job being unsubscribed from
        #[serde(rename = "jobId")]
        job_id: String,
    },
    /// A progress update for one job
    AnalysisProgress(ProgressEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_wire_shape() {
        let msg = WireMessage::Subscribe { job_id: "job-1".into() };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "subscribe", "jobId": "job-1"}));
    }

    #[test]
    fn progress_wire_shape_round_trips() {
        let event = ProgressEvent {
            job_id: "job-1".into(),
            status: AnalysisStatus::Clustering,
            progress: 50,
            stage: "Clustering records".into(),
            message: "Binning by GC content".into(),
            data: None,
        };
        let msg = WireMessage::AnalysisProgress(event.clone());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"analysis_progress\""));
        assert!(json.contains("\"jobId\":\"job-1\""));
        assert!(json.contains("\"status\":\"clustering\""));
        // data is omitted when absent
        assert!(!json.contains("\"data\""));

        let parsed: WireMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, WireMessage::AnalysisProgress(event));
    }

    #[test]
    fn payload_survives_round_trip() {
        let event = ProgressEvent {
            job_id: "j".into(),
            status: AnalysisStatus::Complete,
            progress: 100,
            stage: "Analysis complete".into(),
            message: "done".into(),
            data: Some(serde_json::json!({"totalReads": 2})),
        };
        let json = serde_json::to_string(&WireMessage::AnalysisProgress(event.clone())).unwrap();
        let parsed: WireMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, WireMessage::AnalysisProgress(event));
    }
}
