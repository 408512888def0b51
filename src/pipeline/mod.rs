//! Analysis pipeline orchestration
//!
//! One [`Pipeline::run`] call drives a job through a strictly forward stage
//! machine: parsing, statistics, clustering, verification, finalization.
//! There are no retries within a run; any stage fault moves the job straight
//! to the failed state with the triggering error attached, and a failed run
//! can only be restarted from scratch with fresh input. Each run owns its
//! records, statistics, and clusters exclusively, so different job ids run
//! fully independently.
//!
//! One [`ProgressEvent`] is published per stage transition, with percentages
//! drawn from a fixed schedule (10/30/50/70/85/100). Publication is
//! fire-and-forget: subscriber presence never affects the run.

use crate::error::{Result, SeqscopeError};
use crate::io::{parse_records, DataSource};
use crate::operations::{cluster_records, compute_stats, Clustering, ClusteringConfig};
use crate::progress::{AnalysisStatus, ProgressEvent, ProgressSink};
use crate::types::AnalysisResult;
use tracing::{debug, info};

/// Stages of one analysis run, in transition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum JobStage {
    /// Run accepted, nothing started yet
    Initializing,
    /// Decoding bytes and parsing records
    Parsing,
    /// Deriving quality statistics
    StatsComputing,
    /// Binning records into clusters
    Clustering,
    /// Checking result invariants
    Verifying,
    /// Assembling the final result
    Finalizing,
    /// Terminal success state
    Complete,
    /// Terminal failure state, reachable from any non-terminal stage
    Failed,
}

impl JobStage {
    /// Status tag published for this stage
    pub fn status(self) -> AnalysisStatus {
        match self {
            JobStage::Initializing | JobStage::Parsing => AnalysisStatus::Reading,
            JobStage::StatsComputing => AnalysisStatus::Embedding,
            JobStage::Clustering => AnalysisStatus::Clustering,
            JobStage::Verifying | JobStage::Finalizing => AnalysisStatus::Verification,
            JobStage::Complete => AnalysisStatus::Complete,
            JobStage::Failed => AnalysisStatus::Error,
        }
    }

    /// Scheduled completion percentage on entering this stage
    pub fn progress(self) -> u8 {
        match self {
            JobStage::Initializing => 0,
            JobStage::Parsing => 10,
            JobStage::StatsComputing => 30,
            JobStage::Clustering => 50,
            JobStage::Verifying => 70,
            JobStage::Finalizing => 85,
            JobStage::Complete | JobStage::Failed => 100,
        }
    }

    /// Human-readable stage label
    pub fn label(self) -> &'static str {
        match self {
            JobStage::Initializing => "Initializing",
            JobStage::Parsing => "Reading sequences",
            JobStage::StatsComputing => "Computing statistics",
            JobStage::Clustering => "Clustering records",
            JobStage::Verifying => "Verifying results",
            JobStage::Finalizing => "Finalizing",
            JobStage::Complete => "Analysis complete",
            JobStage::Failed => "Analysis failed",
        }
    }
}

/// Sequences parser, statistics engine, and clustering estimator into one
/// analysis run keyed by a caller-supplied job id
pub struct Pipeline<S: ProgressSink> {
    sink: S,
    clustering: ClusteringConfig,
}

impl<S: ProgressSink> Pipeline<S> {
    /// Create a pipeline publishing progress to `sink`
    pub fn new(sink: S) -> Self {
        Self { sink, clustering: ClusteringConfig::default() }
    }

    /// Create a pipeline with a non-default clustering configuration
    pub fn with_clustering_config(sink: S, clustering: ClusteringConfig) -> Self {
        Self { sink, clustering }
    }

    /// Run one complete analysis for `job_id`
    ///
    /// On success the returned [`AnalysisResult`] is the run's only output
    /// and is owned by the caller. On failure the run's terminal error event
    /// has been published and the error is returned; no partial result is
    /// produced.
    ///
    /// # Errors
    ///
    /// - [`SeqscopeError::EmptyInput`] when parsing yields zero records
    /// - [`SeqscopeError::Io`] when a file source cannot be read
    /// - [`SeqscopeError::Stage`] when verification finds a broken invariant
    pub fn run(&self, job_id: &str, source: &DataSource) -> Result<AnalysisResult> {
        let mut stage = JobStage::Initializing;
        match self.run_inner(job_id, source, &mut stage) {
            Ok(result) => {
                info!(job_id, "analysis run complete");
                Ok(result)
            }
            Err(err) => {
                info!(job_id, failed_stage = stage.label(), error = %err, "analysis run failed");
                self.sink.publish(ProgressEvent {
                    job_id: job_id.to_string(),
                    status: AnalysisStatus::Error,
                    progress: stage.progress(),
                    stage: JobStage::Failed.label().to_string(),
                    message: err.to_string(),
                    data: None,
                });
                Err(err)
            }
        }
    }

    fn run_inner(
        &self,
        job_id: &str,
        source: &DataSource,
        stage: &mut JobStage,
    ) -> Result<AnalysisResult> {
        self.advance(job_id, stage, JobStage::Parsing, "Decoding and parsing FASTQ input", None);
        let text = source.decode()?;
        let records = parse_records(&text);
        debug!(job_id, records = records.len(), "parsed input");
        if records.is_empty() {
            return Err(SeqscopeError::EmptyInput);
        }

        self.advance(job_id, stage, JobStage::StatsComputing, "Computing quality statistics", None);
        // Statistics and clustering are independent consumers of the parsed
        // records and run side by side.
        let (stats, clustering) = rayon::join(
            || compute_stats(&records),
            || cluster_records(&records, &self.clustering),
        );

        self.advance(
            job_id,
            stage,
            JobStage::Clustering,
            format!("Grouped {} records into {} clusters", records.len(), clustering.cluster_count()),
            None,
        );

        self.advance(job_id, stage, JobStage::Verifying, "Checking result invariants", None);
        verify_clustering(&clustering)?;

        self.advance(job_id, stage, JobStage::Finalizing, "Assembling analysis result", None);
        let result = AnalysisResult {
            stats,
            clusters: clustering.points,
            similarity_matrix: clustering.matrix,
            cluster_names: clustering.cluster_names,
        };

        let summary = serde_json::json!({
            "totalReads": result.stats.total_reads,
            "clusterCount": result.cluster_names.len(),
        });
        self.advance(job_id, stage, JobStage::Complete, "All processing finished", Some(summary));
        Ok(result)
    }

    fn advance(
        &self,
        job_id: &str,
        stage: &mut JobStage,
        next: JobStage,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        debug_assert!(next > *stage, "stage transitions must be strictly forward");
        *stage = next;
        self.sink.publish(ProgressEvent {
            job_id: job_id.to_string(),
            status: next.status(),
            progress: next.progress(),
            stage: next.label().to_string(),
            message: message.into(),
            data,
        });
    }
}

/// Check the invariants the clustering estimator promises
fn verify_clustering(clustering: &Clustering) -> Result<()> {
    let fail = |msg: String| SeqscopeError::Stage { stage: JobStage::Verifying.label().to_string(), msg };
    let count = clustering.cluster_count();
    if clustering.matrix.dim() != count {
        return Err(fail(format!(
            "similarity matrix is {}x{} but there are {count} clusters",
            clustering.matrix.dim(),
            clustering.matrix.dim(),
        )));
    }
    for i in 0..count {
        if clustering.matrix.get(i, i) != 1.0 {
            return Err(fail(format!("similarity diagonal at {i} is not 1.0")));
        }
        for j in 0..count {
            let value = clustering.matrix.get(i, j);
            if !(0.0..=1.0).contains(&value) {
                return Err(fail(format!("similarity [{i}][{j}] = {value} outside [0, 1]")));
            }
        }
    }
    if let Some(point) = clustering.points.iter().find(|p| p.cluster_id >= count) {
        return Err(fail(format!(
            "point {} references cluster {} of {count}",
            point.sequence_id, point.cluster_id,
        )));
    }
    Ok(())
}
