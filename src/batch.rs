//! Batch generation
//!
//! One template, many labels: every `{serial}` placeholder is replaced with
//! an incrementing, zero-padded counter and each label is rendered on its
//! own. A failing label is reported and the rest of the batch carries on.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::notice::Notice;
use crate::pipeline::{CompiledLabel, LabelPipeline, PipelineError, RenderRequest, ResolvedLabel};

pub const MAX_BATCH_SIZE: u32 = 10_000;

const RENDER_OPERATION: &str = "Label render";
const WRITE_OPERATION: &str = "Label write";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub source: RenderRequest,
    #[serde(default = "default_start")]
    pub start: u64,
    pub count: u32,
    /// Minimum digits in the serial, zero-padded.
    #[serde(default)]
    pub pad_width: usize,
}

fn default_start() -> u64 { 1 }

impl BatchRequest {
    pub fn serial(&self, index: u32) -> String {
        let n = self.start.saturating_add(u64::from(index));
        format!("{n:0width$}", width = self.pad_width)
    }

    /// Last serial in the batch, or `None` when the range passes `u64::MAX`.
    pub fn last_serial(&self) -> Option<u64> {
        self.start.checked_add(u64::from(self.count.checked_sub(1)?))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFailure {
    pub index: usize,
    #[serde(default)]
    pub serial: Option<String>,
    pub notice: Notice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_id: String,
    pub requested: usize,
    pub labels: Vec<CompiledLabel>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    fn collect(requested: usize, results: Vec<(Option<String>, Result<CompiledLabel, PipelineError>)>) -> Self {
        let mut labels = Vec::with_capacity(requested);
        let mut failures = vec![];

        for (index, (serial, result)) in results.into_iter().enumerate() {
            match result {
                Ok(label) => labels.push(label),
                Err(e) => {
                    warn!(index, serial = serial.as_deref().unwrap_or("-"), error = %e, "batch label failed");
                    failures.push(BatchFailure { index, serial, notice: Notice::failure(RENDER_OPERATION, &e) });
                }
            }
        }

        let report = Self { batch_id: Uuid::new_v4().to_string(), requested, labels, failures };
        info!(batch = %report.batch_id, ok = report.labels.len(), failed = report.failures.len(), "batch finished");
        report
    }

    pub fn succeeded(&self) -> usize {
        self.labels.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn summary(&self) -> String {
        if self.failures.is_empty() {
            format!("Generated {} of {} labels", self.succeeded(), self.requested)
        } else {
            format!("Generated {} of {} labels ({} failed)", self.succeeded(), self.requested, self.failed())
        }
    }

    /// Aggregate notification for the whole batch.
    pub fn notice(&self) -> Notice {
        match (self.succeeded(), self.failed()) {
            (_, 0) => Notice::success("Batch generated", self.summary()),
            (0, _) => Notice {
                level: crate::notice::NoticeLevel::Error,
                title: "Batch generation failed".to_string(),
                message: self.summary(),
            },
            _ => Notice::warning("Batch partially generated", self.summary()),
        }
    }
}

impl LabelPipeline {
    /// Render `count` labels from one source, substituting serials.
    ///
    /// An unknown template fails the whole call; anything after that is
    /// reported per label.
    pub fn render_batch(&self, request: &BatchRequest) -> Result<BatchReport, PipelineError> {
        if request.count == 0 || request.count > MAX_BATCH_SIZE {
            return Err(PipelineError::CompilationError(format!(
                "batch count must be between 1 and {MAX_BATCH_SIZE}, got {}",
                request.count
            )));
        }
        if request.last_serial().is_none() {
            return Err(PipelineError::CompilationError(format!(
                "serials {}.. for {} labels run past {}",
                request.start,
                request.count,
                u64::MAX
            )));
        }
        let base = self.resolve(&request.source)?;

        let results = (0..request.count)
            .into_par_iter()
            .map(|i| {
                let serial = request.serial(i);
                let resolved = ResolvedLabel { spec: base.spec.with_serial(&serial), template: base.template };
                (Some(serial), self.compile(&resolved))
            })
            .collect();

        Ok(BatchReport::collect(request.count as usize, results))
    }

    /// Render independent requests. Each one succeeds or fails on its own.
    pub fn render_many(&self, requests: &[RenderRequest]) -> BatchReport {
        let results = requests
            .par_iter()
            .map(|request| (None, self.render_label(request)))
            .collect();

        BatchReport::collect(requests.len(), results)
    }
}

/// Outcome of writing a batch to disk, one entry per label.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<BatchFailure>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write each label's PNG into `dir`. Clashing names get ` (n)` suffixes.
///
/// Only a `dir` that cannot be created fails the call. A label that cannot be
/// written is recorded in the report and the remaining labels are still
/// written.
pub fn write_labels(labels: &[CompiledLabel], dir: &Path) -> std::io::Result<WriteReport> {
    fs::create_dir_all(dir)?;
    let mut taken: HashSet<String> = HashSet::new();
    let mut report = WriteReport { written: Vec::with_capacity(labels.len()), failures: vec![] };

    for (index, label) in labels.iter().enumerate() {
        let name = unique_name(&label.file.filename, &mut taken, |candidate| dir.join(candidate).exists());
        let path = dir.join(&name);
        match fs::write(&path, &label.file.png) {
            Ok(()) => report.written.push(path),
            Err(e) => {
                warn!(index, path = %path.display(), error = %e, "label write failed");
                report.failures.push(BatchFailure { index, serial: None, notice: Notice::failure(WRITE_OPERATION, &e) });
            }
        }
    }
    info!(dir = %dir.display(), written = report.written.len(), failed = report.failures.len(), "labels written");
    Ok(report)
}

fn unique_name(filename: &str, taken: &mut HashSet<String>, exists: impl Fn(&str) -> bool) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (filename, String::new()),
    };

    let mut candidate = filename.to_string();
    let mut n = 1;
    while taken.contains(&candidate) || exists(&candidate) {
        candidate = format!("{stem} ({n}){ext}");
        n += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_padding() {
        let request = BatchRequest {
            source: RenderRequest::Template { template_id: "fabric-roll".into(), values: Default::default() },
            start: 9,
            count: 3,
            pad_width: 4,
        };
        assert_eq!(request.serial(0), "0009");
        assert_eq!(request.serial(2), "0011");
        assert_eq!(request.last_serial(), Some(11));
    }

    #[test]
    fn test_serial_range_past_u64_max_rejected() {
        let pipeline = LabelPipeline::default();
        let mut request = BatchRequest {
            source: RenderRequest::Template { template_id: "fabric-roll".into(), values: Default::default() },
            start: u64::MAX,
            count: 2,
            pad_width: 0,
        };
        assert_eq!(request.last_serial(), None);
        assert_eq!(request.serial(1), u64::MAX.to_string());
        let err = pipeline.render_batch(&request).unwrap_err();
        assert!(err.to_string().contains("run past"));

        request.count = 1;
        assert_eq!(request.last_serial(), Some(u64::MAX));
    }

    #[test]
    fn test_unique_names_follow_download_convention() {
        let mut taken = HashSet::new();
        let never = |_: &str| false;
        assert_eq!(unique_name("label-A.png", &mut taken, never), "label-A.png");
        assert_eq!(unique_name("label-A.png", &mut taken, never), "label-A (1).png");
        assert_eq!(unique_name("label-A.png", &mut taken, never), "label-A (2).png");
        assert_eq!(unique_name("label-B.png", &mut taken, never), "label-B.png");
    }

    #[test]
    fn test_zero_count_rejected() {
        let pipeline = LabelPipeline::default();
        let request = BatchRequest {
            source: RenderRequest::Template { template_id: "fabric-roll".into(), values: Default::default() },
            start: 1,
            count: 0,
            pad_width: 0,
        };
        assert!(pipeline.render_batch(&request).is_err());
    }
}
