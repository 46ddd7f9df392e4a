//! Per-batch upload flow: validation, the simulated progress bar and the
//! exactly-once hand-off to commit.

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::constants::{PROGRESS_MAX_STEP, PROGRESS_MIN_STEP};
use crate::registry::PhotoBlob;
use crate::utils::format_file_size;

/// Why a selected file was dropped from its batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("{name} is not an image file.")]
    NotAnImage { name: String, mime_type: String },
    #[error("{name} exceeds the {} size limit.", limit_label(.limit))]
    TooLarge { name: String, size: u64, limit: u64 },
}

fn limit_label(limit: &u64) -> String {
    format_file_size(*limit)
}

impl Rejection {
    pub fn file_name(&self) -> &str {
        match self {
            Rejection::NotAnImage { name, .. } | Rejection::TooLarge { name, .. } => name,
        }
    }
}

/// Splits `files` into the ones that may be uploaded and a rejection per
/// dropped file. Order is preserved on both sides. The type rule is checked
/// first, so a large text file is reported as "not an image".
pub fn validate(files: Vec<PhotoBlob>, max_size: u64) -> (Vec<PhotoBlob>, Vec<Rejection>) {
    let mut accepted = Vec::with_capacity(files.len());
    let mut rejected = Vec::new();

    for file in files {
        if !file.mime_type.starts_with("image/") {
            rejected.push(Rejection::NotAnImage {
                name: file.name,
                mime_type: file.mime_type,
            });
        } else if file.size > max_size {
            rejected.push(Rejection::TooLarge {
                name: file.name,
                size: file.size,
                limit: max_size,
            });
        } else {
            accepted.push(file);
        }
    }

    (accepted, rejected)
}

/// Progress-bar values for one batch. Each tick adds a random step of up to
/// `PROGRESS_MAX_STEP` percent (never less than `PROGRESS_MIN_STEP`), and the
/// sequence ends with exactly `100.0`.
pub struct ProgressSimulator<R> {
    rng: R,
    progress: f64,
    finished: bool,
}

impl<R: Rng> ProgressSimulator<R> {
    pub fn new(rng: R) -> Self {
        ProgressSimulator {
            rng,
            progress: 0.0,
            finished: false,
        }
    }
}

impl<R: Rng> Iterator for ProgressSimulator<R> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.finished {
            return None;
        }
        let step = (self.rng.gen::<f64>() * PROGRESS_MAX_STEP).max(PROGRESS_MIN_STEP);
        self.progress += step;
        if self.progress >= 100.0 {
            self.progress = 100.0;
            self.finished = true;
        }
        Some(self.progress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Validating,
    ProgressSimulating,
    Committing,
    Done,
    Rejected,
}

impl BatchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchPhase::Validating => "validating",
            BatchPhase::ProgressSimulating => "progress_simulating",
            BatchPhase::Committing => "committing",
            BatchPhase::Done => "done",
            BatchPhase::Rejected => "rejected",
        }
    }
}

pub struct UploadBatch {
    pub id: u64,
    phase: BatchPhase,
    accepted: Vec<PhotoBlob>,
    rejections: Vec<Rejection>,
    total_files: usize,
}

impl UploadBatch {
    /// Validates `files` and moves on to progress simulation, or to
    /// `Rejected` when nothing passed.
    pub fn new(id: u64, files: Vec<PhotoBlob>, max_size: u64) -> Self {
        let total_files = files.len();
        let mut batch = UploadBatch {
            id,
            phase: BatchPhase::Validating,
            accepted: Vec::new(),
            rejections: Vec::new(),
            total_files,
        };

        let (accepted, rejections) = validate(files, max_size);
        for rejection in &rejections {
            tracing::info!(batch = id, file = rejection.file_name(), "{}", rejection);
        }
        batch.phase = if accepted.is_empty() {
            BatchPhase::Rejected
        } else {
            BatchPhase::ProgressSimulating
        };
        batch.accepted = accepted;
        batch.rejections = rejections;
        batch
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// Hands the accepted files to the committer. Only the first call after
    /// progress simulation gets them; later calls get `None`.
    pub fn take_for_commit(&mut self) -> Option<Vec<PhotoBlob>> {
        if self.phase != BatchPhase::ProgressSimulating {
            return None;
        }
        self.phase = BatchPhase::Committing;
        Some(std::mem::take(&mut self.accepted))
    }

    pub fn finish(&mut self) {
        if self.phase == BatchPhase::Committing {
            self.phase = BatchPhase::Done;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MAX_FILE_SIZE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MB: usize = 1024 * 1024;

    fn blob(name: &str, mime: &str, size: usize) -> PhotoBlob {
        PhotoBlob::new(name, mime, vec![0; size])
    }

    #[test]
    fn validation_drops_wrong_type_and_oversized_files() {
        let files = vec![
            blob("a.png", "image/png", 2 * MB),
            blob("b.txt", "text/plain", 1024),
            blob("c.jpg", "image/jpeg", 6 * MB),
        ];
        let (accepted, rejected) = validate(files, MAX_FILE_SIZE);

        let names: Vec<_> = accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a.png"]);
        assert_eq!(rejected.len(), 2);
        assert!(matches!(&rejected[0], Rejection::NotAnImage { name, .. } if name == "b.txt"));
        assert!(matches!(&rejected[1], Rejection::TooLarge { name, .. } if name == "c.jpg"));
        assert_eq!(rejected[0].to_string(), "b.txt is not an image file.");
        assert_eq!(rejected[1].to_string(), "c.jpg exceeds the 5 MB size limit.");
    }

    #[test]
    fn exactly_at_the_limit_is_accepted() {
        let (accepted, rejected) = validate(vec![blob("edge.jpg", "image/jpeg", 5 * MB)], MAX_FILE_SIZE);
        assert_eq!(accepted.len(), 1);
        assert!(rejected.is_empty());
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_100() {
        for seed in 0..50 {
            let values: Vec<f64> = ProgressSimulator::new(StdRng::seed_from_u64(seed)).collect();
            assert!(values.windows(2).all(|w| w[0] < w[1]), "seed {seed}: {values:?}");
            assert_eq!(values.last(), Some(&100.0));
            assert_eq!(values.iter().filter(|v| **v == 100.0).count(), 1);
            // 0.5% minimum step bounds the number of ticks.
            assert!(values.len() <= 200);
        }
    }

    #[test]
    fn batch_commits_exactly_once() {
        let mut batch = UploadBatch::new(
            1,
            vec![blob("a.png", "image/png", 10), blob("b.txt", "text/plain", 10)],
            MAX_FILE_SIZE,
        );
        assert_eq!(batch.phase(), BatchPhase::ProgressSimulating);
        assert_eq!(batch.total_files(), 2);
        assert_eq!(batch.rejections().len(), 1);

        let files = batch.take_for_commit().unwrap();
        assert_eq!(files.len(), 1);
        assert!(batch.take_for_commit().is_none());
        batch.finish();
        assert_eq!(batch.phase(), BatchPhase::Done);
        assert!(batch.take_for_commit().is_none());
    }

    #[test]
    fn batch_with_nothing_valid_is_rejected() {
        let mut batch = UploadBatch::new(2, vec![blob("a.pdf", "application/pdf", 10)], MAX_FILE_SIZE);
        assert_eq!(batch.phase(), BatchPhase::Rejected);
        assert!(batch.take_for_commit().is_none());
    }
}
