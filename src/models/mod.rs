pub mod exam_type;
pub mod grading;
pub mod loaders;
pub mod normalized;
pub mod submission;
pub mod verdict;

pub use exam_type::ExamType;
pub use grading::{GradingResult, RubricItem};
pub use loaders::{load_all_manifests, load_submission_manifest, SubmissionManifest};
pub use normalized::{AudioMetrics, Modality, NormalizedSubmission};
pub use submission::{Artifact, ArtifactFormat, Submission};
pub use verdict::{GuardrailVerdict, RuleCategory, RuleViolation};
