pub mod classifier;
pub mod guardrail;
pub mod llm_service;
pub mod preprocessor;
pub mod report_writer;
pub mod review_writer;
pub mod router;

pub use classifier::{Classification, Classifier, CLASSIFIER_POLICY_VERSION};
pub use guardrail::{GuardrailChecker, GuardrailRule};
pub use llm_service::LlmService;
pub use preprocessor::Preprocessor;
pub use report_writer::ReportWriter;
pub use review_writer::ReviewWriter;
pub use router::Router;
