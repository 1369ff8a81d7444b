//! Document carving and recovery from raw memory and disk dumps
//!
//! Two paths share one configuration ([`CarveConfig`]):
//! - bulk triage: a streaming signature scan over the dump, followed by
//!   parallel extraction of fixed-size fragment windows ([`scanner`])
//! - precision carving: bounded candidate windows validated as containers,
//!   de-duplicated by text fingerprint and persisted ([`recovery`])
//!
//! plus per-file triage ([`analysis`]) and embedded media extraction.

pub mod analysis;
pub mod cli;
pub mod container;
pub mod disk;
pub mod entropy;
pub mod error;
pub mod logging;
pub mod output;
pub mod recovery;
pub mod scanner;
pub mod simd_search;
pub mod types;

// Re-export commonly used types
pub use types::{CancelToken, CarveConfig, Offset, ScanProgress, Size};
pub use disk::DiskImage;
pub use container::{ContainerValidator, DocxValidator};
pub use output::{ArtifactSink, OutputDir};
pub use scanner::{scan_and_extract, FragmentRun, SignatureScanner};
pub use recovery::{recover_documents, CandidateCarver, RecoverySummary};
pub use analysis::{analyze_artifact, analyze_files, ArtifactReport};
pub use entropy::{calculate_shannon_entropy, EntropyReport};
pub use simd_search::find_pattern;
pub use error::{CandidateRejection, Outcome, RecoveryError, Result};
