pub mod ai;
pub mod backup;
pub mod config;
pub mod encoding;
pub mod formats;
pub mod memory;
pub mod placeholder_validator;
pub mod profiles;
pub mod protector;
pub mod translate;
pub mod versioning;

/// Folder name used under the platform config and data directories.
pub const APP_DIR_NAME: &str = "ParadoxTranslator";

pub use ai::{
    backend_for, EngineKind, LocalTranslator, RemoteTranslator, RetryPolicy, TranslationBackend,
    TranslationError,
};
pub use config::{ConfigError, TranslationConfig};
pub use formats::{
    load_document, parse_localization, save_document, serialize_localization,
    LocalizationDocument, LocalizationEntry, SaveOptions,
};
pub use memory::TranslationMemory;
pub use placeholder_validator::{
    audit_entries, extract_placeholders, validate_placeholders, PlaceholderValidationResult,
    ValidationAudit,
};
pub use profiles::{GameProfile, GameType};
pub use protector::{mask_placeholders, unmask_placeholders, MaskedText};
pub use translate::{
    translate_file, BatchProgress, BatchSummary, Cancelled, FileTranslationReport,
    FileTranslationRequest, TranslationOrchestrator, TranslationResult,
};
pub use versioning::{
    apply_comparison_results, compare_versions, generate_report, ChangeType, ComparisonEntry,
    ComparisonResult, FileVersion, SnapshotStore,
};
