pub mod types;
pub mod record;
pub mod storage;
pub mod error;
pub mod config;
pub mod index;
pub mod filter;
pub mod classify;
pub mod compose;
pub mod feed;
pub mod publish;
pub mod pipeline;

pub use error::{CollaboratorError, FeedcasterError, Result};
pub use types::*;
pub use record::FieldLookup;
pub use storage::{
    load_state, save_state, JsonStateStore, MemoryStateStore, RedbStateStore, StateStore,
    CURRENT_SCHEMA_VERSION,
};
pub use config::{AdmissionWeights, ComposeConfig, FeedConfig, FilterConfig, IndexConfig, PipelineConfig};
pub use index::{
    natural_cmp_ci, ContentEntry, ContentIndex, ContentLibrary, IndexOrigin, IndexStats,
    SelectionPolicy, INDEX_STATE_KEY,
};
pub use filter::{ContentClass, FilterChain, FilterRejection, FilterResult, FilterRule, DEFAULT_TEXT_DENYLIST};
pub use classify::{AlbumCounter, AttachmentClassifier, AttachmentDecision, AttachmentKind};
pub use compose::{
    html_unescape, ComposeMode, Composer, Composition, SpecialKind, TemplateVariable, VariableSource,
};
pub use feed::{select_new_items, take_new_items, FeedSelection, LAST_MAX_TIMESTAMP_KEY};
pub use publish::{
    check_payload, publish_batch, verify_identity, AccountLookup, MediaKind, MediaRequest,
    MediaResolver, MediaSource, MediaUploader, OutboundPost, Poster, PublishReport, UploadStrategy,
    MAX_MEDIA_PER_POST,
};
pub use pipeline::{file_record, read_records, Collaborators, Pipeline, PreparedPost, SourceKind};
