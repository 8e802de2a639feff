//! Harvest engine: remote pagination, the harvest loop and export IO.
mod engine;
mod export;
mod fetch;
mod harvest;
mod persist;
mod transport;
mod types;

pub use engine::EngineHandle;
pub use export::{
    export_file_stem, render_structured, render_text, ExportError, ExportFormat, ExportSummary,
    Exporter, FileExporter, EMPTY_MESSAGE_PLACEHOLDER,
};
pub use fetch::{
    ChannelProgressSink, FetchSettings, FetchedPage, NullProgressSink, PageFetcher, ProgressSink,
    DEFAULT_RATE_LIMIT_WAIT,
};
pub use harvest::{harvest_range, Harvester};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use transport::{
    parse_retry_after, ApiRequest, PageRequest, ReqwestTransport, Transport, TransportError,
    TransportResponse, TransportSettings, DEFAULT_API_BASE,
};
pub use types::{
    ChannelSummary, EngineEvent, FailureKind, FetchError, HarvestError, HarvestOutcome,
    HarvestProgress, TEXT_CHANNEL_TYPE,
};
