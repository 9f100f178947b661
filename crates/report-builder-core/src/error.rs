use thiserror::Error;

/// Unified error type for report-builder-core
///
/// Errors fall into the categories the build pipeline treats differently:
/// - Configuration errors abort before anything is rendered
/// - Missing resources are recorded and the item is skipped
/// - Render failures are recorded and replaced with placeholder pages
/// - Layout invariant violations indicate a logic bug and always abort
/// - PDF, config and I/O errors from the surrounding machinery
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// A bookmark rule expression could not be compiled
    #[error("invalid bookmark rule `{rule}`: {reason}")]
    InvalidRule { rule: String, reason: String },

    /// More than one item is flagged as the table of contents
    #[error("more than one table of contents declared ('{first}' and '{second}')")]
    DuplicateToc { first: String, second: String },

    /// Two nodes share the same id
    #[error("duplicate node id '{0}'")]
    DuplicateId(String),

    /// A file group combines options that cannot be honored together
    #[error("incompatible reorder options on '{node_id}': {reason}")]
    IncompatibleReorder { node_id: String, reason: String },

    /// TOC column indices are unusable
    #[error("invalid table of contents columns on '{node_id}': {reason}")]
    InvalidTocColumns { node_id: String, reason: String },

    /// The report document could not be parsed
    #[error("failed to parse report: {0}")]
    ReportParse(String),

    // ==========================================================================
    // Resource Errors
    // ==========================================================================
    /// Nothing could be placed in the output document
    #[error("report produced no pages")]
    EmptyOutput,

    // ==========================================================================
    // Render Errors
    // ==========================================================================
    /// The renderer failed for a template
    #[error("failed to render template {template}: {reason}")]
    RenderFailed {
        template: String,
        reason: String,
        retryable: bool,
    },

    /// The renderer did not answer within the configured timeout
    #[error("rendering template {template} timed out after {seconds}s")]
    RenderTimeout { template: String, seconds: u64 },

    // ==========================================================================
    // Layout Errors
    // ==========================================================================
    /// Internal layout bookkeeping became inconsistent
    #[error("layout invariant violated: {0}")]
    LayoutInvariant(String),

    /// The table of contents changed length again after the corrective pass
    #[error(
        "table of contents did not converge: estimated {estimated} pages, realized {realized}, then {recomposed}"
    )]
    TocNotConverged {
        estimated: usize,
        realized: usize,
        recomposed: usize,
    },

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Configuration File Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error is a report configuration problem detected before rendering.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidRule { .. }
                | Self::DuplicateToc { .. }
                | Self::DuplicateId(_)
                | Self::IncompatibleReorder { .. }
                | Self::InvalidTocColumns { .. }
                | Self::ReportParse(_)
        )
    }

    /// Whether the error came from the renderer and only affects one template.
    pub const fn is_render_failure(&self) -> bool {
        matches!(self, Self::RenderFailed { .. } | Self::RenderTimeout { .. })
    }

    /// Whether another attempt at the same render call may succeed.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::RenderTimeout { .. } => true,
            Self::RenderFailed { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
