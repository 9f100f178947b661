use async_trait::async_trait;

use super::{RenderRequest, RenderedDocument};
use crate::error::Result;

/// Information about a renderer backend
#[derive(Debug, Clone)]
pub struct RendererInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether rendered documents carry an editable copy
    pub produces_editable: bool,
}

/// Trait for template rendering backends
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Get information about this renderer
    fn info(&self) -> RendererInfo;

    /// Get the renderer name (convenience method)
    fn name(&self) -> &'static str {
        self.info().name
    }

    /// Render a template into PDF pages.
    ///
    /// Failures the caller may retry should be reported as
    /// `Error::RenderFailed { retryable: true, .. }`.
    async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedDocument>;
}
