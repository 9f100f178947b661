use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::{RenderRequest, RenderedDocument, Renderer};
use crate::config::RendererConfig;
use crate::error::{Error, Result};

/// Bounds renderer calls with a timeout and retries transient failures.
#[derive(Clone)]
pub struct RenderGuard {
    renderer: Arc<dyn Renderer>,
    timeout: Duration,
    attempts: u32,
    retry_delay: Duration,
}

impl RenderGuard {
    pub fn new(renderer: Arc<dyn Renderer>, config: &RendererConfig) -> Self {
        Self {
            renderer,
            timeout: Duration::from_secs(config.timeout_secs),
            attempts: config.retry_count.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    pub fn renderer(&self) -> &Arc<dyn Renderer> {
        &self.renderer
    }

    /// Render with retries. A document without pages counts as a failure.
    pub async fn render(&self, request: &RenderRequest<'_>) -> Result<RenderedDocument> {
        let template = request.template.path.display().to_string();
        let mut last_error = None;

        for attempt in 0..self.attempts {
            debug!(
                "Render attempt {}/{} for '{}' with {}",
                attempt + 1,
                self.attempts,
                request.node_id,
                self.renderer.name()
            );

            match tokio::time::timeout(self.timeout, self.renderer.render(request)).await {
                Ok(Ok(rendered)) if rendered.page_count > 0 => return Ok(rendered),
                Ok(Ok(_)) => {
                    return Err(Error::RenderFailed {
                        template,
                        reason: "renderer returned no pages".to_string(),
                        retryable: false,
                    });
                }
                Ok(Err(e)) if e.is_retryable() => {
                    warn!("Render of '{}' failed: {}", request.node_id, e);
                    last_error = Some(e);
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!(
                        "Render of '{}' timed out after {:?}",
                        request.node_id, self.timeout
                    );
                    last_error = Some(Error::RenderTimeout {
                        template: template.clone(),
                        seconds: self.timeout.as_secs(),
                    });
                }
            }

            if attempt + 1 < self.attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        error!(
            "Render of '{}' failed after {} attempts",
            request.node_id, self.attempts
        );
        Err(last_error.unwrap_or(Error::RenderFailed {
            template,
            reason: "no render attempt was made".to_string(),
            retryable: false,
        }))
    }
}

impl std::fmt::Debug for RenderGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGuard")
            .field("renderer", &self.renderer.name())
            .field("timeout", &self.timeout)
            .field("attempts", &self.attempts)
            .finish()
    }
}
