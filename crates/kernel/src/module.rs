use async_trait::async_trait;
use axum::Router;

use crate::settings::Settings;

/// Borrowed view of process-wide state handed to modules at startup.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
}

impl<'a> InitCtx<'a> {
    pub const fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }
}

/// A schema change contributed by a module.
///
/// `id` must be unique within its module; the pair `(module, id)` is what the
/// migration runner records as applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

/// A unit of functionality plugged into the bookshelf runtime.
///
/// Dependencies such as repositories or pools are handed to a module through
/// its constructor. The trait only covers lifecycle hooks and the HTTP and
/// schema surface the module contributes.
#[async_trait]
pub trait Module: Sync + Send {
    /// Stable module name, also used as the URL segment under `/api`.
    fn name(&self) -> &'static str;

    /// Runs once at startup, before migrations are applied.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes served under `/api/{name}`. State must already be attached.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment with `paths` relative to the module mount point and
    /// `components.schemas` merged globally.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema changes owned by this module.
    ///
    /// The registry applies them sorted by `id`, regardless of the order
    /// returned, so ids should sort lexically (`001_init`, `002_...`).
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Runs after migrations, before the listener accepts traffic.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on shutdown, after the listener has drained.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
