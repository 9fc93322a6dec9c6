use anyhow::{bail, Context};
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core modules are initialized and started in this order, stopped in reverse.
/// Custom modules always run after every core module.
const CORE_MODULE_ORDER: &[&str] = &["db"];

/// Owns every registered module and drives their lifecycle.
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register an infrastructure module. Only names listed in the core
    /// ordering take part in the lifecycle.
    pub fn register_core(&mut self, module: Arc<dyn Module>) -> anyhow::Result<()> {
        self.ensure_unique(module.name())?;
        if !CORE_MODULE_ORDER.contains(&module.name()) {
            tracing::warn!(
                module = module.name(),
                "core module is not part of the core ordering and will not be initialized"
            );
        }
        self.core_modules.push(module);
        Ok(())
    }

    /// Register an application module.
    pub fn register_custom(&mut self, module: Arc<dyn Module>) -> anyhow::Result<()> {
        self.ensure_unique(module.name())?;
        self.custom_modules.push(module);
        Ok(())
    }

    /// All registered modules, core first.
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .collect()
    }

    /// Application modules in registration order.
    pub fn custom_modules(&self) -> &[Arc<dyn Module>] {
        &self.custom_modules
    }

    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .find(|module| module.name() == name)
    }

    pub fn core_module_count(&self) -> usize {
        self.core_modules.len()
    }

    pub fn custom_module_count(&self) -> usize {
        self.custom_modules.len()
    }

    /// Run `init` on core modules in core order, then on custom modules.
    pub async fn init_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(order = ?CORE_MODULE_ORDER, "initializing core modules");
        for module in self.ordered_core() {
            tracing::info!(module = module.name(), "initializing core module");
            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize core module '{}'", module.name()))?;
        }

        tracing::info!(count = self.custom_modules.len(), "initializing custom modules");
        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "initializing custom module");
            module.init(ctx).await.with_context(|| {
                format!("failed to initialize custom module '{}'", module.name())
            })?;
        }

        Ok(())
    }

    /// Run `start` with the same ordering as [`ModuleRegistry::init_all`].
    pub async fn start_all(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        for module in self.ordered_core() {
            tracing::info!(module = module.name(), "starting core module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start core module '{}'", module.name()))?;
        }

        for module in &self.custom_modules {
            tracing::info!(module = module.name(), "starting custom module");
            module
                .start(ctx)
                .await
                .with_context(|| format!("failed to start custom module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Stop custom modules in reverse registration order, then core modules in
    /// reverse core order.
    pub async fn stop_all(&self) -> anyhow::Result<()> {
        for module in self.custom_modules.iter().rev() {
            tracing::info!(module = module.name(), "stopping custom module");
            module
                .stop()
                .await
                .with_context(|| format!("failed to stop custom module '{}'", module.name()))?;
        }

        let mut core: Vec<_> = self.ordered_core().collect();
        core.reverse();
        for module in core {
            tracing::info!(module = module.name(), "stopping core module");
            module
                .stop()
                .await
                .with_context(|| format!("failed to stop core module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Every migration tagged with its module name, sorted by module then id
    /// so the application order does not depend on registration order.
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                let name = module.name().to_string();
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (name.clone(), migration))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));
        migrations
    }

    fn ordered_core(&self) -> impl Iterator<Item = &Arc<dyn Module>> + '_ {
        CORE_MODULE_ORDER.iter().filter_map(move |&name| {
            self.core_modules.iter().find(|module| module.name() == name)
        })
    }

    fn ensure_unique(&self, name: &str) -> anyhow::Result<()> {
        if self.get_module(name).is_some() {
            bail!("module '{name}' is already registered");
        }
        Ok(())
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
