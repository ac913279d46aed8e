//! Capability registry
//!
//! Maps capability names to implementations. The registry is filled once at
//! startup and then only read: every action reference in the loaded
//! mappings is resolved against it before the first event is processed, so
//! an unknown capability is a startup error rather than a runtime surprise.
//!
//! # Examples
//!
//! ```ignore
//! use tollgate_hooks::{config::Settings, registry::CapabilityRegistry};
//!
//! let registry = CapabilityRegistry::with_builtins(&Settings::default());
//! let permission = registry.get("permission").unwrap();
//! let action = permission.prepare("deny")?;
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc};

use tracing::debug;

use crate::{
    actions::{
        AiCapability, AnalysisCapability, BlockCapability, Capability, CommandCapability,
        ConditionalCapability, ContextCapability, MemoryCapability, NotificationCapability,
        PermissionCapability, QualityCapability, UtilityCapability,
    },
    config::Settings,
};

/// Name-to-capability table
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in capability
    ///
    /// Capabilities that take configured data (rewrites, context snippets)
    /// are built from `settings`.
    pub fn with_builtins(settings: &Settings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PermissionCapability));
        registry.register(Arc::new(CommandCapability::new(&settings.rewrite_rules())));
        registry.register(Arc::new(BlockCapability));
        registry.register(Arc::new(ContextCapability::new(&settings.context)));
        registry.register(Arc::new(NotificationCapability));
        registry.register(Arc::new(QualityCapability));
        registry.register(Arc::new(AnalysisCapability));
        registry.register(Arc::new(ConditionalCapability));
        registry.register(Arc::new(MemoryCapability));
        registry.register(Arc::new(AiCapability));
        registry.register(Arc::new(UtilityCapability));
        registry
    }

    /// Add a capability, replacing any with the same name
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        if self.capabilities.insert(name.clone(), capability).is_some() {
            debug!(capability = %name, "Replaced registered capability");
        }
    }

    /// Capability by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    /// Registered capabilities, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Capability>> {
        self.capabilities.values()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.names())
            .finish()
    }
}
