use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::{App, BoxFuture, HttpConfig, InfraError, KeyValClient, QueueClient, Result};

pub type AppFactory = dyn Fn(&HttpConfig) -> Result<Box<dyn App>> + Send + Sync;
pub type KeyValFactory =
    dyn Fn(String) -> BoxFuture<'static, Result<Arc<dyn KeyValClient>>> + Send + Sync;
pub type QueueFactory =
    dyn Fn(String) -> BoxFuture<'static, Result<Arc<dyn QueueClient>>> + Send + Sync;

/// Name-keyed factories for one capability family.
///
/// Registering a name that already exists replaces the previous factory.
/// Once [`Registry::freeze`] has been called the registry is read-only.
pub struct Registry<F: ?Sized> {
    family: &'static str,
    factories: RwLock<HashMap<String, Arc<F>>>,
    frozen: AtomicBool,
}

impl<F: ?Sized> Registry<F> {
    pub fn new(family: &'static str) -> Self {
        Self {
            family,
            factories: RwLock::new(HashMap::new()),
            frozen: AtomicBool::new(false),
        }
    }

    pub fn family(&self) -> &'static str {
        self.family
    }

    pub fn register(&self, name: impl Into<String>, factory: Arc<F>) -> Result<()> {
        let name = name.into();
        if self.is_frozen() {
            return Err(InfraError::RegistryFrozen(format!(
                "cannot register {} backend '{}'",
                self.family, name
            )));
        }

        let mut factories = self.factories.write().map_err(|_| self.poisoned())?;
        if factories.insert(name.clone(), factory).is_some() {
            debug!(family = self.family, backend = %name, "Replaced backend factory");
        } else {
            debug!(family = self.family, backend = %name, "Registered backend factory");
        }
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<F>> {
        let factories = self.factories.read().map_err(|_| self.poisoned())?;
        factories.get(name).cloned().ok_or_else(|| {
            InfraError::NotFound(format!("{} backend '{}'", self.family, name))
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories
            .read()
            .map(|factories| factories.contains_key(name))
            .unwrap_or(false)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .map(|factories| factories.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::SeqCst);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }

    fn poisoned(&self) -> InfraError {
        InfraError::BackendError(format!("{} registry lock poisoned", self.family))
    }
}

/// The three capability registries a process bootstraps from.
pub struct Registries {
    pub apps: Registry<AppFactory>,
    pub keyvals: Registry<KeyValFactory>,
    pub queues: Registry<QueueFactory>,
}

impl Registries {
    pub fn new() -> Self {
        Self {
            apps: Registry::new("app"),
            keyvals: Registry::new("keyval"),
            queues: Registry::new("queue"),
        }
    }

    pub fn register_app<F>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&HttpConfig) -> Result<Box<dyn App>> + Send + Sync + 'static,
    {
        self.apps.register(name, Arc::new(factory))
    }

    pub fn register_keyval<F, Fut>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn KeyValClient>>> + Send + 'static,
    {
        let factory: Arc<KeyValFactory> = Arc::new(
            move |url: String| -> BoxFuture<'static, Result<Arc<dyn KeyValClient>>> {
                Box::pin(factory(url))
            },
        );
        self.keyvals.register(name, factory)
    }

    pub fn register_queue<F, Fut>(&self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn QueueClient>>> + Send + 'static,
    {
        let factory: Arc<QueueFactory> = Arc::new(
            move |url: String| -> BoxFuture<'static, Result<Arc<dyn QueueClient>>> {
                Box::pin(factory(url))
            },
        );
        self.queues.register(name, factory)
    }

    pub fn create_app(&self, name: &str, config: &HttpConfig) -> Result<Box<dyn App>> {
        let factory = self.apps.lookup(name)?;
        factory(config)
    }

    pub async fn create_keyval(&self, name: &str, url: &str) -> Result<Arc<dyn KeyValClient>> {
        let factory = self.keyvals.lookup(name)?;
        factory(url.to_string()).await
    }

    pub async fn create_queue(&self, name: &str, url: &str) -> Result<Arc<dyn QueueClient>> {
        let factory = self.queues.lookup(name)?;
        factory(url.to_string()).await
    }

    /// Creates a key-value client for the backend named by the URL scheme.
    pub async fn keyval_from_url(&self, url: &str) -> Result<Arc<dyn KeyValClient>> {
        let name = backend_name(url)?;
        self.create_keyval(&name, url).await
    }

    /// Creates a queue client for the backend named by the URL scheme.
    pub async fn queue_from_url(&self, url: &str) -> Result<Arc<dyn QueueClient>> {
        let name = backend_name(url)?;
        self.create_queue(&name, url).await
    }

    pub fn freeze(&self) {
        self.apps.freeze();
        self.keyvals.freeze();
        self.queues.freeze();
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend name carried by a connection URL: its scheme.
pub fn backend_name(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| InfraError::ParseError(format!("invalid backend url '{url}': {e}")))?;
    Ok(parsed.scheme().to_string())
}
