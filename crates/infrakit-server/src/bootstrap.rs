use infrakit_core::{App, Handler, KeyValClient, QueueClient, Registries, Result};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

/// Backend instances handed to every controller.
#[derive(Clone)]
pub struct Services {
    pub keyval: Arc<dyn KeyValClient>,
    pub queue: Arc<dyn QueueClient>,
}

/// Registers one controller's routes on the application.
pub trait Controller: Send + Sync {
    fn init(&self, app: &mut dyn App, services: &Services);
}

/// A one-handler chain.
pub fn single<H: Handler + 'static>(handler: H) -> Vec<Arc<dyn Handler>> {
    let handler: Arc<dyn Handler> = Arc::new(handler);
    vec![handler]
}

/// Application assembled from configuration, ready to serve.
pub struct Built {
    pub app: Box<dyn App>,
    pub services: Services,
}

/// Wires configured backends into controllers and starts the server.
pub struct Bootstrap<'r> {
    config: Config,
    registries: &'r Registries,
    controllers: Vec<Box<dyn Controller>>,
}

impl<'r> Bootstrap<'r> {
    pub fn new(config: Config, registries: &'r Registries) -> Self {
        Self {
            config,
            registries,
            controllers: Vec::new(),
        }
    }

    pub fn add_ctrl<C: Controller + 'static>(mut self, ctrl: C) -> Self {
        self.controllers.push(Box::new(ctrl));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Freezes the registries, creates every backend and runs controller
    /// initialization in registration order.
    pub async fn build(self) -> Result<Built> {
        self.registries.freeze();

        let keyval_url = self.config.keyval_url();
        let keyval = self.registries.keyval_from_url(&keyval_url).await?;
        info!(url = %keyval_url, "KeyVal backend ready");

        let queue_url = self.config.queue_url();
        let queue = self.registries.queue_from_url(&queue_url).await?;
        info!(url = %queue_url, "Queue backend ready");

        let engine = self.config.http_engine();
        let http = self.config.http_config()?;
        let mut app = self.registries.create_app(&engine, &http)?;
        info!(%engine, addr = %http.bind_addr(), "HTTP app created");

        let services = Services { keyval, queue };
        for ctrl in &self.controllers {
            ctrl.init(app.as_mut(), &services);
        }
        info!(controllers = self.controllers.len(), "Controllers initialized");

        Ok(Built { app, services })
    }

    /// Builds the application and serves until the server stops.
    pub async fn start(self) -> Result<()> {
        let built = self.build().await?;
        built.app.start().await
    }
}
