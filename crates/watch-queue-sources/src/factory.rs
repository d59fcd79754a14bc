//! Site adapter registry
//!
//! Picks the adapter for a page by its hostname. Each supported streaming
//! service registers one factory; pages on unknown hosts get no adapter.

use std::collections::HashMap;
use tracing::debug;
use watch_queue_models::StreamingService;
use crate::error::{Result, SourceError};
use crate::snapshot::{PageSnapshot, SnapshotAdapter};
use crate::traits::SiteAdapter;

/// Builds the adapter of one service for a page
pub trait AdapterFactory: Send + Sync {
    fn service(&self) -> StreamingService;

    fn create(&self, page: PageSnapshot) -> Box<dyn SiteAdapter>;
}

/// Factory for adapters reading a captured page
pub struct SnapshotFactory {
    service: StreamingService,
}

impl SnapshotFactory {
    pub fn new(service: StreamingService) -> Self {
        Self { service }
    }
}

impl AdapterFactory for SnapshotFactory {
    fn service(&self) -> StreamingService {
        self.service
    }

    fn create(&self, page: PageSnapshot) -> Box<dyn SiteAdapter> {
        Box::new(SnapshotAdapter::new(self.service, page))
    }
}

pub struct AdapterRegistry {
    factories: HashMap<StreamingService, Box<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    /// Registry with a snapshot adapter for every known service
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for service in StreamingService::ALL {
            if service != StreamingService::Other {
                registry.register(Box::new(SnapshotFactory::new(service)));
            }
        }
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory, replacing any earlier one for the same service
    pub fn register(&mut self, factory: Box<dyn AdapterFactory>) {
        self.factories.insert(factory.service(), factory);
    }

    /// Adapter for the page, chosen by its hostname
    pub fn adapter_for(&self, page: PageSnapshot) -> Result<Box<dyn SiteAdapter>> {
        let host = page.host()?;
        let service = StreamingService::from_host(&host);
        match self.factories.get(&service) {
            Some(factory) if service != StreamingService::Other => {
                debug!("Using {} adapter for {}", service, host);
                Ok(factory.create(page))
            }
            _ => Err(SourceError::UnsupportedPage(host)),
        }
    }

    pub fn registered_services(&self) -> Vec<StreamingService> {
        let mut services: Vec<StreamingService> = self.factories.keys().copied().collect();
        services.sort_by_key(|service| service.as_str());
        services
    }

    pub fn is_registered(&self, service: StreamingService) -> bool {
        self.factories.contains_key(&service)
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
