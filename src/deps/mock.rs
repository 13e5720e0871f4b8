//! In-memory dependency handles for tests
//!
//! `MockProbe` counts probe and close calls so tests can assert ordering,
//! short-circuiting and exactly-once teardown without any network.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::{Connector, DependencyProbe, Dependencies, DocumentStore, ProbeError, Service};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct MockProbe {
    service: Service,
    healthy: AtomicBool,
    delay: Option<Duration>,
    probes: AtomicUsize,
    closes: AtomicUsize,
    inserted: Mutex<Vec<Map<String, Value>>>,
    /// Shared log of probe calls across handles, for ordering assertions
    call_log: Option<Arc<Mutex<Vec<Service>>>>,
}

impl MockProbe {
    pub fn healthy(service: Service) -> Self {
        Self {
            service,
            healthy: AtomicBool::new(true),
            delay: None,
            probes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            inserted: Mutex::new(Vec::new()),
            call_log: None,
        }
    }

    pub fn failing(service: Service) -> Self {
        let probe = Self::healthy(service);
        probe.set_healthy(false);
        probe
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_call_log(mut self, log: Arc<Mutex<Vec<Service>>>) -> Self {
        self.call_log = Some(log);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> Vec<Map<String, Value>> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl DependencyProbe for MockProbe {
    fn service(&self) -> Service {
        self.service
    }

    async fn probe(&self) -> Result<String, ProbeError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.call_log {
            log.lock().unwrap().push(self.service);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(format!("{} OK", self.service))
        } else {
            Err(ProbeError::UnexpectedResponse(format!(
                "{} unreachable",
                self.service
            )))
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MockProbe {
    async fn insert_document(&self, fields: Map<String, Value>) -> Result<String, ProbeError> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(ProbeError::UnexpectedResponse(
                "document store unreachable".to_string(),
            ));
        }
        super::mongo::to_document(fields.clone())?;
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push(fields);
        Ok(format!("mock-{}", inserted.len()))
    }

    fn as_probe(&self) -> &dyn DependencyProbe {
        self
    }
}

/// Four mock handles plus the `Dependencies` built from them
pub struct MockSet {
    pub relational: Arc<MockProbe>,
    pub cache: Arc<MockProbe>,
    pub document: Arc<MockProbe>,
    pub broker: Arc<MockProbe>,
    pub call_log: Arc<Mutex<Vec<Service>>>,
}

impl MockSet {
    pub fn healthy() -> Self {
        let call_log = Arc::new(Mutex::new(Vec::new()));
        let make = |service: Service| {
            Arc::new(MockProbe::healthy(service).with_call_log(call_log.clone()))
        };
        Self {
            relational: make(Service::Relational),
            cache: make(Service::Cache),
            document: make(Service::Document),
            broker: make(Service::Broker),
            call_log,
        }
    }

    pub fn handle(&self, service: Service) -> &Arc<MockProbe> {
        match service {
            Service::Relational => &self.relational,
            Service::Cache => &self.cache,
            Service::Document => &self.document,
            Service::Broker => &self.broker,
        }
    }

    pub fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .with_relational(self.relational.clone())
            .with_cache(self.cache.clone())
            .with_document(self.document.clone())
            .with_broker(self.broker.clone())
    }

    pub fn probe_counts(&self) -> [usize; 4] {
        Service::ALL.map(|s| self.handle(s).probe_count())
    }

    pub fn close_counts(&self) -> [usize; 4] {
        Service::ALL.map(|s| self.handle(s).close_count())
    }

    pub fn calls(&self) -> Vec<Service> {
        self.call_log.lock().unwrap().clone()
    }
}

/// Connector handing out a `MockSet`, optionally failing at one service
pub struct MockConnector {
    pub mocks: MockSet,
    fail_at: Option<Service>,
    attempts: Mutex<Vec<Service>>,
}

impl MockConnector {
    pub fn healthy() -> Self {
        Self {
            mocks: MockSet::healthy(),
            fail_at: None,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(service: Service) -> Self {
        Self {
            fail_at: Some(service),
            ..Self::healthy()
        }
    }

    pub fn attempts(&self) -> Vec<Service> {
        self.attempts.lock().unwrap().clone()
    }

    fn attempt(&self, service: Service) -> Result<Arc<MockProbe>, ProbeError> {
        self.attempts.lock().unwrap().push(service);
        if self.fail_at == Some(service) {
            return Err(ProbeError::UnexpectedResponse(format!(
                "connection refused by {}",
                service
            )));
        }
        Ok(self.mocks.handle(service).clone())
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn relational(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
        Ok(self.attempt(Service::Relational)?)
    }

    async fn cache(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
        Ok(self.attempt(Service::Cache)?)
    }

    async fn document(&self) -> Result<Arc<dyn DocumentStore>, ProbeError> {
        Ok(self.attempt(Service::Document)?)
    }

    async fn broker(&self) -> Result<Arc<dyn DependencyProbe>, ProbeError> {
        Ok(self.attempt(Service::Broker)?)
    }
}
