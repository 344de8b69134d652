//! # Kubernetes Service Source
//!
//! [`ServiceSource`] watches the cluster's `v1/Service` objects and keeps
//! the [`Records`] table in sync with the backends they announce through
//! the `grpc-service` / `grpc-service-version` annotations.
//!
//! The watch stream is demultiplexed into typed [`Event`]s: an object cache
//! keyed by `namespace/name` supplies the old side of updates (the watch
//! protocol only delivers the new state), and a re-list after a stream
//! restart synthesizes deletes for objects that vanished in between. Events
//! travel over a bounded queue to a worker that applies the transition
//! rules; a failing event is logged and dropped, it never stalls the queue.
use crate::discovery::Discoverer;
use crate::discovery::event::{Event, EventKind, PortSpec, ServiceObject, select_port};
use crate::discovery::records::Records;
use crate::error::GatewayError;
use futures_util::TryStreamExt;
use futures_util::pin_mut;
use http::Uri;
use http::uri::InvalidUri;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::watcher;
use kube::{Api, Client};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const EVENT_QUEUE_DEPTH: usize = 256;
const WATCH_BACKOFF_MAX_SECS: u64 = 30;

/// Watches Kubernetes Services and resolves logical gRPC service names to
/// backend addresses.
pub struct ServiceSource {
    records: Arc<Records>,
}

impl ServiceSource {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Records::new()),
        }
    }

    pub fn records(&self) -> Arc<Records> {
        Arc::clone(&self.records)
    }

    /// Runs the control loop until `stop` is cancelled: a watch task feeds
    /// demultiplexed events into the queue, and this task drains it into
    /// the record table.
    pub async fn run(&self, client: Client, stop: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<Event>(EVENT_QUEUE_DEPTH);
        let watch = tokio::spawn(watch_services(client, tx, stop.clone()));

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    // Drain whatever is already queued, then exit.
                    rx.close();
                    while let Ok(event) = rx.try_recv() {
                        self.apply_event(&event);
                    }
                    break;
                }
                event = rx.recv() => match event {
                    Some(event) => self.apply_event(&event),
                    None => break,
                },
            }
        }

        let _ = watch.await;
        info!("service watcher stopped");
    }

    /// Applies one demultiplexed watcher event to the record table.
    ///
    /// An object takes part in discovery only when it carries the
    /// `grpc-service` annotation and exposes a usable port. Updates where
    /// either side fails address construction leave the table untouched.
    pub fn apply_event(&self, event: &Event) {
        match event.kind {
            EventKind::Create => match project(&event.new) {
                Ok(Some(target)) => self.set_all(&target),
                Ok(None) => {}
                Err(err) => log_address_failure(&event.new, &err),
            },
            EventKind::Delete => match project(&event.new) {
                Ok(Some(target)) => self.remove_all(&target),
                Ok(None) => {}
                Err(err) => log_address_failure(&event.new, &err),
            },
            EventKind::Update => {
                let Some(old_object) = &event.old else {
                    error!(
                        namespace = %event.new.namespace,
                        name = %event.new.name,
                        "update event is missing the old object state",
                    );
                    return;
                };
                // Both sides must project cleanly before either is touched;
                // otherwise the table keeps whatever it already had.
                let old = match project(old_object) {
                    Ok(old) => old,
                    Err(err) => return log_address_failure(old_object, &err),
                };
                let new = match project(&event.new) {
                    Ok(new) => new,
                    Err(err) => return log_address_failure(&event.new, &err),
                };
                match (old, new) {
                    (None, None) => {}
                    (None, Some(target)) => self.set_all(&target),
                    (Some(target), None) => self.remove_all(&target),
                    (Some(old), Some(new)) => {
                        let unchanged = old.services == new.services
                            && old.version == new.version
                            && old_object.ports == event.new.ports;
                        if unchanged {
                            // Reconciliation: re-add records that went missing.
                            for service in &new.services {
                                if !self.records.exists(service, &new.version) {
                                    self.records.set(service, &new.version, &new.address);
                                }
                            }
                        } else {
                            self.remove_all(&old);
                            self.set_all(&new);
                        }
                    }
                }
            }
        }
    }

    fn set_all(&self, target: &BackendTarget) {
        for service in &target.services {
            self.records.set(service, &target.version, &target.address);
            info!(
                service = %service,
                version = %target.version,
                address = %target.address,
                "added service",
            );
        }
    }

    fn remove_all(&self, target: &BackendTarget) {
        for service in &target.services {
            self.records.remove(service, &target.version, &target.address);
            info!(
                service = %service,
                version = %target.version,
                address = %target.address,
                "removed service",
            );
        }
    }
}

impl Default for ServiceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Discoverer for ServiceSource {
    fn resolve(&self, service: &str, version: &str) -> Result<Uri, GatewayError> {
        self.records.get(service, version).inspect_err(|err| {
            error!(service, version, error = %err, "failed to resolve service");
        })
    }

    fn all(&self) -> serde_json::Value {
        self.records.to_json()
    }
}

/// What a single eligible Service contributes to the record table.
struct BackendTarget {
    services: Vec<String>,
    version: String,
    address: Uri,
}

/// Projects a watched object onto its discovery contribution.
///
/// `Ok(None)` means the object is ineligible (no annotation, or no usable
/// port); an address that fails to parse is an error the caller must not
/// partially apply.
fn project(object: &ServiceObject) -> Result<Option<BackendTarget>, InvalidUri> {
    let Some(services) = object.grpc_services() else {
        debug!(
            namespace = %object.namespace,
            name = %object.name,
            "skipping service because of no annotation",
        );
        return Ok(None);
    };
    let Some(port) = select_port(&object.ports) else {
        debug!(
            namespace = %object.namespace,
            name = %object.name,
            "skipping service because of invalid ports",
        );
        return Ok(None);
    };
    let address = object.backend_address(port)?;
    Ok(Some(BackendTarget {
        services,
        version: object.version(),
        address,
    }))
}

fn log_address_failure(object: &ServiceObject, err: &InvalidUri) {
    error!(
        namespace = %object.namespace,
        name = %object.name,
        error = %err,
        "failure in processing change to Service",
    );
}

fn object_key(object: &ServiceObject) -> String {
    format!("{}/{}", object.namespace, object.name)
}

/// Converts a watched Kubernetes Service into the resolver's projection.
/// Objects with no name or namespace are not valid Services; the caller
/// logs and drops them.
fn project_service(service: &Service) -> Option<ServiceObject> {
    let name = service.metadata.name.clone()?;
    let namespace = service.metadata.namespace.clone()?;
    let annotations = service.metadata.annotations.clone().unwrap_or_default();
    let ports = service
        .spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .map(|ports| {
            ports
                .iter()
                .map(|p| PortSpec {
                    name: p.name.clone().unwrap_or_default(),
                    port: p.port,
                })
                .collect()
        })
        .unwrap_or_default();
    Some(ServiceObject {
        name,
        namespace,
        annotations,
        ports,
    })
}

/// Watches `v1/Service` across all namespaces and demultiplexes the raw
/// stream into typed events. Restarts the watch with exponential backoff
/// on stream errors until `stop` is cancelled.
async fn watch_services(client: Client, tx: mpsc::Sender<Event>, stop: CancellationToken) {
    let api: Api<Service> = Api::all(client);
    let mut known: HashMap<String, ServiceObject> = HashMap::new();
    let mut backoff = 1u64;

    'restart: loop {
        if stop.is_cancelled() {
            return;
        }
        let stream = watcher::watcher(api.clone(), watcher::Config::default());
        pin_mut!(stream);
        // Keys observed during the current re-list; used to synthesize
        // deletes for objects that vanished while the watch was down.
        let mut relisted: Option<HashSet<String>> = None;

        loop {
            let item = tokio::select! {
                _ = stop.cancelled() => return,
                item = stream.try_next() => item,
            };
            let raw = match item {
                Ok(Some(raw)) => raw,
                Ok(None) => {
                    warn!("watch stream ended");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "watch stream error; backing off before restart");
                    break;
                }
            };
            backoff = 1;
            if !demultiplex(raw, &mut known, &mut relisted, &tx).await {
                // The queue receiver is gone; the control loop is shutting down.
                return;
            }
        }

        tokio::select! {
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(backoff)) => {}
        }
        backoff = (backoff * 2).min(WATCH_BACKOFF_MAX_SECS);
        continue 'restart;
    }
}

/// Converts one raw watcher notification into zero or more typed events.
/// Returns false when the queue is closed.
async fn demultiplex(
    raw: watcher::Event<Service>,
    known: &mut HashMap<String, ServiceObject>,
    relisted: &mut Option<HashSet<String>>,
    tx: &mpsc::Sender<Event>,
) -> bool {
    match raw {
        watcher::Event::Init => {
            *relisted = Some(HashSet::new());
            true
        }
        watcher::Event::InitApply(service) | watcher::Event::Apply(service) => {
            let Some(object) = project_service(&service) else {
                error!("event for object without name or namespace; want a Service");
                return true;
            };
            let key = object_key(&object);
            if let Some(seen) = relisted {
                seen.insert(key.clone());
            }
            let event = match known.insert(key, object.clone()) {
                Some(old) => Event {
                    kind: EventKind::Update,
                    new: object,
                    old: Some(old),
                },
                None => Event {
                    kind: EventKind::Create,
                    new: object,
                    old: None,
                },
            };
            tx.send(event).await.is_ok()
        }
        watcher::Event::InitDone => {
            let Some(seen) = relisted.take() else {
                return true;
            };
            let vanished: Vec<String> = known
                .keys()
                .filter(|key| !seen.contains(*key))
                .cloned()
                .collect();
            for key in vanished {
                if let Some(object) = known.remove(&key) {
                    debug!(key = %key, "object vanished during watch restart");
                    let event = Event {
                        kind: EventKind::Delete,
                        new: object,
                        old: None,
                    };
                    if tx.send(event).await.is_err() {
                        return false;
                    }
                }
            }
            true
        }
        watcher::Event::Delete(service) => {
            let Some(object) = project_service(&service) else {
                error!("event for object without name or namespace; want a Service");
                return true;
            };
            known.remove(&object_key(&object));
            let event = Event {
                kind: EventKind::Delete,
                new: object,
                old: None,
            };
            tx.send(event).await.is_ok()
        }
    }
}
