//! Drives a [`ChangeHandler`] from a watch on `networking.k8s.io/v1` ingresses.

use std::collections::HashMap;
use std::pin::pin;

use futures::StreamExt;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::watcher::{ChangeHandler, RouteResource};

impl From<&Ingress> for RouteResource {
    fn from(ingress: &Ingress) -> Self {
        let hostnames = ingress
            .spec
            .as_ref()
            .and_then(|spec| spec.rules.as_ref())
            .map(|rules| rules.iter().filter_map(|rule| rule.host.clone()).collect())
            .unwrap_or_default();

        Self {
            namespace: ingress.metadata.namespace.clone().unwrap_or_default(),
            name: ingress.metadata.name.clone().unwrap_or_default(),
            hostnames,
            annotations: ingress.metadata.annotations.clone().unwrap_or_default(),
        }
    }
}

/// Watch event with the ingress already reduced to a [`RouteResource`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Apply(RouteResource),
    Delete(RouteResource),
    Init,
    InitApply(RouteResource),
    InitDone,
}

impl From<watcher::Event<Ingress>> for WatchEvent {
    fn from(event: watcher::Event<Ingress>) -> Self {
        match event {
            watcher::Event::Apply(ingress) => WatchEvent::Apply(RouteResource::from(&ingress)),
            watcher::Event::Delete(ingress) => WatchEvent::Delete(RouteResource::from(&ingress)),
            watcher::Event::Init => WatchEvent::Init,
            watcher::Event::InitApply(ingress) => WatchEvent::InitApply(RouteResource::from(&ingress)),
            watcher::Event::InitDone => WatchEvent::InitDone,
        }
    }
}

/// Last known state of every watched resource.
///
/// Turns raw watch events into add/update/delete callbacks and reconciles a
/// full re-list against what was known before it.
#[derive(Debug, Default)]
pub struct ResourceCache {
    resources: HashMap<String, RouteResource>,
    relist: Option<HashMap<String, RouteResource>>,
}

impl ResourceCache {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub async fn apply<H: ChangeHandler + ?Sized>(&mut self, event: WatchEvent, handler: &H) {
        match event {
            WatchEvent::Apply(resource) => self.upsert(resource, handler).await,
            WatchEvent::Delete(resource) => {
                let known = self.resources.remove(&resource.identity());
                handler.on_delete(known.as_ref().unwrap_or(&resource)).await;
            }
            WatchEvent::Init => self.relist = Some(HashMap::new()),
            WatchEvent::InitApply(resource) => {
                self.relist
                    .get_or_insert_with(HashMap::new)
                    .insert(resource.identity(), resource);
            }
            WatchEvent::InitDone => {
                let fresh = self.relist.take().unwrap_or_default();
                let gone: Vec<RouteResource> = self
                    .resources
                    .iter()
                    .filter(|(identity, _)| !fresh.contains_key(*identity))
                    .map(|(_, resource)| resource.clone())
                    .collect();
                for resource in gone {
                    self.resources.remove(&resource.identity());
                    handler.on_delete(&resource).await;
                }
                for resource in fresh.into_values() {
                    self.upsert(resource, handler).await;
                }
                debug!(resources = self.resources.len(), "ingress list synchronised");
            }
        }
    }

    async fn upsert<H: ChangeHandler + ?Sized>(&mut self, resource: RouteResource, handler: &H) {
        match self.resources.insert(resource.identity(), resource.clone()) {
            None => handler.on_add(&resource).await,
            Some(old) if old != resource => handler.on_update(&old, &resource).await,
            Some(_) => {}
        }
    }
}

/// Watch ingresses in `namespace` (all namespaces when `None`) until cancelled.
///
/// Watch errors are logged and retried with the watcher's default backoff.
pub async fn watch_ingresses<H: ChangeHandler + ?Sized>(
    client: Client,
    namespace: Option<&str>,
    handler: &H,
    cancel: CancellationToken,
) {
    let api: Api<Ingress> = match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };
    let mut events = pin!(watcher(api, watcher::Config::default()).default_backoff());
    let mut cache = ResourceCache::default();

    info!(namespace = namespace.unwrap_or("*"), "watching ingresses");
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.next() => event,
        };
        match event {
            Some(Ok(event)) => cache.apply(WatchEvent::from(event), handler).await,
            Some(Err(err)) => warn!(error = %err, "ingress watch failed, retrying"),
            None => break,
        }
    }
    info!("ingress watch stopped");
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use k8s_openapi::api::networking::v1::{IngressRule, IngressSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChangeHandler for Recorder {
        async fn on_add(&self, resource: &RouteResource) {
            self.calls.lock().push(format!("add {}", resource.identity()));
        }

        async fn on_update(&self, _old: &RouteResource, new: &RouteResource) {
            self.calls.lock().push(format!("update {}", new.identity()));
        }

        async fn on_delete(&self, resource: &RouteResource) {
            self.calls.lock().push(format!("delete {}", resource.identity()));
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<String> {
            let mut calls = std::mem::take(&mut *self.calls.lock());
            calls.sort();
            calls
        }
    }

    fn resource(name: &str, host: &str) -> RouteResource {
        RouteResource {
            namespace: "default".into(),
            name: name.into(),
            hostnames: vec![host.into()],
            annotations: BTreeMap::new(),
        }
    }

    #[test]
    fn test_route_resource_from_ingress() {
        let ingress = Ingress {
            metadata: ObjectMeta {
                name: Some("web".into()),
                namespace: Some("shop".into()),
                annotations: Some(BTreeMap::from([("a".to_string(), "b".to_string())])),
                ..ObjectMeta::default()
            },
            spec: Some(IngressSpec {
                rules: Some(vec![
                    IngressRule {
                        host: Some("example.com".into()),
                        http: None,
                    },
                    IngressRule { host: None, http: None },
                ]),
                ..IngressSpec::default()
            }),
            ..Ingress::default()
        };

        let resource = RouteResource::from(&ingress);
        assert_eq!(resource.identity(), "shop/web");
        assert_eq!(resource.hostnames, vec!["example.com".to_string()]);
        assert_eq!(resource.annotations.get("a").map(String::as_str), Some("b"));

        assert_eq!(RouteResource::from(&Ingress::default()), RouteResource::default());
    }

    #[tokio::test]
    async fn test_apply_and_delete() {
        let recorder = Recorder::default();
        let mut cache = ResourceCache::default();

        cache.apply(WatchEvent::Apply(resource("web", "a.example.com")), &recorder).await;
        cache.apply(WatchEvent::Apply(resource("web", "a.example.com")), &recorder).await;
        cache.apply(WatchEvent::Apply(resource("web", "b.example.com")), &recorder).await;
        cache.apply(WatchEvent::Delete(resource("web", "b.example.com")), &recorder).await;

        assert_eq!(
            *recorder.calls.lock(),
            vec!["add default/web", "update default/web", "delete default/web"]
        );
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_relist_reconciles_against_known_state() {
        let recorder = Recorder::default();
        let mut cache = ResourceCache::default();

        for event in [
            WatchEvent::Init,
            WatchEvent::InitApply(resource("kept", "kept.example.com")),
            WatchEvent::InitApply(resource("changed", "old.example.com")),
            WatchEvent::InitApply(resource("removed", "removed.example.com")),
            WatchEvent::InitDone,
        ] {
            cache.apply(event, &recorder).await;
        }
        assert_eq!(
            recorder.take(),
            vec!["add default/changed", "add default/kept", "add default/removed"]
        );

        for event in [
            WatchEvent::Init,
            WatchEvent::InitApply(resource("kept", "kept.example.com")),
            WatchEvent::InitApply(resource("changed", "new.example.com")),
            WatchEvent::InitApply(resource("added", "added.example.com")),
            WatchEvent::InitDone,
        ] {
            cache.apply(event, &recorder).await;
        }
        assert_eq!(
            recorder.take(),
            vec!["add default/added", "delete default/removed", "update default/changed"]
        );
        assert_eq!(cache.len(), 3);
    }
}
