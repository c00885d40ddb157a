use domain::pod::entity::{NamedPort, NamespaceInfo, PodInfo, PodPhase};
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::runtime::watcher::Event;

pub fn pod_info(pod: &Pod) -> PodInfo {
    let meta = &pod.metadata;
    let status = pod.status.as_ref();
    let ports = pod
        .spec
        .as_ref()
        .map(|spec| {
            spec.containers
                .iter()
                .flat_map(|c| c.ports.iter().flatten())
                .filter_map(|p| {
                    let name = p.name.clone()?;
                    let port = u16::try_from(p.container_port).ok()?;
                    Some(NamedPort { name, port })
                })
                .collect()
        })
        .unwrap_or_default();

    PodInfo {
        namespace: meta.namespace.clone().unwrap_or_default(),
        name: meta.name.clone().unwrap_or_default(),
        ip: status.and_then(|s| s.pod_ip.clone()),
        labels: meta.labels.clone().unwrap_or_default(),
        phase: PodPhase::parse(status.and_then(|s| s.phase.as_deref())),
        ports,
    }
}

pub fn namespace_info(ns: &Namespace) -> NamespaceInfo {
    NamespaceInfo {
        name: ns.metadata.name.clone().unwrap_or_default(),
        labels: ns.metadata.labels.clone().unwrap_or_default(),
    }
}

/// Project a watcher event onto another object type.
pub fn map_event<K, T>(event: Event<K>, f: impl Fn(&K) -> T) -> Event<T> {
    match event {
        Event::Apply(obj) => Event::Apply(f(&obj)),
        Event::Delete(obj) => Event::Delete(f(&obj)),
        Event::Init => Event::Init,
        Event::InitApply(obj) => Event::InitApply(f(&obj)),
        Event::InitDone => Event::InitDone,
    }
}
