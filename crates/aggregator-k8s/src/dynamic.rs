//! Shared dynamic-GVR `Api<DynamicObject>` construction, used by both the
//! Writer (creates Observations at a configured destination) and the GC
//! collector (lists/deletes expired ones at the same destination).

use kube::api::{Api, ApiResource, DynamicObject};

use aggregator_common::gvr::Gvr;

use crate::client::RateLimitedClient;

fn api_version(gvr: &Gvr) -> String {
    if gvr.group.is_empty() {
        gvr.version.clone()
    } else {
        format!("{}/{}", gvr.group, gvr.version)
    }
}

/// Best-effort plural-resource -> Kind, used only to stamp the dynamic
/// object's `kind` field — the REST path is addressed by plural resource
/// name, so this never affects which GVR is actually read from or written
/// to.
pub fn kind_from_resource(resource: &str) -> String {
    let singular = resource.strip_suffix('s').unwrap_or(resource);
    let mut chars = singular.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

pub fn api_resource_for(gvr: &Gvr) -> ApiResource {
    ApiResource {
        group: gvr.group.clone(),
        version: gvr.version.clone(),
        api_version: api_version(gvr),
        kind: kind_from_resource(&gvr.resource),
        plural: gvr.resource.clone(),
    }
}

pub fn api_for(client: &RateLimitedClient, gvr: &Gvr, namespace: Option<&str>) -> Api<DynamicObject> {
    let resource = api_resource_for(gvr);
    match namespace {
        Some(ns) => Api::namespaced_with(client.inner().clone(), ns, &resource),
        None => Api::all_with(client.inner().clone(), &resource),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_group_api_version_has_no_slash() {
        assert_eq!(api_version(&Gvr::core("v1", "configmaps")), "v1");
    }

    #[test]
    fn grouped_api_version_joins_group_and_version() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        assert_eq!(api_version(&gvr), "aggregator.observability.io/v1");
    }

    #[test]
    fn kind_guess_strips_trailing_s() {
        assert_eq!(kind_from_resource("observations"), "Observation");
    }
}
