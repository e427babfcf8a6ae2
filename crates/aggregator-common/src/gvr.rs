//! GVR (group/version/resource) parsing and the non-bypassable hard-deny
//! list. Spec.md §6 "GVR policy".
//!
//! This module is consulted from two places — `ConfigLoader` (rejects a
//! SourceConfig outright at validation time) and `Writer` (refuses to issue
//! the API call even if a SourceConfig somehow carried a denied GVR through)
//! — so invariant I3 holds even under an adversarial or stale config.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Gvr {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl fmt::Display for Gvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

impl Gvr {
    pub fn core(version: &str, resource: &str) -> Self {
        Gvr {
            group: String::new(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Gvr {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
        }
    }

    /// `group/version/resource` or bare `version/resource` for the core
    /// group, matching the notation used throughout spec.md.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [version, resource] => Some(Gvr::core(version, resource)),
            [group, version, resource] => Some(Gvr::new(group, version, resource)),
            _ => None,
        }
    }
}

/// Categorical hard-deny list, spec.md §6. Evaluated before any allow-list
/// matching, and unconditionally — no SourceConfig field can bypass it.
pub fn hard_deny_list() -> Vec<Gvr> {
    vec![
        Gvr::core("v1", "secrets"),
        Gvr::new("rbac.authorization.k8s.io", "v1", "roles"),
        Gvr::new("rbac.authorization.k8s.io", "v1", "rolebindings"),
        Gvr::new("rbac.authorization.k8s.io", "v1", "clusterroles"),
        Gvr::new("rbac.authorization.k8s.io", "v1", "clusterrolebindings"),
        Gvr::core("v1", "serviceaccounts"),
        Gvr::new(
            "admissionregistration.k8s.io",
            "v1",
            "validatingwebhookconfigurations",
        ),
        Gvr::new(
            "admissionregistration.k8s.io",
            "v1",
            "mutatingwebhookconfigurations",
        ),
        Gvr::new("apiextensions.k8s.io", "v1", "customresourcedefinitions"),
        Gvr::new("apiextensions.k8s.io", "v1beta1", "customresourcedefinitions"),
    ]
}

pub fn is_hard_denied(gvr: &Gvr) -> bool {
    hard_deny_list().contains(gvr)
}

/// Why a write didn't clear the allow-list check. Distinct from the hard-deny
/// check above, which has no reason variants — it's a single unconditional
/// refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowDenyReason {
    HardDenied,
    GvrNotAllowed,
    NamespaceNotAllowed,
    ClusterScopedNotOptedIn,
}

impl AllowDenyReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            AllowDenyReason::HardDenied => "hard_denied",
            AllowDenyReason::GvrNotAllowed => "gvr_not_allowed",
            AllowDenyReason::NamespaceNotAllowed => "namespace_not_allowed",
            AllowDenyReason::ClusterScopedNotOptedIn => "cluster_scoped_not_opted_in",
        }
    }
}

/// Evaluate the two-layer GVR policy (spec.md §4.6): hard-deny first and
/// unconditionally, then the allow list. Both `ConfigLoader` (rejects at
/// validation) and `Writer` (refuses the API call even if a denied GVR
/// somehow reached it) call this, so invariant I3 holds under an adversarial
/// or stale config either way.
///
/// The allow lists are fail-closed: an empty `allowed_gvrs` permits nothing,
/// matching spec.md §4.6 "Allow list: permitted GVRs and namespaces" as the
/// only path through, not a default-allow.
pub fn check_allowed(
    gvr: &Gvr,
    namespace: Option<&str>,
    cluster_scoped_opt_in: bool,
    allowed_gvrs: &[String],
    allowed_namespaces: &[String],
    allowed_cluster_scoped_gvrs: &[String],
) -> Result<(), AllowDenyReason> {
    if is_hard_denied(gvr) {
        return Err(AllowDenyReason::HardDenied);
    }

    let gvr_str = gvr.to_string();
    if !allowed_gvrs.iter().any(|g| g == &gvr_str) {
        return Err(AllowDenyReason::GvrNotAllowed);
    }

    match namespace {
        Some(ns) => {
            if !allowed_namespaces.is_empty() && !allowed_namespaces.iter().any(|n| n == ns) {
                return Err(AllowDenyReason::NamespaceNotAllowed);
            }
        }
        None => {
            if !cluster_scoped_opt_in || !allowed_cluster_scoped_gvrs.iter().any(|g| g == &gvr_str) {
                return Err(AllowDenyReason::ClusterScopedNotOptedIn);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Spec.md §8 "Hard-deny inviolability": for all SourceConfigs
        /// (including adversarial ones that explicitly allow-list a denied
        /// GVR, its namespace, and opt into cluster scope for it),
        /// `check_allowed` must still refuse.
        #[test]
        fn hard_deny_is_inviolable_under_adversarial_allow_lists(
            idx in 0usize..hard_deny_list().len(),
            namespace in proptest::option::of("[a-z]{1,8}"),
            cluster_scoped_opt_in in any::<bool>(),
            extra_allowed in proptest::collection::vec("[a-z.]{1,20}", 0..5),
        ) {
            let gvr = hard_deny_list()[idx].clone();
            let mut allowed_gvrs = extra_allowed;
            allowed_gvrs.push(gvr.to_string());
            let allowed_namespaces = vec![namespace.clone().unwrap_or_default()];
            let allowed_cluster_scoped_gvrs = vec![gvr.to_string()];

            let result = check_allowed(
                &gvr,
                namespace.as_deref(),
                cluster_scoped_opt_in,
                &allowed_gvrs,
                &allowed_namespaces,
                &allowed_cluster_scoped_gvrs,
            );
            prop_assert_eq!(result, Err(AllowDenyReason::HardDenied));
        }
    }

    #[test]
    fn parses_core_and_grouped() {
        assert_eq!(
            Gvr::parse("v1/secrets"),
            Some(Gvr::core("v1", "secrets"))
        );
        assert_eq!(
            Gvr::parse("rbac.authorization.k8s.io/v1/roles"),
            Some(Gvr::new("rbac.authorization.k8s.io", "v1", "roles"))
        );
        assert_eq!(Gvr::parse("garbage"), None);
    }

    #[test]
    fn secrets_and_rbac_are_hard_denied() {
        assert!(is_hard_denied(&Gvr::parse("v1/secrets").unwrap()));
        assert!(is_hard_denied(
            &Gvr::parse("rbac.authorization.k8s.io/v1/clusterrolebindings").unwrap()
        ));
        assert!(!is_hard_denied(&Gvr::core("v1", "configmaps")));
    }

    #[test]
    fn allow_check_rejects_hard_denied_even_if_allow_listed() {
        let gvr = Gvr::core("v1", "secrets");
        let allowed = vec![gvr.to_string()];
        assert_eq!(
            check_allowed(&gvr, Some("ns-a"), false, &allowed, &[], &[]),
            Err(AllowDenyReason::HardDenied)
        );
    }

    #[test]
    fn allow_check_is_fail_closed_on_empty_allow_list() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        assert_eq!(
            check_allowed(&gvr, Some("ns-a"), false, &[], &[], &[]),
            Err(AllowDenyReason::GvrNotAllowed)
        );
    }

    #[test]
    fn allow_check_admits_namespaced_write_in_allow_list() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let allowed_gvrs = vec![gvr.to_string()];
        let allowed_ns = vec!["ns-a".to_string()];
        assert_eq!(
            check_allowed(&gvr, Some("ns-a"), false, &allowed_gvrs, &allowed_ns, &[]),
            Ok(())
        );
        assert_eq!(
            check_allowed(&gvr, Some("ns-b"), false, &allowed_gvrs, &allowed_ns, &[]),
            Err(AllowDenyReason::NamespaceNotAllowed)
        );
    }

    #[test]
    fn allow_check_requires_explicit_opt_in_for_cluster_scoped() {
        let gvr = Gvr::new("aggregator.observability.io", "v1", "observations");
        let allowed_gvrs = vec![gvr.to_string()];
        assert_eq!(
            check_allowed(&gvr, None, false, &allowed_gvrs, &[], &[]),
            Err(AllowDenyReason::ClusterScopedNotOptedIn)
        );
        assert_eq!(
            check_allowed(&gvr, None, true, &allowed_gvrs, &[], &[gvr.to_string()]),
            Ok(())
        );
    }

    #[test]
    fn display_round_trips() {
        let g = Gvr::parse("v1/secrets").unwrap();
        assert_eq!(g.to_string(), "v1/secrets");
        let g2 = Gvr::parse("rbac.authorization.k8s.io/v1/roles").unwrap();
        assert_eq!(g2.to_string(), "rbac.authorization.k8s.io/v1/roles");
    }
}
