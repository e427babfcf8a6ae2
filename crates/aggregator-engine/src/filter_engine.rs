//! FilterEngine (C4). Spec.md §4.4.
//!
//! Pure function over a `FilterSet` snapshot — no internal state, so the
//! Pipeline can pin an `Arc<FilterSet>` per event without FilterEngine
//! itself needing to know about reloads (spec.md §3 "Ownership").

use std::sync::Arc;

use aggregator_common::filter::FilterSet;
use aggregator_common::types::{Category, RawEvent, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Admit,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NamespaceExcluded,
    CategoryExcluded,
    KindExcluded,
    EventTypeExcluded,
    NotInNamespaceAllowlist,
    NotInCategoryAllowlist,
    NotInKindAllowlist,
    NotInEventTypeAllowlist,
    BelowMinSeverity,
    BelowMinPriority,
}

impl DenyReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            DenyReason::NamespaceExcluded => "namespace_excluded",
            DenyReason::CategoryExcluded => "category_excluded",
            DenyReason::KindExcluded => "kind_excluded",
            DenyReason::EventTypeExcluded => "event_type_excluded",
            DenyReason::NotInNamespaceAllowlist => "namespace_not_allowed",
            DenyReason::NotInCategoryAllowlist => "category_not_allowed",
            DenyReason::NotInKindAllowlist => "kind_not_allowed",
            DenyReason::NotInEventTypeAllowlist => "event_type_not_allowed",
            DenyReason::BelowMinSeverity => "below_min_severity",
            DenyReason::BelowMinPriority => "below_min_priority",
        }
    }
}

/// Fields already resolved for this event (by the Normalizer, or by the
/// default pre-normalize view under `dedup_first`), evaluated against the
/// FilterSet. Evaluation order is fixed per spec.md §4.4 so `reason` is
/// metric-stable: namespace exclude/include, category/kind/eventType
/// exclude/include, min severity, min priority.
pub struct FilterInput<'a> {
    pub namespace: Option<&'a str>,
    pub category: Category,
    pub kind: Option<&'a str>,
    pub event_type: &'a str,
    pub severity: Severity,
    pub priority: Option<f64>,
}

pub fn evaluate(set: &FilterSet, input: &FilterInput) -> FilterDecision {
    let rule = &set.rule;

    if let Some(ns) = input.namespace {
        if rule.exclude_namespaces.iter().any(|n| n == ns) {
            return FilterDecision::Deny(DenyReason::NamespaceExcluded);
        }
        if !rule.include_namespaces.is_empty() && !rule.include_namespaces.iter().any(|n| n == ns) {
            return FilterDecision::Deny(DenyReason::NotInNamespaceAllowlist);
        }
    }

    let category_str = input.category.to_string();
    if rule.exclude_categories.iter().any(|c| c == &category_str) {
        return FilterDecision::Deny(DenyReason::CategoryExcluded);
    }
    if !rule.include_categories.is_empty()
        && !rule.include_categories.iter().any(|c| c == &category_str)
    {
        return FilterDecision::Deny(DenyReason::NotInCategoryAllowlist);
    }

    if let Some(kind) = input.kind {
        if rule.exclude_kinds.iter().any(|k| k == kind) {
            return FilterDecision::Deny(DenyReason::KindExcluded);
        }
        if !rule.include_kinds.is_empty() && !rule.include_kinds.iter().any(|k| k == kind) {
            return FilterDecision::Deny(DenyReason::NotInKindAllowlist);
        }
    }

    if rule.exclude_event_types.iter().any(|e| e == input.event_type) {
        return FilterDecision::Deny(DenyReason::EventTypeExcluded);
    }
    if !rule.include_event_types.is_empty()
        && !rule.include_event_types.iter().any(|e| e == input.event_type)
    {
        return FilterDecision::Deny(DenyReason::NotInEventTypeAllowlist);
    }

    if input.severity < set.min_severity {
        return FilterDecision::Deny(DenyReason::BelowMinSeverity);
    }

    let priority = input.priority.unwrap_or(1.0);
    if priority < set.min_priority {
        return FilterDecision::Deny(DenyReason::BelowMinPriority);
    }

    FilterDecision::Admit
}

/// Reference-counted, versioned snapshot the Pipeline pins per event.
pub type FilterSnapshot = Arc<FilterSet>;

/// Helper retained for call sites that still have the raw `RawEvent` and
/// want to check namespace/kind straight off `resourceRef` before a full
/// Normalize pass (used by `dedup_first`'s pre-filter check).
pub fn resource_namespace(event: &RawEvent) -> Option<&str> {
    event.resource_ref.as_ref().and_then(|r| r.namespace.as_deref())
}

pub fn resource_kind(event: &RawEvent) -> Option<&str> {
    event.resource_ref.as_ref().map(|r| r.kind.as_str())
}
