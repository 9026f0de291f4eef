//! Row matching primitives: domains, resource paths, and action globs.

use crate::model::{ActionMatch, ModelDefinition, ResourceMatch};
use crate::policy::PermissionPolicy;
use crate::vocabulary::{Action, Domain, Resource, Role, WILDCARD};

/// Glob match where `*` matches any (possibly empty) run of characters.
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }

    let (mut p_idx, mut v_idx) = (0usize, 0usize);
    let (mut star_idx, mut match_idx) = (None, 0usize);
    let pattern_bytes = pattern.as_bytes();
    let value_bytes = value.as_bytes();

    while v_idx < value_bytes.len() {
        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
            star_idx = Some(p_idx);
            match_idx = v_idx;
            p_idx += 1;
            continue;
        }

        if p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == value_bytes[v_idx] {
            p_idx += 1;
            v_idx += 1;
            continue;
        }

        if let Some(star) = star_idx {
            p_idx = star + 1;
            match_idx += 1;
            v_idx = match_idx;
            continue;
        }

        return false;
    }

    while p_idx < pattern_bytes.len() && pattern_bytes[p_idx] == b'*' {
        p_idx += 1;
    }

    p_idx == pattern_bytes.len()
}

/// Path-style match over `/`-separated segments.
///
/// - `:name` matches exactly one segment
/// - a trailing `*` matches one or more remaining segments
/// - anything else must be equal
pub fn path_match(pattern: &str, value: &str) -> bool {
    if pattern == WILDCARD {
        return true;
    }

    let mut pattern_segments = pattern.split('/').peekable();
    let mut value_segments = value.split('/');

    while let Some(p) = pattern_segments.next() {
        let is_last = pattern_segments.peek().is_none();
        if p == WILDCARD && is_last {
            // One or more remaining segments, none empty.
            let rest: Vec<&str> = value_segments.collect();
            return !rest.is_empty() && rest.iter().all(|s| !s.is_empty());
        }

        let Some(v) = value_segments.next() else {
            return false;
        };
        if v.is_empty() {
            return false;
        }
        if p.starts_with(':') && p.len() > 1 {
            continue;
        }
        if p != v {
            return false;
        }
    }

    value_segments.next().is_none()
}

/// Does a permission row's domain apply to the request domain?
///
/// Equal domains always match. Wildcard row domains cover entity domains of
/// their kind but never `sys`.
pub fn domain_matches(policy: &Domain, request: &Domain) -> bool {
    if policy == request {
        return true;
    }
    match (policy.scope(), request.scope()) {
        (Some(p), Some(r)) => p.covers(r),
        _ => false,
    }
}

pub fn resource_matches(policy: &Resource, request: &Resource, mode: ResourceMatch) -> bool {
    if policy.is_wildcard() {
        return true;
    }
    match mode {
        ResourceMatch::Exact => policy == request,
        ResourceMatch::Path => {
            policy.kind() == request.kind() && path_match(policy.as_str(), request.as_str())
        }
    }
}

pub fn action_matches(policy: &Action, request: &Action, mode: ActionMatch) -> bool {
    if policy.is_wildcard() {
        return true;
    }
    match mode {
        ActionMatch::Exact => policy == request,
        ActionMatch::Glob => {
            policy.kind() == request.kind() && wildcard_match(policy.as_str(), request.as_str())
        }
    }
}

/// Full row test for a subject already known to hold `held` in `domain`.
pub fn rule_matches(
    rule: &PermissionPolicy,
    held: Role,
    domain: &Domain,
    resource: &Resource,
    action: &Action,
    model: &ModelDefinition,
) -> bool {
    (rule.role == held || rule.role.is_wildcard())
        && domain_matches(&rule.domain, domain)
        && resource_matches(&rule.resource, resource, model.resource_match)
        && action_matches(&rule.action, action, model.action_match)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::DomainPrefix;
    use uuid::Uuid;

    #[test]
    fn wildcard_match_exact_and_suffix() {
        assert!(wildcard_match("export:csv", "export:csv"));
        assert!(!wildcard_match("export:csv", "export:pdf"));
        assert!(wildcard_match("export:*", "export:pdf"));
        assert!(!wildcard_match("export:*", "export"));
        assert!(wildcard_match("*", "anything"));
    }

    #[test]
    fn wildcard_match_backtracks() {
        assert!(wildcard_match("a*c*e", "abcde"));
        assert!(!wildcard_match("a*c*e", "abcdf"));
    }

    #[test]
    fn path_match_segments() {
        assert!(path_match("patient", "patient"));
        assert!(!path_match("patient", "patient/1"));
        assert!(path_match("patient/:id", "patient/1"));
        assert!(!path_match("patient/:id", "patient/1/notes"));
        assert!(!path_match("patient/:id", "patient"));
        assert!(path_match("patient/*", "patient/1"));
        assert!(path_match("patient/*", "patient/1/notes"));
        assert!(!path_match("patient/*", "patient"));
        assert!(path_match("chat/:id/messages", "chat/9/messages"));
        assert!(!path_match("chat/:id/messages", "chat/9/members"));
    }

    #[test]
    fn domain_match_rules() {
        let p = Domain::parse(&format!("project:{}", Uuid::now_v7())).unwrap();
        let c = Domain::parse(&format!("clinic:{}", Uuid::now_v7())).unwrap();
        let sys = Domain::system();

        assert!(domain_matches(&p, &p));
        assert!(!domain_matches(&p, &c));
        assert!(domain_matches(&Domain::any(), &p));
        assert!(domain_matches(&Domain::any(), &c));
        assert!(!domain_matches(&Domain::any(), &sys));
        assert!(domain_matches(&Domain::any_of(DomainPrefix::Project), &p));
        assert!(!domain_matches(&Domain::any_of(DomainPrefix::Project), &c));
        assert!(domain_matches(&sys, &sys));
    }

    #[test]
    fn resource_and_action_modes() {
        let pattern: Resource = "patient/*".parse().unwrap();
        let object: Resource = "patient/abc".parse().unwrap();
        assert!(resource_matches(&pattern, &object, ResourceMatch::Path));
        assert!(!resource_matches(&pattern, &object, ResourceMatch::Exact));
        assert!(resource_matches(&Resource::any(), &object, ResourceMatch::Exact));

        let glob: Action = "export:*".parse().unwrap();
        let concrete: Action = "export:csv".parse().unwrap();
        assert!(action_matches(&glob, &concrete, ActionMatch::Glob));
        assert!(!action_matches(&glob, &concrete, ActionMatch::Exact));
        assert!(action_matches(&Action::any(), &concrete, ActionMatch::Exact));
    }
}
