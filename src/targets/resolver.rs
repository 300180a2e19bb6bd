use std::borrow::Cow;

use log::debug;

use super::target_cache::TargetCache;
use super::types::Target;
use crate::error_handling::types::ResolveError;

/// Characters that would break the capture service routing when the service
/// name gets spliced into a URL path or query.
const UNSAFE_ROUTING_CHARS: &[char] = &['/', '?', '%'];

/// Completes a capture target description so that its capture service can be
/// contacted.
///
/// Targets that already carry capture service routing are handed back as-is.
/// Otherwise the target is looked up in `cache` (pods by name alone, all
/// other types by node, prefix and name) and a copy of the cached description
/// is returned.
///
/// Errors
/// - [`ResolveError::MissingTarget`] when no target was given.
/// - [`ResolveError::TargetNotFound`] when the cache has no unique match.
/// - [`ResolveError::InvalidRouting`] when the service name is unsafe in URLs.
pub fn complete_target<'a>(
    target: Option<&'a Target>,
    cache: &TargetCache,
) -> Result<Cow<'a, Target>, ResolveError> {
    let target = target.ok_or(ResolveError::MissingTarget)?;
    let completed = if target.has_routing() {
        Cow::Borrowed(target)
    } else {
        let cached = if target.is_pod() {
            cache.pod(&target.name)
        } else {
            cache.on_node(&target.node_name, &target.prefix, &target.name)
        };
        let cached = cached.ok_or_else(|| ResolveError::TargetNotFound(describe(target)))?;
        debug!(
            "completed target {} from cache: capture service {:?}",
            describe(target),
            cached.capture_service
        );
        Cow::Owned(Target::clone(&cached))
    };
    if completed.capture_service.contains(UNSAFE_ROUTING_CHARS) {
        return Err(ResolveError::InvalidRouting(describe(&completed)));
    }
    Ok(completed)
}

fn describe(t: &Target) -> String {
    if t.node_name.is_empty() {
        format!("{:?} ({})", t.name, t.target_type)
    } else {
        format!("{:?} ({}) on {:?}", t.name, t.target_type, t.node_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn routed(name: &str, target_type: &str, node: &str, service: &str) -> Target {
        Target {
            name: name.to_string(),
            target_type: target_type.to_string(),
            node_name: node.to_string(),
            capture_service: service.to_string(),
            capture_port: 5001,
            network_interfaces: vec!["eth0".to_string()],
            ..Default::default()
        }
    }

    fn cache() -> TargetCache {
        let cache = TargetCache::new();
        cache.set(vec![
            routed("default/nginx", "pod", "worker-1", "sharktank-w1"),
            routed("kubelet", "proc", "worker-2", "sharktank-w2"),
            routed("default/evil", "pod", "worker-1", "bad/route"),
        ]);
        cache
    }

    #[test]
    fn test_missing_target() {
        assert_eq!(
            complete_target(None, &cache()).unwrap_err(),
            ResolveError::MissingTarget
        );
    }

    #[test]
    fn test_routed_target_is_returned_unchanged() {
        let t = routed("whatever", "docker", "n", "svc");
        let completed = complete_target(Some(&t), &TargetCache::new()).unwrap();
        assert!(matches!(completed, Cow::Borrowed(_)));
        assert!(std::ptr::eq(&*completed, &t));
    }

    #[test]
    fn test_pod_completed_by_name() {
        let t = Target::pod("default/nginx");
        let completed = complete_target(Some(&t), &cache()).unwrap();
        assert!(matches!(completed, Cow::Owned(_)));
        assert_eq!(completed.capture_service, "sharktank-w1");
        assert_eq!(completed.capture_port, 5001);
        assert_eq!(completed.node_name, "worker-1");
        // the caller's description stays untouched
        assert!(t.capture_service.is_empty());
    }

    #[test]
    fn test_non_pod_completed_by_node() {
        let t = Target {
            name: "kubelet".to_string(),
            target_type: "proc".to_string(),
            node_name: "worker-2".to_string(),
            ..Default::default()
        };
        let completed = complete_target(Some(&t), &cache()).unwrap();
        assert_eq!(completed.capture_service, "sharktank-w2");
    }

    #[test]
    fn test_not_found() {
        let t = Target {
            name: "kubelet".to_string(),
            target_type: "proc".to_string(),
            node_name: "worker-7".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            complete_target(Some(&t), &cache()),
            Err(ResolveError::TargetNotFound(_))
        ));
        assert!(matches!(
            complete_target(Some(&Target::pod("default/ghost")), &cache()),
            Err(ResolveError::TargetNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_routing() {
        assert!(matches!(
            complete_target(Some(&Target::pod("default/evil")), &cache()),
            Err(ResolveError::InvalidRouting(_))
        ));
        for service in ["a?b", "100%", "x/y"] {
            let t = routed("p", "pod", "n", service);
            assert!(matches!(
                complete_target(Some(&t), &TargetCache::new()),
                Err(ResolveError::InvalidRouting(_))
            ));
        }
    }
}
