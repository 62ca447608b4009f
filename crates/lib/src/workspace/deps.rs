use std::collections::VecDeque;

use indexmap::IndexSet;
use tracing::trace;

use super::registry::WorkspaceRegistry;

/// Every workspace package reachable from `target` through dependency edges.
///
/// Walks `dependencies`, plus `devDependencies` when `include_dev` is set,
/// breadth first. Names outside the registry are external and ignored. The
/// result is in discovery order and never contains `target`.
pub fn find_internal_dependencies(target: &str, registry: &WorkspaceRegistry, include_dev: bool) -> IndexSet<String> {
  let mut visited: IndexSet<String> = IndexSet::new();
  visited.insert(target.to_string());

  let mut queue = VecDeque::from([target.to_string()]);
  while let Some(current) = queue.pop_front() {
    let Some(package) = registry.get(&current) else {
      continue;
    };

    for dep in package.manifest.dependency_names(include_dev) {
      if registry.contains(dep) && visited.insert(dep.clone()) {
        trace!(from = %current, to = %dep, "internal dependency");
        queue.push_back(dep.clone());
      }
    }
  }

  visited.shift_remove(target);
  visited
}
