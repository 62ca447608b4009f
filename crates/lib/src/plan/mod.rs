//! Deployment planning.
//!
//! Compares the endpoints a codebase wants with the endpoints it has and groups
//! the differences into changesets. Endpoints whose fingerprints match on both
//! sides are skipped; an endpoint without a fingerprint is never skipped.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::backend::{Backend, Endpoint, EndpointFilter, EventTrigger, Platform, Trigger, endpoint_matches_any_filter};
use crate::consts::PUBSUB_PUBLISH_EVENT;

/// Errors that make a deploy impossible.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
  #[error("[{label}] Changing from {have} function to {want} function is not allowed. Please delete your function and create a new one instead.")]
  TriggerChanged { label: String, have: String, want: String },

  #[error("[{label}] Functions cannot be downgraded from GCFv2 to GCFv1")]
  Downgrade { label: String },
}

/// An update to an existing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointUpdate {
  pub endpoint: Endpoint,
  /// Set when the API can't update in place and the old endpoint must be deleted first.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub delete_and_recreate: Option<Endpoint>,
}

/// Changes for one group of endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Changeset {
  pub endpoints_to_create: Vec<Endpoint>,
  pub endpoints_to_update: Vec<EndpointUpdate>,
  pub endpoints_to_delete: Vec<Endpoint>,
  pub endpoints_to_skip: Vec<Endpoint>,
}

/// Changesets keyed by `{codebase}-{region}-{memory}`.
pub type DeploymentPlan = BTreeMap<String, Changeset>;

/// Inputs to [`create_deployment_plan`].
#[derive(Debug, Clone)]
pub struct PlanArgs<'a> {
  pub want: &'a Backend,
  pub have: &'a Backend,
  pub codebase: &'a str,
  pub filters: Option<&'a [EndpointFilter]>,
  /// Delete endpoints even when this tool didn't deploy them.
  pub delete_all: bool,
}

fn should_skip(want: &Endpoint, have: &Endpoint) -> bool {
  matches!((&want.hash, &have.hash), (Some(w), Some(h)) if w == h)
}

/// Group the differences between `want` and `have` (both keyed by id) by `key_fn`.
pub fn calculate_changesets(
  want: &BTreeMap<String, Endpoint>,
  have: &BTreeMap<String, Endpoint>,
  key_fn: impl Fn(&Endpoint) -> String,
  delete_all: bool,
) -> Result<BTreeMap<String, Changeset>, PlanError> {
  let mut result: BTreeMap<String, Changeset> = BTreeMap::new();

  for (id, endpoint) in want {
    let changeset = result.entry(key_fn(endpoint)).or_default();
    match have.get(id) {
      None => changeset.endpoints_to_create.push(endpoint.clone()),
      Some(existing) if should_skip(endpoint, existing) => changeset.endpoints_to_skip.push(endpoint.clone()),
      Some(existing) => changeset
        .endpoints_to_update
        .push(calculate_update(endpoint, existing)?),
    }
  }

  for (id, endpoint) in have {
    if want.contains_key(id) || !(delete_all || endpoint.is_firebase_managed()) {
      continue;
    }
    result
      .entry(key_fn(endpoint))
      .or_default()
      .endpoints_to_delete
      .push(endpoint.clone());
  }

  let skipped: usize = result.values().map(|c| c.endpoints_to_skip.len()).sum();
  if skipped > 0 {
    info!(skipped, "skipping the deploy of unchanged functions");
  }

  Ok(result)
}

/// Work out how `have` becomes `want`, rejecting illegal transitions.
pub fn calculate_update(want: &Endpoint, have: &Endpoint) -> Result<EndpointUpdate, PlanError> {
  check_for_illegal_update(want, have)?;

  let needs_delete = changed_trigger_region(want, have)
    || changed_v2_pubsub_topic(want, have)
    || upgraded_schedule_from_v1_to_v2(want, have);
  Ok(EndpointUpdate {
    endpoint: want.clone(),
    delete_and_recreate: needs_delete.then(|| have.clone()),
  })
}

/// Plan every region of one codebase.
pub fn create_deployment_plan(args: PlanArgs<'_>) -> Result<DeploymentPlan, PlanError> {
  let want = args
    .want
    .matching(|e| endpoint_matches_any_filter(e, args.filters));
  let have = args
    .have
    .matching(|e| want.has_endpoint(e) || endpoint_matches_any_filter(e, args.filters));

  let regions: BTreeSet<&String> = want.endpoints.keys().chain(have.endpoints.keys()).collect();
  let empty = BTreeMap::new();
  let mut plan = DeploymentPlan::new();

  for region in regions {
    let changesets = calculate_changesets(
      want.endpoints.get(region).unwrap_or(&empty),
      have.endpoints.get(region).unwrap_or(&empty),
      |e| {
        let memory = e
          .available_memory_mb
          .map(|m| m.to_string())
          .unwrap_or_else(|| "default".to_string());
        format!("{}-{}-{}", args.codebase, e.region, memory)
      },
      args.delete_all,
    )?;
    plan.extend(changesets);
  }

  if upgraded_to_gcfv2_without_concurrency(&want, &have) {
    warn!(
      "updating functions to GCFv2 without setting concurrency: new functions default to 80 concurrent \
       executions, existing functions keep the old default of 1"
    );
  }

  Ok(plan)
}

/// Whether an existing v1 endpoint moves to v2 without an explicit concurrency.
pub fn upgraded_to_gcfv2_without_concurrency(want: &Backend, have: &Backend) -> bool {
  want.all_endpoints().any(|e| {
    let was_v1 = have
      .endpoints
      .get(&e.region)
      .and_then(|region| region.get(&e.id))
      .is_some_and(|existing| existing.platform == Platform::Gcfv1);
    was_v1 && e.platform == Platform::Gcfv2 && e.concurrency.is_none()
  })
}

fn check_for_illegal_update(want: &Endpoint, have: &Endpoint) -> Result<(), PlanError> {
  let (want_kind, have_kind) = (want.trigger.kind(), have.trigger.kind());
  if want_kind != have_kind {
    return Err(PlanError::TriggerChanged {
      label: want.label(),
      have: have_kind.to_string(),
      want: want_kind.to_string(),
    });
  }
  if want.platform == Platform::Gcfv1 && have.platform == Platform::Gcfv2 {
    return Err(PlanError::Downgrade { label: want.label() });
  }
  Ok(())
}

/// A v2 event trigger moved to a different region.
fn changed_trigger_region(want: &Endpoint, have: &Endpoint) -> bool {
  if want.platform != Platform::Gcfv2 || have.platform != Platform::Gcfv2 {
    return false;
  }
  match (&want.trigger, &have.trigger) {
    (Trigger::Event(w), Trigger::Event(h)) => w.region != h.region,
    _ => false,
  }
}

/// A v2 Pub/Sub function now listens to a different topic. The API can't
/// change the topic in place.
fn changed_v2_pubsub_topic(want: &Endpoint, have: &Endpoint) -> bool {
  if want.platform != Platform::Gcfv2 || have.platform != Platform::Gcfv2 {
    return false;
  }
  let topic = |t: &EventTrigger| t.event_filters.as_ref().and_then(|f| f.get("topic")).cloned();
  match (&want.trigger, &have.trigger) {
    (Trigger::Event(w), Trigger::Event(h)) if w.event_type == PUBSUB_PUBLISH_EVENT && h.event_type == PUBSUB_PUBLISH_EVENT => {
      topic(w) != topic(h)
    }
    _ => false,
  }
}

/// A v1 scheduled function (Pub/Sub) upgraded to v2 (HTTPS).
fn upgraded_schedule_from_v1_to_v2(want: &Endpoint, have: &Endpoint) -> bool {
  have.platform == Platform::Gcfv1
    && want.platform == Platform::Gcfv2
    && matches!(have.trigger, Trigger::Schedule(_))
    && matches!(want.trigger, Trigger::Schedule(_))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::{HttpsTrigger, ScheduleTrigger};
  use tracing_test::traced_test;

  fn https(id: &str) -> Endpoint {
    Endpoint::new(id, "us-central1", Platform::Gcfv2, Trigger::Https(HttpsTrigger::default()))
  }

  fn hashed(mut e: Endpoint, hash: &str) -> Endpoint {
    e.hash = Some(hash.to_string());
    e
  }

  fn managed(mut e: Endpoint) -> Endpoint {
    e.labels = Some([("deployment-tool".to_string(), "cli-firebase".to_string())].into());
    e
  }

  fn by_id(endpoints: impl IntoIterator<Item = Endpoint>) -> BTreeMap<String, Endpoint> {
    endpoints.into_iter().map(|e| (e.id.clone(), e)).collect()
  }

  fn one_group(want: &[Endpoint], have: &[Endpoint]) -> Changeset {
    let mut sets = calculate_changesets(
      &by_id(want.to_vec()),
      &by_id(have.to_vec()),
      |_| "key".to_string(),
      false,
    )
    .unwrap();
    sets.remove("key").unwrap_or_default()
  }

  #[test]
  fn creates_new_endpoints() {
    let set = one_group(&[https("a")], &[]);
    assert_eq!(set.endpoints_to_create.len(), 1);
  }

  #[test]
  fn skips_matching_hashes() {
    let set = one_group(&[hashed(https("a"), "h")], &[hashed(https("a"), "h")]);
    assert_eq!(set.endpoints_to_skip.len(), 1);
    assert!(set.endpoints_to_update.is_empty());
  }

  #[test]
  fn updates_changed_hashes() {
    let set = one_group(&[hashed(https("a"), "new")], &[hashed(https("a"), "old")]);
    assert_eq!(set.endpoints_to_update.len(), 1);
  }

  #[test]
  fn never_skips_unhashed_endpoints() {
    let set = one_group(&[https("a")], &[hashed(https("a"), "h")]);
    assert_eq!(set.endpoints_to_update.len(), 1);

    let set = one_group(&[https("a")], &[https("a")]);
    assert_eq!(set.endpoints_to_update.len(), 1);
  }

  #[test]
  fn deletes_only_managed_endpoints() {
    let set = one_group(&[], &[managed(https("a")), https("b")]);
    assert_eq!(set.endpoints_to_delete.len(), 1);
    assert_eq!(set.endpoints_to_delete[0].id, "a");

    let sets = calculate_changesets(
      &BTreeMap::new(),
      &by_id([https("b")]),
      |_| "key".to_string(),
      true,
    )
    .unwrap();
    assert_eq!(sets["key"].endpoints_to_delete.len(), 1);
  }

  #[test]
  fn rejects_trigger_change() {
    let mut want = https("a");
    want.trigger = Trigger::Schedule(ScheduleTrigger::default());
    let err = calculate_update(&want, &https("a")).unwrap_err();
    assert!(matches!(err, PlanError::TriggerChanged { .. }));
    assert!(err.to_string().contains("Changing from an HTTPS function to a scheduled function"));
  }

  #[test]
  fn rejects_downgrade() {
    let mut want = https("a");
    want.platform = Platform::Gcfv1;
    assert_eq!(
      calculate_update(&want, &https("a")).unwrap_err(),
      PlanError::Downgrade { label: "a(us-central1)".into() }
    );
  }

  #[test]
  fn region_change_recreates() {
    let event = |region: &str| {
      let mut e = https("a");
      e.trigger = Trigger::Event(EventTrigger {
        event_type: "google.cloud.storage.object.v1.finalized".into(),
        region: Some(region.into()),
        ..Default::default()
      });
      e
    };
    let update = calculate_update(&event("us"), &event("eu")).unwrap();
    assert!(update.delete_and_recreate.is_some());
  }

  #[test]
  fn pubsub_topic_change_recreates() {
    let pubsub = |topic: &str| {
      let mut e = https("a");
      e.trigger = Trigger::Event(EventTrigger {
        event_type: PUBSUB_PUBLISH_EVENT.into(),
        event_filters: Some([("topic".to_string(), topic.to_string())].into()),
        ..Default::default()
      });
      e
    };

    let update = calculate_update(&pubsub("orders"), &pubsub("invoices")).unwrap();
    assert!(update.delete_and_recreate.is_some());

    let update = calculate_update(&pubsub("orders"), &pubsub("orders")).unwrap();
    assert!(update.delete_and_recreate.is_none());

    let mut v1 = pubsub("invoices");
    v1.platform = Platform::Gcfv1;
    let mut want = pubsub("orders");
    want.platform = Platform::Gcfv1;
    assert!(calculate_update(&want, &v1).unwrap().delete_and_recreate.is_none());
  }

  #[test]
  #[traced_test]
  fn v2_upgrade_without_concurrency_warns() {
    let mut v1 = https("a");
    v1.platform = Platform::Gcfv1;
    let have = Backend::of([v1]).unwrap();
    let want = Backend::of([https("a")]).unwrap();
    assert!(upgraded_to_gcfv2_without_concurrency(&want, &have));

    create_deployment_plan(PlanArgs {
      want: &want,
      have: &have,
      codebase: "default",
      filters: None,
      delete_all: false,
    })
    .unwrap();
    assert!(logs_contain("without setting concurrency"));

    let mut concurrent = https("a");
    concurrent.concurrency = Some(80);
    let want = Backend::of([concurrent]).unwrap();
    assert!(!upgraded_to_gcfv2_without_concurrency(&want, &have));
    assert!(!upgraded_to_gcfv2_without_concurrency(&want, &Backend::default()));
  }

  #[test]
  fn schedule_upgrade_recreates() {
    let mut have = https("a");
    have.platform = Platform::Gcfv1;
    have.trigger = Trigger::Schedule(ScheduleTrigger::default());
    let mut want = have.clone();
    want.platform = Platform::Gcfv2;

    assert!(calculate_update(&want, &have).unwrap().delete_and_recreate.is_some());
  }

  #[test]
  fn plan_keys_by_codebase_region_memory() {
    let mut big = https("big");
    big.available_memory_mb = Some(1024);
    let want = Backend::of([https("a"), big]).unwrap();
    let have = Backend::default();

    let plan = create_deployment_plan(PlanArgs {
      want: &want,
      have: &have,
      codebase: "default",
      filters: None,
      delete_all: false,
    })
    .unwrap();

    assert!(plan.contains_key("default-us-central1-default"));
    assert!(plan.contains_key("default-us-central1-1024"));
  }

  #[test]
  fn plan_honors_filters() {
    let want = Backend::of([https("a"), https("b")]).unwrap();
    let have = Backend::of([managed(https("c"))]).unwrap();
    let filters = [EndpointFilter::ids(None, "a")];

    let plan = create_deployment_plan(PlanArgs {
      want: &want,
      have: &have,
      codebase: "default",
      filters: Some(&filters),
      delete_all: false,
    })
    .unwrap();

    let set = &plan["default-us-central1-default"];
    assert_eq!(set.endpoints_to_create.len(), 1);
    assert_eq!(set.endpoints_to_create[0].id, "a");
    assert!(set.endpoints_to_delete.is_empty());
  }
}
