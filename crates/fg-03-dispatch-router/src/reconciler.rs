//! # Reconciler
//!
//! Answers index/get/stats for an institution that may be split across
//! several backends. Every backend call is recorded as a `PluginCall` child
//! of the inbound request's log entry when a log is attached.
//!
//! ## Get Resolution
//!
//! ```text
//! requested ids ──► mapping store
//!        │                │
//!        │     mapped ────┴──► backend_for_unit ──► one fetch per unit backend (concurrent)
//!        │
//!        └── unmapped ──► primary ──► next backend ──► ... (only still-missing ids)
//! ```

use crate::domain::{Backend, DispatchError};
use crate::ports::RecordQueryApi;
use crate::router::DispatchRouter;
use async_trait::async_trait;
use fg_01_communication_log::{CommunicationDetail, CommunicationLogApi, LogId, LogOutcome};
use fg_02_identifier_mapping::MappingApi;
use futures::future::join_all;
use shared_types::{Capability, InstitutionId, Record, StatsCounters, ValidationError};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Multi-backend query service.
pub struct Reconciler {
    router: Arc<DispatchRouter>,
    mappings: Arc<dyn MappingApi>,
    log: Option<Arc<dyn CommunicationLogApi>>,
}

impl Reconciler {
    /// Reconciler without call logging.
    pub fn new(router: Arc<DispatchRouter>, mappings: Arc<dyn MappingApi>) -> Self {
        Self {
            router,
            mappings,
            log: None,
        }
    }

    /// Record each backend call in `log`.
    pub fn with_log(mut self, log: Arc<dyn CommunicationLogApi>) -> Self {
        self.log = Some(log);
        self
    }

    /// Router this reconciler resolves through.
    pub fn router(&self) -> &Arc<DispatchRouter> {
        &self.router
    }

    /// Run one backend call, wrapped in a `PluginCall` entry.
    ///
    /// Logging is best-effort: a failing log never fails the call.
    async fn logged<T, F>(
        &self,
        backend: &Backend,
        function: &'static str,
        parent: Option<LogId>,
        call: F,
    ) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, DispatchError>>,
    {
        let handle = self.log.as_ref().and_then(|log| {
            let detail = CommunicationDetail::PluginCall {
                plugin: backend.id().to_string(),
                function: function.to_string(),
            };
            log.begin(&format!("{function} on {}", backend.id()), parent, detail)
                .map_err(|e| warn!(backend = %backend.id(), error = %e, "[fg-03] Cannot log plugin call"))
                .ok()
        });

        let result = call.await;

        if let (Some(log), Some(handle)) = (self.log.as_ref(), handle) {
            let outcome = match &result {
                Ok(_) => LogOutcome::default(),
                Err(e) => LogOutcome::failure(format!("{function} on {} failed", backend.id()), e.to_string()),
            };
            if let Err(e) = log.complete(handle, outcome) {
                warn!(backend = %backend.id(), error = %e, "[fg-03] Cannot complete plugin call log");
            }
        }
        result
    }

    fn check(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<(), DispatchError> {
        self.validate(institution, capability).map_err(DispatchError::from)
    }

    /// Ids that have a mapping, grouped by the backend of their unit.
    /// Mapped ids whose unit no backend covers are dropped.
    fn partition(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
    ) -> Result<(Vec<(Arc<Backend>, Vec<String>)>, Vec<String>), DispatchError> {
        let registry = self.router.snapshot();
        let mut groups: Vec<(Arc<Backend>, Vec<String>)> = Vec::new();
        let mut unmapped = Vec::new();

        for id in ids {
            let Some(ounit) = self.mappings.get_mapping(institution, id)? else {
                unmapped.push(id.clone());
                continue;
            };
            match registry.backend_for_unit(institution, &ounit, capability) {
                Some(backend) => match groups.iter_mut().find(|(b, _)| b.id() == backend.id()) {
                    Some((_, batch)) => batch.push(id.clone()),
                    None => groups.push((backend, vec![id.clone()])),
                },
                None => warn!(
                    institution = %institution,
                    id = %id,
                    ounit = %ounit,
                    "[fg-03] Mapped unit has no backend, dropping id"
                ),
            }
        }
        Ok((groups, unmapped))
    }
}

#[async_trait]
impl RecordQueryApi for Reconciler {
    fn validate(
        &self,
        institution: &InstitutionId,
        capability: Capability,
    ) -> Result<(), ValidationError> {
        let registry = self.router.snapshot();
        if registry.has_backend(institution, capability) {
            return Ok(());
        }
        if registry.knows_institution(institution) {
            Err(ValidationError::CapabilityNotServed {
                institution: institution.clone(),
                capability,
            })
        } else {
            Err(ValidationError::UnknownInstitution(institution.clone()))
        }
    }

    async fn index(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        parent: Option<LogId>,
    ) -> Result<Vec<String>, DispatchError> {
        self.check(institution, capability)?;
        let backends = self.router.all_backends(institution, capability);

        let listings = join_all(backends.iter().map(|backend| {
            self.logged(backend, "list_ids", parent, backend.list_ids(institution, capability))
        }))
        .await;

        let mut ids = Vec::new();
        for listing in listings {
            ids.extend(listing?);
        }
        debug!(institution = %institution, %capability, count = ids.len(), "[fg-03] Index reconciled");
        Ok(ids)
    }

    async fn get(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        ids: &[String],
        parent: Option<LogId>,
    ) -> Result<Vec<Record>, DispatchError> {
        self.check(institution, capability)?;

        let mut seen = HashSet::new();
        let requested: Vec<String> = ids.iter().filter(|id| seen.insert(*id)).cloned().collect();
        let (groups, unmapped) = self.partition(institution, capability, &requested)?;

        let mut found: HashMap<String, Record> = HashMap::new();

        let fetched = join_all(groups.iter().map(|(backend, batch)| {
            self.logged(backend, "fetch", parent, backend.fetch(institution, capability, batch))
        }))
        .await;
        for (records, (_, batch)) in fetched.into_iter().zip(&groups) {
            for record in records? {
                if batch.contains(&record.id) {
                    found.entry(record.id.clone()).or_insert(record);
                }
            }
        }

        let mut missing = unmapped;
        for backend in self.router.snapshot().backends_primary_first(institution, capability) {
            if missing.is_empty() {
                break;
            }
            let records = self
                .logged(&backend, "fetch", parent, backend.fetch(institution, capability, &missing))
                .await?;
            for record in records {
                if missing.contains(&record.id) {
                    found.entry(record.id.clone()).or_insert(record);
                }
            }
            missing.retain(|id| !found.contains_key(id));
        }

        if !missing.is_empty() {
            debug!(institution = %institution, dropped = missing.len(), "[fg-03] Unknown ids omitted");
        }

        Ok(requested.iter().filter_map(|id| found.remove(id)).collect())
    }

    async fn stats(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        parent: Option<LogId>,
    ) -> Result<StatsCounters, DispatchError> {
        self.check(institution, capability)?;
        let backends = self.router.all_backends(institution, capability);

        let reports = join_all(backends.iter().map(|backend| {
            self.logged(backend, "stats", parent, backend.stats(institution, capability))
        }))
        .await;

        let mut totals = StatsCounters::zeroed(capability.stat_fields());
        for report in reports {
            totals.merge(&report?);
        }
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::domain::{BackendDescriptor, BackendRegistry};
    use crate::ports::FailingProvider;
    use fg_01_communication_log::{CommunicationLogService, InMemoryLogRepository, LogKind};
    use fg_02_identifier_mapping::{InMemoryMappingRepository, MappingService};
    use shared_types::{BackendStats, OunitId};

    const HEI: &str = "uni.example";

    fn hei() -> InstitutionId {
        InstitutionId::from(HEI)
    }

    fn backend(id: &str, ounit: &str, records: &[&str]) -> InMemoryBackend {
        InMemoryBackend::new(
            BackendDescriptor::new(id, HEI)
                .serving(Capability::Agreements)
                .covering(ounit),
        )
        .with_records(
            Capability::Agreements,
            records.iter().map(|r| Record::owned(*r, ounit)).collect(),
        )
    }

    fn mappings() -> Arc<MappingService> {
        Arc::new(MappingService::new(Arc::new(InMemoryMappingRepository::new())))
    }

    fn reconciler(backends: Vec<Backend>, mappings: Arc<MappingService>) -> Reconciler {
        let mut builder = BackendRegistry::builder();
        for b in backends {
            builder = builder.register(b);
        }
        let router = Arc::new(DispatchRouter::new(builder.build().unwrap()));
        Reconciler::new(router, mappings)
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn stats(pairs: &[(&str, Option<u64>)]) -> BackendStats {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_index_concatenates_in_router_order() {
        let b1 = backend("b1", "law", &["a1"]);
        let b2 = backend("b2", "arts", &["b2", "c3"]);
        let r = reconciler(vec![Backend::InMemory(b1), Backend::InMemory(b2)], mappings());

        let listed = r.index(&hei(), Capability::Agreements, None).await.unwrap();
        assert_eq!(listed, ids(&["a1", "b2", "c3"]));
    }

    #[tokio::test]
    async fn test_index_keeps_duplicates() {
        let b1 = backend("b1", "law", &["x"]);
        let b2 = backend("b2", "arts", &["x"]);
        let r = reconciler(vec![Backend::InMemory(b1), Backend::InMemory(b2)], mappings());

        let listed = r.index(&hei(), Capability::Agreements, None).await.unwrap();
        assert_eq!(listed, ids(&["x", "x"]));
    }

    #[tokio::test]
    async fn test_mapped_get_calls_only_unit_backend() {
        let b1 = backend("b1", "law", &["a1"]);
        let b2 = backend("b2", "arts", &["b2"]);
        let m = mappings();
        m.register_mapping(&hei(), "b2", &OunitId::from("arts")).unwrap();
        let r = reconciler(
            vec![Backend::InMemory(b1.clone()), Backend::InMemory(b2.clone())],
            m,
        );

        let records = r.get(&hei(), Capability::Agreements, &ids(&["b2"]), None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "b2");
        assert_eq!(b1.calls().total(), 0);
        assert_eq!(b2.calls().fetch_calls, vec![ids(&["b2"])]);
    }

    #[tokio::test]
    async fn test_unmapped_get_asks_primary_first() {
        let b1 = backend("b1", "law", &["a1"]);
        let b2 = InMemoryBackend::new(
            BackendDescriptor::new("b2", HEI)
                .serving(Capability::Agreements)
                .covering("arts")
                .primary(),
        );
        let b3 = backend("b3", "music", &["c3"]);
        let r = reconciler(
            vec![
                Backend::InMemory(b1.clone()),
                Backend::InMemory(b2.clone()),
                Backend::InMemory(b3.clone()),
            ],
            mappings(),
        );

        let records = r
            .get(&hei(), Capability::Agreements, &ids(&["c3", "a1"]), None)
            .await
            .unwrap();
        let got: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec!["c3", "a1"]);

        // Primary sees everything, b1 is next, b3 only gets what b1 lacked.
        assert_eq!(b2.calls().fetch_calls, vec![ids(&["c3", "a1"])]);
        assert_eq!(b1.calls().fetch_calls, vec![ids(&["c3", "a1"])]);
        assert_eq!(b3.calls().fetch_calls, vec![ids(&["c3"])]);
    }

    #[tokio::test]
    async fn test_primary_asked_before_owning_backend() {
        let b1 = InMemoryBackend::new(
            BackendDescriptor::new("b1", HEI).serving(Capability::Agreements).primary(),
        );
        let b2 = backend("b2", "arts", &["x9"]);
        let r = reconciler(
            vec![Backend::InMemory(b1.clone()), Backend::InMemory(b2.clone())],
            mappings(),
        );

        let records = r.get(&hei(), Capability::Agreements, &ids(&["x9"]), None).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(b1.calls().fetch_calls.len(), 1);
        assert_eq!(b2.calls().fetch_calls.len(), 1);
    }

    #[tokio::test]
    async fn test_get_stops_once_everything_is_found() {
        let b1 = backend("b1", "law", &["a1"]);
        let b2 = backend("b2", "arts", &["b2"]);
        let r = reconciler(
            vec![Backend::InMemory(b1.clone()), Backend::InMemory(b2.clone())],
            mappings(),
        );

        r.get(&hei(), Capability::Agreements, &ids(&["a1"]), None).await.unwrap();
        assert_eq!(b1.calls().fetch_calls.len(), 1);
        assert_eq!(b2.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_dropped_silently() {
        let b1 = backend("b1", "law", &["a1"]);
        let r = reconciler(vec![Backend::InMemory(b1)], mappings());

        let records = r
            .get(&hei(), Capability::Agreements, &ids(&["nope", "a1", "a1"]), None)
            .await
            .unwrap();
        let got: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec!["a1"]);
    }

    #[tokio::test]
    async fn test_stats_are_summed_field_wise() {
        let b1 = InMemoryBackend::new(BackendDescriptor::new("b1", HEI).serving(Capability::Agreements))
            .with_stats(Capability::Agreements, stats(&[("fetchable", Some(1)), ("bothApproved", Some(4))]));
        let b2 = InMemoryBackend::new(BackendDescriptor::new("b2", HEI).serving(Capability::Agreements))
            .with_stats(Capability::Agreements, stats(&[("fetchable", Some(11)), ("bothApproved", Some(14))]));

        let forward = reconciler(
            vec![Backend::InMemory(b1.clone()), Backend::InMemory(b2.clone())],
            mappings(),
        );
        let totals = forward.stats(&hei(), Capability::Agreements, None).await.unwrap();
        assert_eq!(totals.get("fetchable"), 12);
        assert_eq!(totals.get("bothApproved"), 18);
        assert_eq!(totals.get("localUnapprovedPartnerApproved"), 0);

        let reverse = reconciler(vec![Backend::InMemory(b2), Backend::InMemory(b1)], mappings());
        assert_eq!(reverse.stats(&hei(), Capability::Agreements, None).await.unwrap(), totals);
    }

    #[tokio::test]
    async fn test_stats_null_counts_as_zero() {
        let b1 = InMemoryBackend::new(BackendDescriptor::new("b1", HEI).serving(Capability::Agreements))
            .with_stats(Capability::Agreements, stats(&[("fetchable", None)]));
        let r = reconciler(vec![Backend::InMemory(b1)], mappings());
        let totals = r.stats(&hei(), Capability::Agreements, None).await.unwrap();
        assert_eq!(totals, StatsCounters::zeroed(Capability::Agreements.stat_fields()));
    }

    #[tokio::test]
    async fn test_one_failing_backend_fails_the_request() {
        let b1 = backend("b1", "law", &["a1"]);
        let failing = Backend::external(
            BackendDescriptor::new("ext", HEI).serving(Capability::Agreements),
            Arc::new(FailingProvider::new("plugin crashed")),
        );
        let r = reconciler(vec![Backend::InMemory(b1.clone()), failing], mappings());

        let err = r.index(&hei(), Capability::Agreements, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Backend ext failed during list_ids: plugin crashed");
        // The healthy branch still ran to completion.
        assert_eq!(b1.calls().list_calls, 1);
    }

    #[tokio::test]
    async fn test_unknown_institution_is_a_validation_error() {
        let r = reconciler(vec![Backend::InMemory(backend("b1", "law", &[]))], mappings());

        let err = r
            .index(&InstitutionId::from("test"), Capability::Agreements, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown HEI ID: test");
        assert!(matches!(
            r.validate(&hei(), Capability::Courses),
            Err(ValidationError::CapabilityNotServed { .. })
        ));
    }

    #[tokio::test]
    async fn test_plugin_calls_are_logged_as_children() {
        let log = Arc::new(CommunicationLogService::with_system_clock(Arc::new(
            InMemoryLogRepository::new(),
        )));
        let parent = log
            .begin("inbound", None, CommunicationDetail::Generic)
            .unwrap();
        let parent_id = parent.id();

        let b1 = backend("b1", "law", &["a1"]);
        let b2 = backend("b2", "arts", &["b2"]);
        let r = reconciler(vec![Backend::InMemory(b1), Backend::InMemory(b2)], mappings())
            .with_log(log.clone());

        r.index(&hei(), Capability::Agreements, Some(parent_id)).await.unwrap();

        let children = log.sorted_children(parent_id).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.detail.kind() == LogKind::PluginCall));
        assert!(children.iter().all(|c| !c.is_in_progress()));
    }
}
