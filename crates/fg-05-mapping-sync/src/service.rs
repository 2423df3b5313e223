//! # Mapping Synchronizer Service
//!
//! One run walks every backend of every institution, per configured
//! capability, and stores the owning unit of each id that has no mapping yet.
//!
//! ```text
//! for (institution, backends) in router.all_backends_grouped_by_institution(cap):
//!     for backend in backends:
//!         ids      = backend.list_ids()
//!         unmapped = ids without a stored mapping      (no backend call)
//!         for chunk in unmapped.chunks(batch_size):
//!             for record in backend.fetch(chunk):
//!                 register(record.id -> record.owner)
//! ```
//!
//! A failing backend is skipped and counted; the run goes on with the rest.
//! Records without an owner are counted and left unmapped, so they are
//! fetched again by the next run. Records outside the requested chunk, and
//! records whose key the mapping store refuses, are counted as rejected.
//! Only a mapping store failure ends the run.

use crate::domain::{SyncConfig, SyncError, SyncReport};
use crate::ports::MappingSyncApi;
use async_trait::async_trait;
use fg_02_identifier_mapping::{MappingApi, MappingError, RegisterOutcome};
use fg_03_dispatch_router::{Backend, DispatchRouter};
use shared_types::{Capability, InstitutionId};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Discovers record owners and fills the mapping store.
pub struct MappingSynchronizer {
    router: Arc<DispatchRouter>,
    mappings: Arc<dyn MappingApi>,
    config: SyncConfig,
}

impl MappingSynchronizer {
    /// Create a synchronizer.
    ///
    /// ## Errors
    ///
    /// - `InvalidBatchSize`: `config.batch_size` is zero
    pub fn new(
        router: Arc<DispatchRouter>,
        mappings: Arc<dyn MappingApi>,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self {
            router,
            mappings,
            config,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    async fn sync_backend(
        &self,
        institution: &InstitutionId,
        capability: Capability,
        backend: &Backend,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let listed = match backend.list_ids(institution, capability).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(backend = %backend.id(), %institution, error = %e, "[fg-05] Listing failed, backend skipped");
                report.backend_failures += 1;
                return Ok(());
            }
        };

        let mut seen = HashSet::new();
        let mut unmapped = Vec::new();
        for id in listed {
            if !seen.insert(id.clone()) {
                continue;
            }
            report.ids_listed += 1;
            if self.mappings.get_mapping(institution, &id)?.is_none() {
                unmapped.push(id);
            }
        }
        debug!(
            backend = %backend.id(),
            %institution,
            listed = seen.len(),
            unmapped = unmapped.len(),
            "[fg-05] Listed ids"
        );

        for chunk in unmapped.chunks(self.config.batch_size) {
            report.fetch_calls += 1;
            let records = match backend.fetch(institution, capability, chunk).await {
                Ok(records) => records,
                Err(e) => {
                    warn!(backend = %backend.id(), %institution, error = %e, "[fg-05] Fetch failed, batch skipped");
                    report.backend_failures += 1;
                    continue;
                }
            };

            let requested: HashSet<&str> = chunk.iter().map(String::as_str).collect();
            for record in records {
                if !requested.contains(record.id.as_str()) {
                    warn!(backend = %backend.id(), %institution, id = %record.id, "[fg-05] Backend returned an id that was not requested");
                    report.rejected += 1;
                    continue;
                }
                let Some(owner) = record.owner_ounit_id else {
                    warn!(backend = %backend.id(), %institution, id = %record.id, "[fg-05] Record has no owning unit");
                    report.without_owner += 1;
                    continue;
                };
                match self.mappings.register_mapping(institution, &record.id, &owner) {
                    Ok(RegisterOutcome::Created(_)) => report.created += 1,
                    Ok(RegisterOutcome::AlreadyPresent(_)) => {}
                    Ok(RegisterOutcome::Conflict(_)) => report.conflicts += 1,
                    Err(MappingError::InvalidKey(reason)) => {
                        warn!(backend = %backend.id(), %institution, id = %record.id, %reason, "[fg-05] Mapping refused, record skipped");
                        report.rejected += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MappingSyncApi for MappingSynchronizer {
    async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let mut institutions = BTreeSet::new();

        for &capability in &self.config.capabilities {
            let federation = self.router.all_backends_grouped_by_institution(capability);
            for (institution, backends) in federation {
                for backend in &backends {
                    self.sync_backend(&institution, capability, backend, &mut report)
                        .await?;
                }
                institutions.insert(institution);
            }
        }
        report.institutions = institutions.len();

        info!(
            institutions = report.institutions,
            listed = report.ids_listed,
            fetch_calls = report.fetch_calls,
            created = report.created,
            conflicts = report.conflicts,
            "[fg-05] Synchronization run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fg_02_identifier_mapping::{InMemoryMappingRepository, MappingService};
    use fg_03_dispatch_router::{
        BackendDescriptor, BackendRegistry, FailingProvider, InMemoryBackend, ProviderError,
        RecordProvider,
    };
    use shared_types::{BackendStats, OunitId, Record};

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

    fn config(batch_size: usize) -> SyncConfig {
        SyncConfig {
            capabilities: vec![Capability::Agreements],
            batch_size,
            ..SyncConfig::default()
        }
    }

    fn synchronizer(
        backends: Vec<Backend>,
        mappings: Arc<MappingService>,
        batch_size: usize,
    ) -> MappingSynchronizer {
        let mut builder = BackendRegistry::builder();
        for b in backends {
            builder = builder.register(b);
        }
        let router = Arc::new(DispatchRouter::new(builder.build().unwrap()));
        MappingSynchronizer::new(router, mappings, config(batch_size)).unwrap()
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = MappingSynchronizer::new(Arc::new(DispatchRouter::empty()), mappings(), config(0));
        assert!(matches!(result, Err(SyncError::InvalidBatchSize(0))));
    }

    #[tokio::test]
    async fn test_discovers_owners() {
        let law = backend("law", "law", &["a1", "a2"]);
        let med = backend("med", "med", &["b1"]);
        let store = mappings();
        let sync = synchronizer(
            vec![Backend::InMemory(law), Backend::InMemory(med)],
            store.clone(),
            10,
        );

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.institutions, 1);
        assert_eq!(report.ids_listed, 3);
        assert_eq!(report.fetch_calls, 2);
        assert_eq!(report.created, 3);
        assert_eq!(store.get_mapping(&hei(), "a2").unwrap(), Some(OunitId::from("law")));
        assert_eq!(store.get_mapping(&hei(), "b1").unwrap(), Some(OunitId::from("med")));
    }

    #[tokio::test]
    async fn test_second_run_issues_no_fetches() {
        let law = backend("law", "law", &["a1", "a2", "a3"]);
        let sync = synchronizer(vec![Backend::InMemory(law.clone())], mappings(), 10);

        sync.run_once().await.unwrap();
        law.reset_calls();

        let report = sync.run_once().await.unwrap();
        assert!(report.is_quiet());
        assert_eq!(report.ids_listed, 3);
        assert_eq!(law.calls().list_calls, 1);
        assert!(law.calls().fetch_calls.is_empty());
    }

    #[tokio::test]
    async fn test_only_new_ids_are_fetched() {
        let law = backend("law", "law", &["a1", "a2"]);
        let sync = synchronizer(vec![Backend::InMemory(law.clone())], mappings(), 10);
        sync.run_once().await.unwrap();

        law.insert_record(Capability::Agreements, Record::owned("a3", "law"));
        law.reset_calls();

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(law.calls().fetch_calls, vec![vec!["a3".to_string()]]);
    }

    #[tokio::test]
    async fn test_fetches_are_batched() {
        let law = backend("law", "law", &["a1", "a2", "a3", "a4", "a5"]);
        let sync = synchronizer(vec![Backend::InMemory(law.clone())], mappings(), 2);

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.fetch_calls, 3);
        let sizes: Vec<_> = law.calls().fetch_calls.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_ownership_drift_is_a_conflict_not_an_update() {
        let store = mappings();
        store
            .register_mapping(&hei(), "a1", &OunitId::from("med"))
            .unwrap();
        let law = backend("law", "law", &["a1", "a2"]);
        let sync = synchronizer(vec![Backend::InMemory(law.clone())], store.clone(), 10);

        let report = sync.run_once().await.unwrap();
        // a1 is already mapped, so it is never re-resolved.
        assert_eq!(report.conflicts, 0);
        assert_eq!(law.calls().fetch_calls, vec![vec!["a2".to_string()]]);
        assert_eq!(store.get_mapping(&hei(), "a1").unwrap(), Some(OunitId::from("med")));
    }

    #[tokio::test]
    async fn test_records_without_owner_are_counted() {
        let law = backend("law", "law", &["a1"]);
        law.insert_record(
            Capability::Agreements,
            Record {
                id: "orphan".into(),
                owner_ounit_id: None,
                payload: serde_json::Value::Null,
            },
        );
        let store = mappings();
        let sync = synchronizer(vec![Backend::InMemory(law)], store.clone(), 10);

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.without_owner, 1);
        assert_eq!(store.get_mapping(&hei(), "orphan").unwrap(), None);
    }

    #[tokio::test]
    async fn test_failing_backend_is_skipped() {
        let law = backend("law", "law", &["a1"]);
        let failing = Backend::external(
            BackendDescriptor::new("ext", HEI).serving(Capability::Agreements),
            Arc::new(FailingProvider::new("plugin crashed")),
        );
        let sync = synchronizer(vec![failing, Backend::InMemory(law)], mappings(), 10);

        let report = sync.run_once().await.unwrap();
        assert_eq!(report.backend_failures, 1);
        assert_eq!(report.created, 1);
    }

    /// Lists `a1` and an empty id, then answers every fetch with extra
    /// records nobody asked for.
    struct OverEagerProvider;

    #[async_trait]
    impl RecordProvider for OverEagerProvider {
        async fn list_ids(
            &self,
            _institution: &InstitutionId,
            _capability: Capability,
        ) -> Result<Vec<String>, ProviderError> {
            Ok(vec!["a1".into(), String::new()])
        }

        async fn fetch(
            &self,
            _institution: &InstitutionId,
            _capability: Capability,
            _ids: &[String],
        ) -> Result<Vec<Record>, ProviderError> {
            Ok(vec![
                Record::owned("a1", "law"),
                Record::owned("", "law"),
                Record::owned("z9", "law"),
            ])
        }

        async fn stats(
            &self,
            _institution: &InstitutionId,
            _capability: Capability,
        ) -> Result<BackendStats, ProviderError> {
            Ok(BackendStats::default())
        }
    }

    #[tokio::test]
    async fn test_misbehaving_backend_records_are_rejected_not_fatal() {
        let eager = Backend::external(
            BackendDescriptor::new("eager", HEI).serving(Capability::Agreements),
            Arc::new(OverEagerProvider),
        );
        let med = backend("med", "med", &["b1"]);
        let store = mappings();
        let sync = synchronizer(vec![eager, Backend::InMemory(med)], store.clone(), 10);

        let report = sync.run_once().await.unwrap();

        // a1 and b1 are stored; the empty id and the unrequested z9 are not.
        assert_eq!(report.created, 2);
        assert_eq!(report.rejected, 2);
        assert_eq!(store.get_mapping(&hei(), "a1").unwrap(), Some(OunitId::from("law")));
        assert_eq!(store.get_mapping(&hei(), "b1").unwrap(), Some(OunitId::from("med")));
        assert_eq!(store.get_mapping(&hei(), "z9").unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_federation() {
        let sync = MappingSynchronizer::new(Arc::new(DispatchRouter::empty()), mappings(), config(5))
            .unwrap();
        assert_eq!(sync.run_once().await.unwrap(), SyncReport::default());
    }
}
