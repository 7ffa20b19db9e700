//! Per-GPO pipeline: decode, normalize, analyze

use super::batch::{process_batch, BatchConfig};
use super::enrich::{self, DomainEnrichment};
use crate::analysis::{self, AnalysisContext};
use crate::api::{AnalyzerConfig, AnalyzerError, ConfigError};
use crate::directory::{AccountIndex, ContainerMachineCache, DirectoryLookup};
use crate::normalize::{normalize_gpo, NormalizedGpo};
use crate::results::{DomainReport, GpoReport};
use crate::rules::RuleSet;
use gpo_decoders::config::schema::FileSchema;
use gpo_decoders::logging::codes;
use gpo_decoders::settings::{decode_gpo_with, DecodedGpo};
use gpo_decoders::store::{discover_store, DomainPolicies, GpoDirectory};
use gpo_decoders::log_success;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Canonical records of one GPO
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedGpo {
    pub guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub records: NormalizedGpo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedDomain {
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_sid: Option<String>,
    pub gpos: Vec<ProcessedGpo>,
}

/// Owns the rules, the schema and the caches of one analysis run
pub struct Engine {
    config: AnalyzerConfig,
    directory: Arc<dyn DirectoryLookup>,
    account_index: Arc<AccountIndex>,
    container_cache: ContainerMachineCache,
    rules: RuleSet,
    schema: FileSchema,
}

impl Engine {
    pub fn new(
        config: AnalyzerConfig,
        directory: Arc<dyn DirectoryLookup>,
        rules: RuleSet,
        schema: FileSchema,
    ) -> Self {
        Self {
            config,
            directory,
            account_index: Arc::new(AccountIndex::new()),
            container_cache: ContainerMachineCache::new(),
            rules,
            schema,
        }
    }

    /// Load rules and schema the configuration points at
    pub fn from_config(config: AnalyzerConfig, directory: Arc<dyn DirectoryLookup>) -> Result<Self, AnalyzerError> {
        let rules = RuleSet::from_config(&config)?;
        let schema = FileSchema::from_preferences(&config.decoder).map_err(ConfigError::from)?;
        Ok(Self::new(config, directory, rules, schema))
    }

    /// Share an account index with other engines of the same process
    pub fn with_account_index(mut self, index: Arc<AccountIndex>) -> Self {
        self.account_index = index;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn schema(&self) -> &FileSchema {
        &self.schema
    }

    pub fn directory(&self) -> &dyn DirectoryLookup {
        self.directory.as_ref()
    }

    pub fn context(&self) -> AnalysisContext<'_> {
        AnalysisContext::new(
            self.directory.as_ref(),
            &self.account_index,
            &self.container_cache,
            &self.rules,
        )
    }

    /// Forget per-run container lookups
    pub fn reset_run_caches(&self) {
        self.container_cache.clear();
    }

    pub fn discover(&self, store_root: &Path) -> Result<Vec<DomainPolicies>, AnalyzerError> {
        Ok(discover_store(store_root, &self.schema)?)
    }

    pub fn domain_sid(&self, domain: &str) -> Option<String> {
        self.directory.domain_sid_for(domain)
    }

    pub fn decode(&self, gpo: &GpoDirectory) -> DecodedGpo {
        decode_gpo_with(gpo, &self.schema, &self.config.decoder)
    }

    fn normalize(&self, decoded: &DecodedGpo, domain_sid: Option<&str>) -> NormalizedGpo {
        let normalized = normalize_gpo(
            &decoded.settings,
            self.directory.as_ref(),
            domain_sid,
            &self.config.objects,
        );
        log_success!(
            codes::success::GPO_NORMALIZED,
            "GPO normalized",
            "guid" => decoded.guid,
            "records" => normalized.record_count()
        );
        normalized
    }

    fn gpo_name(&self, guid: &str, domain_sid: Option<&str>) -> Option<String> {
        domain_sid.and_then(|sid| self.directory.gpo_name(guid, sid))
    }

    pub fn process_gpo(&self, gpo: &GpoDirectory, domain_sid: Option<&str>) -> ProcessedGpo {
        let decoded = self.decode(gpo);
        ProcessedGpo {
            guid: gpo.guid.clone(),
            name: self.gpo_name(&gpo.guid, domain_sid),
            records: self.normalize(&decoded, domain_sid),
        }
    }

    pub fn analyze_gpo(&self, gpo: &GpoDirectory, domain_sid: Option<&str>) -> GpoReport {
        let decoded = self.decode(gpo);
        let normalized = self.normalize(&decoded, domain_sid);
        let findings = analysis::analyze_gpo(
            &self.context(),
            &gpo.guid,
            domain_sid,
            &decoded.settings,
            &normalized,
            &self.config.objects,
        );
        log_success!(
            codes::success::GPO_ANALYZED,
            "GPO analyzed",
            "guid" => gpo.guid,
            "findings" => findings.len()
        );

        let mut report = GpoReport::new(gpo.guid.clone(), findings);
        report.name = self.gpo_name(&gpo.guid, domain_sid);
        if self.config.include_affected {
            if let Some(sid) = domain_sid {
                report.affected_containers = self
                    .directory
                    .containers_affected_by_gpo(&gpo.guid, sid)
                    .into_iter()
                    .map(|c| c.distinguished_name)
                    .collect();
            }
        }
        report
    }

    pub fn analyze_domain(&self, domain: &DomainPolicies) -> Result<DomainReport, AnalyzerError> {
        let domain_sid = self.domain_sid(&domain.domain);
        let sid = domain_sid.as_deref();
        let batch = process_batch(&domain.gpos, &BatchConfig::from_analyzer(&self.config), |_, gpo| {
            self.analyze_gpo(gpo, sid)
        })?;
        Ok(DomainReport::new(
            domain.domain.clone(),
            domain_sid,
            domain.gpos.len(),
            batch.items,
        ))
    }

    pub fn process_domain(&self, domain: &DomainPolicies) -> Result<ProcessedDomain, AnalyzerError> {
        let domain_sid = self.domain_sid(&domain.domain);
        let sid = domain_sid.as_deref();
        let batch = process_batch(&domain.gpos, &BatchConfig::from_analyzer(&self.config), |_, gpo| {
            self.process_gpo(gpo, sid)
        })?;
        Ok(ProcessedDomain {
            domain: domain.domain.clone(),
            domain_sid,
            gpos: batch
                .items
                .into_iter()
                .filter(|g| !g.records.is_empty())
                .collect(),
        })
    }

    pub fn analyze_store(&self, store_root: &Path) -> Result<Vec<DomainReport>, AnalyzerError> {
        self.discover(store_root)?
            .iter()
            .map(|domain| self.analyze_domain(domain))
            .collect()
    }

    pub fn enrich(&self, report: &DomainReport) -> DomainEnrichment {
        enrich::project_domain(&self.context(), report)
    }
}
