//! `analysis`: findings, canonical records or enrichment data

use super::{select, CliError};
use crate::AnalysisArgs;
use gpo_analyzer_base::pipeline::{DomainEnrichment, ProcessedDomain};
use gpo_analyzer_base::results::DomainReport;
use gpo_analyzer_base::Engine;
use gpo_decoders::logging::codes;
use gpo_decoders::{log_success, log_warning};
use std::path::Path;

pub fn run(engine: &Engine, sysvol: &Path, args: &AnalysisArgs) -> Result<String, CliError> {
    let domains = select(engine.discover(sysvol)?, &args.selection);

    for domain in &domains {
        if engine.domain_sid(&domain.domain).is_none() {
            log_warning!(
                "Domain unknown to the directory; group hijack checks and enrichment are skipped",
                "domain" => domain.domain
            );
        }
    }

    if args.processed {
        let processed = domains
            .iter()
            .map(|d| engine.process_domain(d))
            .collect::<Result<Vec<ProcessedDomain>, _>>()?;
        return Ok(serde_json::to_string_pretty(&processed)?);
    }

    let reports = domains
        .iter()
        .map(|d| engine.analyze_domain(d))
        .collect::<Result<Vec<DomainReport>, _>>()?;
    for report in &reports {
        log_success!(
            codes::success::GPO_ANALYZED,
            "Domain analyzed",
            "domain" => report.domain,
            "gpos" => report.gpo_count,
            "with_findings" => report.gpos.len()
        );
    }

    if args.enrich {
        let enrichment: Vec<DomainEnrichment> = reports.iter().map(|r| engine.enrich(r)).collect();
        return Ok(serde_json::to_string_pretty(&enrichment)?);
    }
    Ok(serde_json::to_string_pretty(&reports)?)
}
