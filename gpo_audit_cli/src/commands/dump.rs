//! `dump`: decoded settings, GUID listing and search

use super::{select, CliError};
use crate::DumpArgs;
use gpo_analyzer_base::pipeline::{process_batch, BatchConfig};
use gpo_analyzer_base::{AnalyzerError, Engine};
use gpo_decoders::search::{search, SearchResults};
use gpo_decoders::settings::DecodedGpo;
use gpo_decoders::{log_info, Tree};
use indexmap::IndexMap;
use std::path::Path;

pub fn run(engine: &Engine, sysvol: &Path, args: &DumpArgs) -> Result<String, CliError> {
    let domains = select(engine.discover(sysvol)?, &args.selection);

    if args.list {
        let listing: IndexMap<String, Vec<String>> = domains
            .into_iter()
            .map(|d| (d.domain, d.gpos.into_iter().map(|g| g.guid).collect()))
            .collect();
        return Ok(serde_json::to_string_pretty(&listing)?);
    }

    if let Some(pattern) = &args.search {
        // Reject a bad pattern before any file is decoded
        search(&Tree::new(), pattern, args.show)?;
    }

    let batch_config = BatchConfig::from_analyzer(engine.config());
    let mut decoded: IndexMap<String, Vec<DecodedGpo>> = IndexMap::new();
    for domain in &domains {
        let batch = process_batch(&domain.gpos, &batch_config, |_, gpo| engine.decode(gpo))
            .map_err(AnalyzerError::from)?;
        decoded.insert(domain.domain.clone(), batch.items);
    }

    match &args.search {
        Some(pattern) => {
            let mut hits: IndexMap<String, IndexMap<String, SearchResults>> = IndexMap::new();
            for (domain, gpos) in decoded {
                let mut found = IndexMap::new();
                for gpo in gpos {
                    let results = search(&gpo.settings.to_tree(), pattern, args.show)?;
                    if !results.is_empty() {
                        found.insert(gpo.guid, results);
                    }
                }
                log_info!("Search completed", "domain" => domain, "gpos" => found.len());
                if !found.is_empty() {
                    hits.insert(domain, found);
                }
            }
            Ok(serde_json::to_string_pretty(&hits)?)
        }
        None => {
            let dump: IndexMap<String, IndexMap<String, Tree>> = decoded
                .into_iter()
                .map(|(domain, gpos)| {
                    let trees = gpos
                        .into_iter()
                        .filter(|g| !g.settings.is_empty())
                        .map(|g| (g.guid, g.settings.to_tree()))
                        .collect();
                    (domain, trees)
                })
                .collect();
            Ok(serde_json::to_string_pretty(&dump)?)
        }
    }
}
