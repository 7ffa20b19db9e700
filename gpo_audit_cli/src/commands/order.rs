//! `order`: GPO precedence for one container

use super::CliError;
use crate::OrderArgs;
use gpo_analyzer_base::Engine;
use gpo_decoders::log_info;

pub fn run(engine: &Engine, args: &OrderArgs) -> Result<String, CliError> {
    let domain_sid = engine
        .domain_sid(&args.domain)
        .ok_or_else(|| CliError::Usage(format!("domain '{}' is not in the directory data", args.domain)))?;

    let order = engine.directory().gpo_order(&args.container, &domain_sid);
    log_info!("GPO order resolved", "container" => args.container, "gpos" => order.len());
    Ok(serde_json::to_string_pretty(&order)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpo_analyzer_base::api::AnalyzerConfig;
    use gpo_analyzer_base::directory::StaticDirectory;
    use std::sync::Arc;

    const DIRECTORY_JSON: &str = r#"{
      "domains": [{
        "name": "corp.local",
        "sid": "S-1-5-21-1000-2000-3000",
        "gpos": [
          {"guid": "{31B2F340-016D-11D2-945F-00C04FB984F9}", "name": "Default Domain Policy"},
          {"guid": "{A1B2C3D4-0000-4000-8000-000000000001}", "name": "Workstation Admins"}
        ],
        "containers": [
          {"dn": "DC=corp,DC=local",
           "links": [{"gpo": "{31B2F340-016D-11D2-945F-00C04FB984F9}", "order": 1}]},
          {"dn": "OU=Workstations,DC=corp,DC=local", "machines": ["WS01"],
           "links": [{"gpo": "{A1B2C3D4-0000-4000-8000-000000000001}", "order": 1}]}
        ]
      }]
    }"#;

    fn engine() -> Engine {
        let directory = StaticDirectory::from_json_str(DIRECTORY_JSON).unwrap();
        Engine::from_config(AnalyzerConfig::default(), Arc::new(directory)).unwrap()
    }

    #[test]
    fn test_closest_link_first() {
        let args = OrderArgs {
            container: "OU=Workstations,DC=corp,DC=local".to_string(),
            domain: "corp.local".to_string(),
        };
        let output = run(&engine(), &args).unwrap();
        let order: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(order[0]["name"], "Workstation Admins");
        assert_eq!(order[0]["distance"], 0);
        assert_eq!(order[1]["name"], "Default Domain Policy");
        assert_eq!(order[1]["linked_to"], "DC=corp,DC=local");
    }

    #[test]
    fn test_unknown_domain() {
        let args = OrderArgs {
            container: "DC=lab,DC=local".to_string(),
            domain: "lab.local".to_string(),
        };
        assert!(matches!(run(&engine(), &args), Err(CliError::Usage(_))));
    }
}
