// build.rs - TOML-driven compile-time limit generation
use std::env;
use std::fs;
use std::path::Path;

#[derive(serde::Deserialize)]
struct CompileTimeConfig {
    file_processing: FileProcessingLimits,
    decoders: DecoderLimits,
    batch_processing: BatchProcessingLimits,
    logging: LoggingLimits,
}

#[derive(serde::Deserialize)]
struct FileProcessingLimits {
    max_file_size: u64,
    large_file_threshold: u64,
}

#[derive(serde::Deserialize)]
struct DecoderLimits {
    max_pol_records: usize,
    max_aas_records: usize,
    max_aas_args_per_record: usize,
    max_xml_depth: usize,
    max_inf_lines: usize,
}

#[derive(serde::Deserialize)]
struct BatchProcessingLimits {
    max_worker_threads: usize,
    max_gpos_per_batch: usize,
}

#[derive(serde::Deserialize)]
struct LoggingLimits {
    max_log_events_per_file: usize,
    max_log_message_length: usize,
    max_error_collection: usize,
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GPO_BUILD_PROFILE");
    println!("cargo:rerun-if-env-changed=GPO_CONFIG_DIR");

    let profile = env::var("GPO_BUILD_PROFILE").unwrap_or_else(|_| "development".to_string());
    let config_dir = env::var("GPO_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

    // Workspace root is the parent of gpo_decoders
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let workspace_root = Path::new(&manifest_dir)
        .parent()
        .expect("Could not find workspace root (parent directory)");

    let config_path = workspace_root
        .join(&config_dir)
        .join(format!("{}.toml", profile));

    println!("cargo:rerun-if-changed={}", config_path.display());

    if !config_path.exists() {
        panic!(
            "Configuration file not found: {}\nLooking for: {}/{}/{}.toml",
            config_path.display(),
            workspace_root.display(),
            config_dir,
            profile
        );
    }

    let config_content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", config_path.display(), e));

    let config: CompileTimeConfig = toml::from_str(&config_content)
        .unwrap_or_else(|e| panic!("Invalid TOML in {}: {}", config_path.display(), e));

    validate_limits(&config, &profile);
    generate_constants(&config, &profile);
}

fn validate_limits(config: &CompileTimeConfig, profile: &str) {
    const ABSOLUTE_MAX_FILE_SIZE: u64 = 1_000_000_000;
    const ABSOLUTE_MAX_THREADS: usize = 256;
    const ABSOLUTE_MAX_XML_DEPTH: usize = 512;

    if config.file_processing.max_file_size > ABSOLUTE_MAX_FILE_SIZE {
        panic!("LIMITS: max_file_size exceeds absolute maximum");
    }

    if config.file_processing.large_file_threshold > config.file_processing.max_file_size {
        panic!("LIMITS: large_file_threshold must not exceed max_file_size");
    }

    if config.batch_processing.max_worker_threads == 0
        || config.batch_processing.max_worker_threads > ABSOLUTE_MAX_THREADS
    {
        panic!("LIMITS: max_worker_threads must be between 1 and {ABSOLUTE_MAX_THREADS}");
    }

    if config.decoders.max_xml_depth == 0 || config.decoders.max_xml_depth > ABSOLUTE_MAX_XML_DEPTH
    {
        panic!("LIMITS: max_xml_depth must be between 1 and {ABSOLUTE_MAX_XML_DEPTH}");
    }

    if profile == "production" && config.file_processing.max_file_size > 50_000_000 {
        panic!("PRODUCTION: max_file_size too high for production");
    }
}

fn generate_constants(config: &CompileTimeConfig, profile: &str) {
    let out_dir = env::var("OUT_DIR").unwrap();
    let output_path = Path::new(&out_dir).join("constants.rs");

    let constants_code = format!(
        r#"
// Generated compile-time constants from TOML configuration
// Profile: {}
// DO NOT EDIT - Generated by build.rs

pub mod compile_time {{
    pub mod file_processing {{
        pub const MAX_FILE_SIZE: u64 = {};
        pub const LARGE_FILE_THRESHOLD: u64 = {};
    }}

    pub mod decoders {{
        pub const MAX_POL_RECORDS: usize = {};
        pub const MAX_AAS_RECORDS: usize = {};
        pub const MAX_AAS_ARGS_PER_RECORD: usize = {};
        pub const MAX_XML_DEPTH: usize = {};
        pub const MAX_INF_LINES: usize = {};
    }}

    pub mod batch_processing {{
        pub const MAX_WORKER_THREADS: usize = {};
        pub const MAX_GPOS_PER_BATCH: usize = {};
    }}

    pub mod logging {{
        pub const MAX_LOG_EVENTS_PER_FILE: usize = {};
        pub const MAX_LOG_MESSAGE_LENGTH: usize = {};
        pub const MAX_ERROR_COLLECTION: usize = {};
    }}
}}
"#,
        profile,
        config.file_processing.max_file_size,
        config.file_processing.large_file_threshold,
        config.decoders.max_pol_records,
        config.decoders.max_aas_records,
        config.decoders.max_aas_args_per_record,
        config.decoders.max_xml_depth,
        config.decoders.max_inf_lines,
        config.batch_processing.max_worker_threads,
        config.batch_processing.max_gpos_per_batch,
        config.logging.max_log_events_per_file,
        config.logging.max_log_message_length,
        config.logging.max_error_collection,
    );

    fs::write(&output_path, constants_code)
        .unwrap_or_else(|e| panic!("Failed to write {}: {}", output_path.display(), e));
}
