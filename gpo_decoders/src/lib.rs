//! # GPO Decoders
//!
//! Turns the raw files of a Group Policy Object (XML preferences, `Registry.pol`,
//! application advertisement scripts, INI/INF templates and the audit CSV) into
//! schema-filtered [`tree::DecodedTree`] values, and discovers GPOs inside a
//! policy store laid out as `<domain>/Policies/{GUID}`.
//!
//! ```no_run
//! use gpo_decoders::{config::schema::FileSchema, settings, store};
//!
//! let schema = FileSchema::builtin()?;
//! for domain in store::discover_store("/mnt/sysvol".as_ref(), &schema)? {
//!     for gpo in &domain.gpos {
//!         let decoded = settings::decode_gpo(gpo, &schema);
//!         println!("{} -> {} files", gpo.guid, decoded.decoded_files);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod formats;
pub mod logging;
pub mod reg_types;
pub mod search;
pub mod settings;
pub mod store;
pub mod text;
pub mod tree;

pub use error::DecodeError;
pub use reg_types::RegistryType;
pub use settings::{DecodeOutcome, GpoSettings};
pub use store::{PolicyFile, PolicyScope};
pub use tree::{DecodedTree, Node, Tree};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
