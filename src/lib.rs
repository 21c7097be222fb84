//! trpg-vault — snapshot/restore engine for the runtime tree of a tabletop-RPG session.

// Базовые модули
pub mod config;
pub mod error;
pub mod util; // src/util/{mod,glob}.rs

// Движок: нормализация -> сбор области -> манифест -> хранилище/индекс -> восстановление
pub mod ident;
pub mod scope;
pub mod manifest;
pub mod index;
pub mod lock;
pub mod store;
pub mod archive;
pub mod restore;

// CLI (clap), используется бинарником trpg-vault и тестами
pub mod cli;

// Удобные реэкспорты
pub use archive::{archive, ArchiveReport, ArchiveRequest};
pub use config::{VaultBuilder, VaultConfig};
pub use error::VaultError;
pub use index::{ArchiveIndex, IndexEntry};
pub use manifest::{FileRecord, Manifest, TransferMode};
pub use restore::{restore, RestoreReport, RestoreRequest};
pub use scope::{resolve as resolve_scope, RuntimeFile, Scope};
pub use store::{ArchiveStore, StoredSnapshot};
