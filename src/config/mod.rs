//! Server configuration.
//!
//! Built once at startup and passed to the components that need it.
//! Sources, lowest to highest priority:
//! 1. **Defaults** - compiled in
//! 2. **File** - YAML, from `--config`, `NEXUSTODO_CONFIG_PATH`, or `./nexustodo.yaml`
//! 3. **Environment** - `DATABASE_PATH`, `HOST`, `PORT`, `DEFAULT_TOKEN`
//! 4. **CLI flags** - applied by the binary

mod loader;
mod types;

pub use loader::{CONFIG_PATH_ENV, ConfigLoader, DEFAULT_CONFIG_FILE};
pub use types::*;
