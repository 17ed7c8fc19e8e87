pub mod autosave;
pub mod error;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod vault;

pub use error::StoreError;
pub use snapshot::{PersistedState, STATE_NAMESPACE, STATE_VERSION};
pub use store::ChatStore;
pub use vault::StateVault;
