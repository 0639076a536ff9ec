pub mod codec;
pub mod index;
pub mod record;
pub mod store;
pub mod transaction;

pub use index::IndexDef;
pub use record::Record;
pub use store::{Connection, Store, UpgradeContext};
pub use transaction::{CollectionTx, Transaction, TxMode};
