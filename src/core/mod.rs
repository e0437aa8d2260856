//! Ledger data structures and the ledger itself.
//!
//! - `payload`: typed record bodies, one per transaction kind
//! - `transaction`: immutable records stamped with id, time and status
//! - `block`: sealed, mined containers of transactions
//! - `blockchain`: the validated, persisted chain of blocks
//! - `ledger`: the facade collaborators use

pub mod block;
pub mod blockchain;
pub mod ledger;
pub mod payload;
pub mod transaction;
