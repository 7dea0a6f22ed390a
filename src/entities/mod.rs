// Entity models for the reference registries.
//
// The original data model was a deep inheritance tree; here each kind is a
// plain struct and `Counterparty` is the tagged union resolution sites match
// on exhaustively.

pub mod account;
pub mod category;
pub mod counterparty;
pub mod location;

pub use account::{AccountKind, AccountMeta};
pub use category::{Category, MainCategory, INTERNAL_TRANSFER_CATEGORY};
pub use counterparty::{
    new_entity_id, BankParty, Company, Counterparty, CounterpartyKind, EntityId, PaymentProcessor,
    Person,
};
pub use location::{Country, Location};
