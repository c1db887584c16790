pub mod identity;
pub mod symbol;

pub use identity::BoxIdentity;
pub use symbol::{DecodedSymbol, SymbolSource};
