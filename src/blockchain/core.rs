// core.rs splits ledger responsibilities into submodules: chain structure and
// append path in `chain`, integrity checks in `validation`.
pub mod chain;
pub mod validation;

pub use chain::*;
pub use validation::*;
