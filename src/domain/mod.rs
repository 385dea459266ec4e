mod expense;
mod ledger;
mod money;
mod office;
mod petty_cash;
mod vendor;

pub use expense::*;
pub use ledger::*;
pub use money::*;
pub use office::*;
pub use petty_cash::*;
pub use vendor::*;
