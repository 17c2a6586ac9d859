pub mod balance;
pub mod operation;
pub mod token;

pub use balance::{AccountBalances, TokenBalance};
pub use operation::{AvailableActions, Operation, OperationStatus, OperationView, Role};
pub use token::{TokenInfo, UNKNOWN_NAME, UNKNOWN_SYMBOL};
