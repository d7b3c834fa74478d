pub mod deposits;
pub mod gateway;
pub mod notify;
pub mod reconcile;
pub mod settlement;
pub mod statement;
