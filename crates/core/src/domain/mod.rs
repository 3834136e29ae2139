pub mod billing;
pub mod business;
pub mod customer;
pub mod draft;
pub mod inventory;
