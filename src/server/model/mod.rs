pub(crate) mod config;
pub(crate) mod menu;
pub(crate) mod order;
pub(crate) mod settlement;
pub(crate) mod table;
pub(crate) mod user;
