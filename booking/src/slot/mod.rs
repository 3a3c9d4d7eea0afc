pub mod model;
pub mod settle;
pub mod store;
pub mod store_sqlx;
