pub mod bo;
pub mod po;
