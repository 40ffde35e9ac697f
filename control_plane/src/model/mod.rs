pub mod gateway;
pub mod hostname;
pub mod identity;
pub mod route;
pub mod status;
