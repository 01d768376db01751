pub mod context;
pub mod intent;
pub mod provider;
pub mod response;
