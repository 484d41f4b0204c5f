pub mod app_state;
pub mod error;
pub mod features;
pub mod io_struct;
pub mod model;
pub mod server;
