pub mod http_server;
pub mod keyval;
pub mod queue;
