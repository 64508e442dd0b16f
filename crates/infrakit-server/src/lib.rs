pub mod bootstrap;
pub mod config;
pub mod features;

pub use bootstrap::{single, Bootstrap, Built, Controller, Services};
pub use config::Config;
pub use features::diagnostics::controller::TestCtrl;
pub use features::keyval::controller::KeyValCtrl;
pub use features::queue::controller::QueueCtrl;
