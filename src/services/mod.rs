pub mod layout;
pub mod network_service;
pub mod workspace;

pub use layout::*;
pub use network_service::*;
pub use workspace::*;
