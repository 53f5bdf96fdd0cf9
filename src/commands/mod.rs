//! CLI commands implementation

pub mod init;
pub mod settings;
pub mod sources;
pub mod status;
pub mod watch;

pub use init::*;
pub use settings::*;
pub use sources::*;
pub use status::*;
pub use watch::*;
