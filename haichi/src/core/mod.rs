mod apply;
mod config;
mod display;
mod mapping;
mod reconcile;
mod signature;
mod snapshot;

pub use apply::*;
pub use config::*;
pub use display::*;
pub use mapping::*;
pub use reconcile::*;
pub use signature::*;
pub use snapshot::*;
