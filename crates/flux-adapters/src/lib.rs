//! Concrete Home/Store variants and the factory that binds
//! configuration to them.

pub mod codec;
pub mod factory;
pub mod homes;
pub mod stores;

pub use codec::NdjsonCodec;
pub use factory::{HomeRegistry, LocalHomeSpec};
pub use homes::local::LocalHome;
pub use stores::local::LocalStore;
pub use stores::mirror::{MirrorStore, MirrorTarget};
