pub mod bucket;
pub mod client;
pub mod error;
mod local;
mod models;
mod path;

pub use crate::bucket::{BucketName, Format};
pub use crate::client::{ClientFactory, ProbeClient};
pub use crate::local::LocalTree;
pub use crate::models::{Grant, Grantee, ObjectDescriptor};
pub use crate::path::validate as validate_key;

pub type ClientHandle = Box<dyn ProbeClient + Send>;
