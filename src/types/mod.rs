//! Core types: the Track / Group / Object model and configuration

pub mod config;
pub mod object;
pub mod timing;
pub mod track;


pub use config::{PlaytimeConfig, PlaytimeConfigBuilder};
pub use object::{CachedObject, Object};
pub use timing::TimingPolicy;
pub use track::{GroupId, ObjectId, ObjectKey, TrackName};
