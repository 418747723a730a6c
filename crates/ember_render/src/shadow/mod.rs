//! Shadow mapping: atlas allocation, shadow sources, configuration

pub mod atlas;
pub mod config;
pub mod source;

pub use atlas::{AtlasStats, AtlasTile, ShadowAtlas, TileHandle};
pub use config::{OverflowPolicy, RequiredPolicy, ShadowConfig};
pub use source::ShadowSource;
