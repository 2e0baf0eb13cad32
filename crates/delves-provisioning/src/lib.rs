//! Delves Provisioning — instance world directories.
//!
//! Copies template worlds into fresh instance directories, has the host
//! load them on the authoritative thread, and tears them down again. All
//! filesystem work runs on the blocking pool; only load and unload touch the
//! authoritative thread.

mod files;
pub mod pipeline;

pub use pipeline::{PipelineSettings, ProvisioningPipeline};
