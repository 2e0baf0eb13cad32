//! The provisioning pipeline.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use delves_core::authority::Authority;
use delves_core::error::{DecommissionError, ProvisioningError};
use delves_core::host::{WorldHandle, WorldHost, WorldSpec};
use delves_core::ids::InstanceId;
use tracing::{debug, info, warn};

use crate::files;

/// Where templates live and where instance worlds are created.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Directory holding one subdirectory per template world.
    pub template_root: PathBuf,
    /// Directory instance worlds are copied into.
    pub world_container: PathBuf,
    /// Prefix marking a world as an instance world.
    pub world_prefix: String,
}

/// Creates and destroys instance worlds.
pub struct ProvisioningPipeline {
    host: Arc<dyn WorldHost>,
    authority: Authority,
    settings: PipelineSettings,
    in_flight: Mutex<HashSet<InstanceId>>,
}

impl std::fmt::Debug for ProvisioningPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Holds an instance id in the in-flight set until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<InstanceId>>,
    id: InstanceId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a Mutex<HashSet<InstanceId>>, id: InstanceId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
        inserted.then_some(Self { set, id })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl ProvisioningPipeline {
    /// Creates a pipeline issuing world operations to `host` through
    /// `authority`.
    #[must_use]
    pub fn new(host: Arc<dyn WorldHost>, authority: Authority, settings: PipelineSettings) -> Self {
        Self {
            host,
            authority,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Name of the world backing instance `id`.
    #[must_use]
    pub fn world_name(&self, id: InstanceId) -> String {
        format!("{}{id}", self.settings.world_prefix)
    }

    /// Directory of the world backing instance `id`.
    #[must_use]
    pub fn world_dir(&self, id: InstanceId) -> PathBuf {
        self.settings.world_container.join(self.world_name(id))
    }

    /// Returns `true` if `world` carries the instance prefix.
    #[must_use]
    pub fn is_instance_world(&self, world: &str) -> bool {
        world.starts_with(&self.settings.world_prefix)
    }

    /// Returns the configured settings.
    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Copies `template` into the directory for `id` and loads it as a live
    /// world with auto-save disabled.
    ///
    /// # Errors
    ///
    /// - `AlreadyProvisioning` if a run for `id` is still in flight.
    /// - `TemplateMissing` if no template directory exists.
    /// - `CopyFailed` if the copy fails; the partial directory is kept.
    /// - `WorldLoadFailed` if the host refuses the world or the
    ///   authoritative thread has stopped.
    pub async fn provision(
        &self,
        template: &str,
        id: InstanceId,
    ) -> Result<WorldHandle, ProvisioningError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight, id) else {
            return Err(ProvisioningError::AlreadyProvisioning(id));
        };

        let source = self.template_path(template)?;
        let world = self.world_name(id);
        let destination = self.settings.world_container.join(&world);

        let copy_source = source.clone();
        let copy_destination = destination.clone();
        let copied = tokio::task::spawn_blocking(move || {
            if !copy_source.is_dir() {
                return Ok(None);
            }
            files::copy_tree(&copy_source, &copy_destination).map(Some)
        })
        .await
        .map_err(io::Error::other)
        .and_then(|result| result)
        .map_err(|source| ProvisioningError::CopyFailed {
            template: template.to_owned(),
            destination: destination.clone(),
            source,
        })?;

        let Some(files) = copied else {
            return Err(ProvisioningError::TemplateMissing {
                template: template.to_owned(),
                path: source,
            });
        };
        debug!(instance_id = %id, template, files, "copied template world");

        let host = Arc::clone(&self.host);
        let name = world.clone();
        let handle = self
            .authority
            .run(move |tick| {
                host.load_world(
                    tick,
                    &WorldSpec {
                        name: &name,
                        directory: &destination,
                        auto_save: false,
                    },
                )
            })
            .await
            .map_err(|e| ProvisioningError::WorldLoadFailed {
                world: world.clone(),
                reason: e.to_string(),
            })?
            .map_err(|e| ProvisioningError::WorldLoadFailed {
                world: world.clone(),
                reason: e.to_string(),
            })?;

        info!(instance_id = %id, template, world = %handle.name(), "provisioned instance world");
        Ok(handle)
    }

    /// Unloads the world for `id` if it is loaded, then deletes its
    /// directory. Succeeds when neither exists.
    ///
    /// # Errors
    ///
    /// - `UnloadBlocked` if the host refuses to unload or the authoritative
    ///   thread has stopped. The directory is left untouched.
    /// - `DeleteFailed` if the directory cannot be removed. Retryable.
    pub async fn decommission(&self, id: InstanceId) -> Result<(), DecommissionError> {
        let world = self.world_name(id);

        let host = Arc::clone(&self.host);
        let name = world.clone();
        let unloaded = self
            .authority
            .run(move |tick| match host.loaded_world(tick, &name) {
                Some(_) => host.unload_world(tick, &name).map(|()| true),
                None => Ok(false),
            })
            .await
            .map_err(|e| DecommissionError::UnloadBlocked {
                world: world.clone(),
                reason: e.to_string(),
            })?
            .map_err(|e| DecommissionError::UnloadBlocked {
                world: world.clone(),
                reason: e.to_string(),
            })?;

        let path = self.settings.world_container.join(&world);
        let target = path.clone();
        tokio::task::spawn_blocking(move || files::remove_tree(&target))
            .await
            .map_err(io::Error::other)
            .and_then(|result| result)
            .map_err(|source| DecommissionError::DeleteFailed {
                path: path.clone(),
                source,
            })?;

        info!(instance_id = %id, world = %world, unloaded, "decommissioned instance world");
        Ok(())
    }

    /// Deletes every instance-prefixed directory in the world container
    /// that the host does not currently have loaded. Returns the removed
    /// paths. Failures on individual directories are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the container cannot be listed or the
    /// authoritative thread has stopped.
    pub async fn sweep_orphans(&self) -> io::Result<Vec<PathBuf>> {
        let container = self.settings.world_container.clone();
        let prefix = self.settings.world_prefix.clone();
        let candidates = tokio::task::spawn_blocking(move || list_prefixed(&container, &prefix))
            .await
            .map_err(io::Error::other)??;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let host = Arc::clone(&self.host);
        let orphans: Vec<String> = self
            .authority
            .run(move |tick| {
                candidates
                    .into_iter()
                    .filter(|name| host.loaded_world(tick, name).is_none())
                    .collect()
            })
            .await
            .map_err(io::Error::other)?;

        let container = self.settings.world_container.clone();
        let removed = tokio::task::spawn_blocking(move || {
            let mut removed = Vec::new();
            for name in orphans {
                let path = container.join(&name);
                match files::remove_tree(&path) {
                    Ok(()) => removed.push(path),
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to remove orphaned instance world"),
                }
            }
            removed
        })
        .await
        .map_err(io::Error::other)?;

        if !removed.is_empty() {
            info!(count = removed.len(), "removed orphaned instance worlds");
        }
        Ok(removed)
    }

    fn template_path(&self, template: &str) -> Result<PathBuf, ProvisioningError> {
        let path = self.settings.template_root.join(template);
        let is_plain_name = !template.is_empty()
            && Path::new(template).components().count() == 1
            && !template.contains(['/', '\\'])
            && template != ".."
            && template != ".";
        if is_plain_name {
            Ok(path)
        } else {
            Err(ProvisioningError::TemplateMissing {
                template: template.to_owned(),
                path,
            })
        }
    }
}

fn list_prefixed(container: &Path, prefix: &str) -> io::Result<Vec<String>> {
    let entries = match std::fs::read_dir(container) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) {
            names.push(name);
        }
    }
    Ok(names)
}
