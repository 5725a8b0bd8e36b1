//! Plugin start-up.
//!
//! [`Plugin::start`] is where the host process wires things together: it
//! installs the log subscriber, reads the loader configuration and keeps the
//! codec every later call decodes with.

use std::path::{Path, PathBuf};

use heifload_core::{Destination, HeifCodec, ItemChooser, LoaderConfig, Surface};
use tracing::{debug, warn};

use crate::logging;
use crate::procedure::{query, Param, Registry};
use crate::runner::{run, Environment, HostImage, MessageSink, RunOutput};

/// Start-up options passed by the host.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// Log at DEBUG instead of INFO.
    pub verbose: bool,
    /// Emit JSON log lines.
    pub json_logs: bool,
    /// Loader configuration file. Defaults are used when absent.
    pub config_path: Option<PathBuf>,
}

/// A started plugin: one codec and one configuration shared by all calls.
pub struct Plugin<C> {
    codec: C,
    config: LoaderConfig,
}

impl<C: HeifCodec> Plugin<C> {
    /// Initialize logging, load the configuration and keep `codec`.
    pub fn start(codec: C, options: &StartupOptions) -> Self {
        logging::init(options.verbose, options.json_logs);
        let config = load_config(options.config_path.as_deref());
        debug!(?config, "Plugin started");
        Self { codec, config }
    }

    /// The configuration every call runs with.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Install the load procedure with the host.
    pub fn query<R: Registry + ?Sized>(&self, registry: &mut R) {
        query(registry, &self.config);
    }

    /// Handle one procedure call against the host's collaborators.
    pub fn call<D, K, M>(
        &self,
        name: &str,
        params: &[Param],
        destination: &mut D,
        chooser: &mut K,
        messages: &mut M,
    ) -> RunOutput<<D::Surface as Surface>::Image>
    where
        D: Destination,
        <D::Surface as Surface>::Image: HostImage,
        K: ItemChooser + ?Sized,
        M: MessageSink + ?Sized,
    {
        run(
            name,
            params,
            Environment {
                codec: &self.codec,
                destination,
                chooser,
                messages,
                config: &self.config,
            },
        )
    }
}

#[cfg(feature = "libheif")]
impl Plugin<heifload_core::codec::libheif::LibHeifCodec> {
    /// Start with the libheif codec.
    pub fn with_libheif(options: &StartupOptions) -> Self {
        Self::start(heifload_core::codec::libheif::LibHeifCodec::new(), options)
    }
}

/// Read the configuration file, falling back to defaults when it is missing
/// or invalid.
pub fn load_config(path: Option<&Path>) -> LoaderConfig {
    let Some(path) = path else {
        return LoaderConfig::default();
    };
    match LoaderConfig::load_from(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Using default configuration");
            LoaderConfig::default()
        }
    }
}
