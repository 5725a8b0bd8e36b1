//! The load procedure descriptor and argument parsing.

use std::path::PathBuf;

use heifload_core::{LoaderConfig, RunMode};
use thiserror::Error;

/// Name the load procedure is installed under.
pub const LOAD_PROC: &str = "file-heif-load";

/// Types a procedure parameter or return value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// A 32-bit integer.
    Int32,
    /// A string.
    String,
    /// A host image ID.
    Image,
}

/// One entry of a procedure's parameter or return value schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDef {
    /// Value type.
    pub kind: ParamType,
    /// Parameter name.
    pub name: &'static str,
    /// One-line description shown by the host.
    pub description: &'static str,
}

/// Arguments of the load procedure, in call order.
pub const LOAD_ARGS: [ParamDef; 3] = [
    ParamDef {
        kind: ParamType::Int32,
        name: "run-mode",
        description: "The run mode { RUN-INTERACTIVE (0), RUN-NONINTERACTIVE (1) }",
    },
    ParamDef {
        kind: ParamType::String,
        name: "filename",
        description: "The name of the file to load",
    },
    ParamDef {
        kind: ParamType::String,
        name: "raw-filename",
        description: "The name entered",
    },
];

/// Values returned after the status on success.
pub const LOAD_RETURN_VALS: [ParamDef; 1] = [ParamDef {
    kind: ParamType::Image,
    name: "image",
    description: "Output image",
}];

/// Everything the host needs to install the load procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureInfo {
    /// Procedure name.
    pub name: &'static str,
    /// Short description.
    pub blurb: &'static str,
    /// Longer help text.
    pub help: &'static str,
    /// Label in the file-type menu.
    pub menu_label: &'static str,
    /// Argument schema.
    pub args: &'static [ParamDef],
    /// Return value schema, after the status.
    pub return_vals: &'static [ParamDef],
    /// Comma-separated file suffixes the load handler is registered for.
    pub extensions: String,
}

/// The host's procedure database.
pub trait Registry {
    /// Register the procedure and its schema.
    fn install_procedure(&mut self, info: &ProcedureInfo);
    /// Route files with the given suffixes to `procedure`.
    fn register_load_handler(&mut self, procedure: &str, extensions: &str, prefixes: &str);
}

/// Describe the load procedure with the configured suffixes.
pub fn load_procedure(config: &LoaderConfig) -> ProcedureInfo {
    ProcedureInfo {
        name: LOAD_PROC,
        blurb: "Load HEIF images.",
        help: "Load image stored in HEIF format (High Efficiency Image File Format). \
               Typical suffixes for HEIF files are .heif, .heic.",
        menu_label: "Load HEIF image",
        args: &LOAD_ARGS,
        return_vals: &LOAD_RETURN_VALS,
        extensions: config.extension_list(),
    }
}

/// Install the load procedure and register it as a load handler.
pub fn query<R: Registry + ?Sized>(registry: &mut R, config: &LoaderConfig) {
    let info = load_procedure(config);
    registry.install_procedure(&info);
    registry.register_load_handler(info.name, &info.extensions, "");
    tracing::debug!(procedure = info.name, extensions = %info.extensions, "Registered load handler");
}

/// A single argument value passed by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// A 32-bit integer argument.
    Int32(i32),
    /// A string argument.
    String(String),
}

impl Param {
    fn kind(&self) -> ParamType {
        match self {
            Param::Int32(_) => ParamType::Int32,
            Param::String(_) => ParamType::String,
        }
    }
}

/// Reasons a call is rejected before anything is loaded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    /// The call names a procedure this plugin does not install.
    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    /// Wrong number of arguments.
    #[error("Expected {expected} arguments, got {actual}")]
    ArgumentCount {
        /// Arguments the procedure takes.
        expected: usize,
        /// Arguments passed.
        actual: usize,
    },

    /// An argument has the wrong type.
    #[error("Argument {name} must be {expected:?}")]
    ArgumentType {
        /// Name of the offending argument.
        name: &'static str,
        /// The type it should have.
        expected: ParamType,
    },
}

/// A validated call of the load procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Unknown numeric modes arrive here as [`RunMode::NonInteractive`].
    pub run_mode: RunMode,
    /// Path of the file to load.
    pub filename: PathBuf,
    /// The name as the user typed it.
    pub raw_filename: String,
}

impl LoadRequest {
    /// Check the argument count and types against [`LOAD_ARGS`].
    pub fn parse(params: &[Param]) -> Result<Self, CallError> {
        if params.len() != LOAD_ARGS.len() {
            return Err(CallError::ArgumentCount {
                expected: LOAD_ARGS.len(),
                actual: params.len(),
            });
        }
        if let Some((def, _)) = LOAD_ARGS
            .iter()
            .zip(params)
            .find(|(def, param)| def.kind != param.kind())
        {
            return Err(CallError::ArgumentType {
                name: def.name,
                expected: def.kind,
            });
        }

        match params {
            [Param::Int32(mode), Param::String(filename), Param::String(raw)] => Ok(Self {
                run_mode: RunMode::from_raw(*mode),
                filename: PathBuf::from(filename),
                raw_filename: raw.clone(),
            }),
            _ => Err(CallError::ArgumentCount {
                expected: LOAD_ARGS.len(),
                actual: params.len(),
            }),
        }
    }
}
