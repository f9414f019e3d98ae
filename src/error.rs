use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(syncop::config::validation),
        help("Run `syncop validate` for detailed validation errors")
    )]
    Validation(String),

    #[error("Unsupported overwrite protocol '{0}'")]
    #[diagnostic(
        code(syncop::config::protocol),
        help("Set `overwrite_protocol` to either \"http\" or \"https\" in syncop.yaml")
    )]
    UnsupportedProtocol(String),

    #[error("Source fetch failed: {0}")]
    #[diagnostic(
        code(syncop::workload::fetch),
        help("Check that `source_tarball` points at a reachable archive and that the unit has network access")
    )]
    FetchFailed(String),

    #[error("Application install failed: {0}")]
    #[diagnostic(
        code(syncop::facade::install),
        help("A half-installed application cannot be retried automatically. Inspect the workload logs, then redeploy the unit")
    )]
    InstallFailed(String),

    #[error("Facade command failed: {0}")]
    #[diagnostic(
        code(syncop::facade::command),
        help("Check that the application CLI is present under the application root and runnable as the configured system user")
    )]
    Facade(String),

    #[error("Workload operation failed: {0}")]
    Workload(String),

    #[error("Relation error: {0}")]
    #[diagnostic(
        code(syncop::relation::error),
        help("Verify the relation exists with `relation-ids cluster` and that hook tools are on PATH")
    )]
    Relation(String),

    #[error("Rendered config artifact missing at {0}")]
    #[diagnostic(
        code(syncop::cluster::missing_artifact),
        help("The artifact must exist once the application is initialized. This indicates a bug, not a recoverable condition")
    )]
    MissingArtifact(PathBuf),

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Internal invariant violated: {0}")]
    #[diagnostic(code(syncop::internal))]
    Internal(String),

    #[error("Unknown hook event: {0}")]
    #[diagnostic(
        code(syncop::event::unknown),
        help("See `syncop hook --help` for the recognized event names")
    )]
    UnknownEvent(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::UnsupportedProtocol(p) => Some(format!(
                "'{}' is not a supported protocol. Use \"http\" or \"https\".",
                p
            )),
            Error::Config(_) | Error::Validation(_) => {
                Some("Validate your config with: syncop validate".to_string())
            }
            Error::FetchFailed(_) => {
                Some("Verify the `source_tarball` URL and retry the install hook.".to_string())
            }
            Error::InstallFailed(_) => Some(
                "The one-shot application install failed. There is no automatic recovery; \
                 remove and re-add the unit after fixing the cause."
                    .to_string(),
            ),
            Error::Relation(msg) if msg.contains("no relation") => Some(
                "The cluster peer relation is not established yet. The event will be \
                 redelivered once it is."
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
