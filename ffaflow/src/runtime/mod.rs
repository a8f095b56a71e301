//! Run configuration and on-disk layout.

pub mod constants;
pub mod layout;
pub mod options;

pub use layout::{FilesystemLayout, ObservationLayout, ScanLayout};
pub use options::{
    Backend, CommandTemplate, LauncherKind, OutputTarget, PipelineConfig, RemoteKind,
    RunOptions, SshSettings, StagePrograms,
};
