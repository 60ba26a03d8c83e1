use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use shell_protocol::ApprovalMode;

#[derive(Parser, Debug)]
#[command(
    name = "desk-shell",
    about = "Line-oriented shell for an AI coding assistant with human-approved tool calls",
    version
)]
pub struct Args {
    /// Project directory the agent works in (defaults to the current directory)
    #[arg(value_name = "TARGET_DIR")]
    pub target_dir: Option<PathBuf>,

    /// Tool approval policy for the session
    #[arg(value_enum, ignore_case = true, env = "DESK_SHELL_APPROVAL_MODE")]
    pub approval_mode: Option<ApprovalArg>,

    /// Model id for the session (overrides DESK_SHELL_DEFAULT_MODEL)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Run the agent host in a child process and talk to it over its stdio
    #[arg(long)]
    pub isolated: bool,

    /// Serve the agent host as JSON lines on stdin/stdout
    #[arg(long, hide = true, conflicts_with_all = ["target_dir", "model", "isolated"])]
    pub host: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ApprovalArg {
    Default,
    #[value(alias = "autoEdit")]
    AutoEdit,
    Yolo,
}

impl From<ApprovalArg> for ApprovalMode {
    fn from(arg: ApprovalArg) -> Self {
        match arg {
            ApprovalArg::Default => Self::Default,
            ApprovalArg::AutoEdit => Self::AutoEdit,
            ApprovalArg::Yolo => Self::Yolo,
        }
    }
}
