//! CLI command definitions.

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command with secrets injected from Vault
    ///
    /// Secrets are written to a temporary directory that is removed when the
    /// command exits. Env-format buckets are also exported into the command's
    /// environment, and SECRET_PATH points at the output directory.
    Dev {
        /// Replace secret values in the command's output with [REDACTED]
        #[arg(long)]
        redact: bool,

        /// Command to run through `bash -c`
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}
