use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(
    name = "reword",
    version,
    about = "Rewrite selected text in place via a global hotkey"
)]
pub struct Cli {
    /// API key for the rewrite service (falls back to OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Model identifier passed to the rewrite service
    #[arg(long)]
    pub model: Option<String>,

    /// Hotkey chord that triggers a rewrite, e.g. "ctrl+f13"
    #[arg(long)]
    pub hotkey: Option<String>,

    /// Instruction prompt sent ahead of the captured text
    #[arg(long)]
    pub prompt: Option<String>,

    /// Chat-completions endpoint (any OpenAI-compatible service)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Capture attempts before giving up on an empty selection
    #[arg(long)]
    pub attempts: Option<u32>,

    /// Base settle delay in milliseconds between simulated chords
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Path to a JSON config file providing defaults for the flags above
    #[arg(long)]
    pub config: Option<PathBuf>,
}
