use std::path::PathBuf;

use chorus_gateway::PresenceOptions;
use clap::{Args as ClapArgs, Parser, Subcommand};

/// Chorus: hold many accounts in one voice channel.
#[derive(Parser, Debug)]
#[command(name = "chorus", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error) or a full filter directive.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join every credential to a voice channel and hold it until Ctrl-C.
    Join(JoinArgs),
    /// Validate a credential file without connecting.
    Check {
        /// Credential file, one per line. `-` reads stdin.
        file: PathBuf,
    },
}

#[derive(ClapArgs, Debug)]
pub struct JoinArgs {
    /// Guild (group) id.
    #[arg(long)]
    pub guild: String,

    /// Voice channel id.
    #[arg(long)]
    pub channel: String,

    /// Announce the camera as on.
    #[arg(long)]
    pub camera: bool,

    /// Leave the microphone unmuted.
    #[arg(long)]
    pub mic: bool,

    /// Deafen every session (also mutes).
    #[arg(long)]
    pub deafen: bool,

    /// Announce a screen stream.
    #[arg(long)]
    pub stream: bool,

    /// Skip display-name lookups.
    #[arg(long)]
    pub no_lookup: bool,

    /// Credential file, one per line. `-` reads stdin.
    pub file: PathBuf,
}

impl JoinArgs {
    pub fn presence(&self) -> PresenceOptions {
        PresenceOptions {
            camera: self.camera,
            mic: self.mic,
            deafen: self.deafen,
            stream: self.stream,
        }
    }
}

pub fn parse() -> Args {
    Args::parse()
}
