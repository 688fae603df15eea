use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rhythmc_core::identifier::IdentifierSchema;

#[derive(Parser, Debug)]
#[command(name = "rhythmc-pack", version, about = "Build RhythMC resource packs from an audio file")]
pub struct Cli {
    /// Config file (created with defaults when missing)
    #[arg(long, global = true, env = "RHYTHMC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write every progress update and tool line
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the full pack and charter packs, upload them and print the identifier
    Build(BuildArgs),

    /// Check an access key against the backend
    Verify {
        #[arg(long, env = "RHYTHMC_ACCESS_KEY", hide_env_values = true)]
        access_key: String,
    },

    /// Print the fields of an identifier
    Decode {
        identifier: String,
        /// Schema the identifier was built with (defaults to the configured one)
        #[arg(long)]
        schema: Option<IdentifierSchema>,
    },

    /// Inspect or change the config file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Source audio; anything other than .ogg is converted first
    pub audio: PathBuf,

    #[arg(long)]
    pub song: String,

    #[arg(long)]
    pub composer: String,

    /// Image stored as pack.png in every pack
    #[arg(long)]
    pub thumbnail: Option<PathBuf>,

    #[arg(long, env = "RHYTHMC_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Stop after archiving; no identifier is produced
    #[arg(long)]
    pub no_upload: bool,

    /// Also write the archives to DIR (the configured output folder when omitted)
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    pub save_archives: Option<Option<PathBuf>>,

    /// Leave the job's work directory in place
    #[arg(long)]
    pub keep_work_dir: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective settings
    Show,
    /// Set the upload backend base URL
    SetBackend { url: String },
    /// Set the identifier schema
    SetSchema { schema: IdentifierSchema },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn build_parses_flags() {
        let cli = Cli::try_parse_from([
            "rhythmc-pack",
            "build",
            "song.mp3",
            "--song",
            "Test",
            "--composer",
            "Case",
            "--no-upload",
            "--save-archives",
            "out",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.audio, PathBuf::from("song.mp3"));
        assert_eq!(args.song, "Test");
        assert!(args.no_upload);
        assert_eq!(args.save_archives, Some(Some(PathBuf::from("out"))));
    }

    #[test]
    fn save_archives_value_is_optional() {
        let cli = Cli::try_parse_from([
            "rhythmc-pack",
            "build",
            "song.ogg",
            "--song",
            "Test",
            "--composer",
            "Case",
            "--save-archives",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.save_archives, Some(None));
    }

    #[test]
    fn schema_is_parsed() {
        let cli =
            Cli::try_parse_from(["rhythmc-pack", "config", "set-schema", "song-composer"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::SetSchema {
                schema: IdentifierSchema::SongComposer
            })
        ));
        assert!(Cli::try_parse_from(["rhythmc-pack", "config", "set-schema", "other"]).is_err());
    }
}
