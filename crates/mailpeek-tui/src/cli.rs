use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "mailpeek", version, about = "Browse and search your IMAP inbox")]
pub(crate) struct Cli {
    /// Newest messages to load (overrides [fetch] limit).
    #[arg(short = 'n', long = "limit")]
    pub(crate) limit: Option<u32>,
    /// Field the search box matches: all, sender, subject or body.
    #[arg(long = "field")]
    pub(crate) field: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Write a config template to the user config directory.
    Init(InitCmd),
}

#[derive(Args, Debug)]
pub(crate) struct InitCmd {
    /// Replace an existing config file.
    #[arg(long)]
    pub(crate) force: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, CliCommand};

    #[test]
    fn browse_flags_parse() {
        let cli = Cli::try_parse_from(["mailpeek", "--limit", "10", "--field", "subject"]).unwrap();
        assert_eq!(cli.limit, Some(10));
        assert_eq!(cli.field.as_deref(), Some("subject"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn init_subcommand_parses() {
        let cli = Cli::try_parse_from(["mailpeek", "init", "--force"]).unwrap();
        let Some(CliCommand::Init(cmd)) = cli.command else {
            panic!("expected init");
        };
        assert!(cmd.force);
        assert!(Cli::try_parse_from(["mailpeek", "--limit", "x"]).is_err());
    }
}
