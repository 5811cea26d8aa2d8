use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

/// Log filter directives; overrides `-v`/`-q` when set.
pub const LOG_ENV: &str = "INBOX_LOG";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "inbox",
    version,
    about = "Triage AI-drafted email follow-ups",
    disable_help_subcommand = true
)]
pub struct Args {
    /// More log output on stderr; repeat for debug and trace.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output; twice for errors only.
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Setting override, e.g. `--rc default.tab=lead`.
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_setting)]
    pub settings: Vec<(String, String)>,

    #[arg(long = "inboxrc", value_name = "FILE")]
    pub rc_file: Option<PathBuf>,

    #[arg(long = "data", value_name = "DIR")]
    pub data: Option<PathBuf>,

    /// Signed-in email; falls back to $INBOX_USER, then `user.email`.
    #[arg(long = "user", value_name = "EMAIL")]
    pub user: Option<String>,

    /// Command and its arguments. `rc.key=value` words are settings.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub words: Vec<String>,
}

impl Args {
    /// Removes `rc.key=value` words from `words` and returns every setting
    /// override, positional ones first.
    pub fn take_settings(&mut self) -> Vec<(String, String)> {
        let (positional, words): (Vec<String>, Vec<String>) = std::mem::take(&mut self.words)
            .into_iter()
            .partition(|word| word.starts_with("rc.") && word.contains('='));
        self.words = words;

        positional
            .iter()
            .filter_map(|word| parse_setting(word).ok())
            .chain(std::mem::take(&mut self.settings))
            .collect()
    }
}

fn parse_setting(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn log_level(verbose: u8, quiet: u8) -> LevelFilter {
    match (quiet, verbose) {
        (2.., _) => LevelFilter::ERROR,
        (1, _) | (0, 0) => LevelFilter::WARN,
        (0, 1) => LevelFilter::INFO,
        (0, 2) => LevelFilter::DEBUG,
        (0, _) => LevelFilter::TRACE,
    }
}

/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(log_level(verbose, quiet).into())
        .with_env_var(LOG_ENV)
        .from_env()
        .map_err(|err| anyhow!("invalid {LOG_ENV}: {err}"))?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();

    if let Err(err) = installed {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: &'static str,
    pub command_args: Vec<String>,
}

impl Invocation {
    /// The first word names the command (unique prefixes allowed); with no
    /// words, `default.command` runs.
    #[tracing::instrument(skip(cfg, words))]
    pub fn parse(cfg: &Config, words: Vec<String>) -> anyhow::Result<Self> {
        let mut words = words.into_iter();

        let Some(first) = words.next() else {
            debug!(command = cfg.default_command(), "no explicit command, using default");
            return Ok(Self {
                command: cfg.default_command(),
                command_args: vec![],
            });
        };

        let command = expand_command_abbrev(&first, &known_command_names())
            .ok_or_else(|| anyhow!("unknown or ambiguous command: {first}"))?;
        debug!(token = %first, expanded = command, "resolved command token");

        Ok(Self {
            command,
            command_args: words.collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn settings_come_from_flags_and_rc_words() {
        let mut args = Args::try_parse_from([
            "inbox",
            "-vv",
            "--rc",
            "color=off",
            "rc.default.tab=lead",
            "list",
            "urgent",
        ])
        .unwrap();

        assert_eq!(args.verbose, 2);
        assert_eq!(
            args.take_settings(),
            vec![
                ("rc.default.tab".to_string(), "lead".to_string()),
                ("color".to_string(), "off".to_string()),
            ]
        );
        assert_eq!(args.words, words(&["list", "urgent"]));
        assert!(args.settings.is_empty());
    }

    #[test]
    fn malformed_rc_flag_is_rejected() {
        assert!(Args::try_parse_from(["inbox", "--rc", "color"]).is_err());
        assert!(Args::try_parse_from(["inbox", "--rc", "=off"]).is_err());
    }

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(log_level(0, 0), LevelFilter::WARN);
        assert_eq!(log_level(1, 0), LevelFilter::INFO);
        assert_eq!(log_level(3, 0), LevelFilter::TRACE);
        assert_eq!(log_level(3, 1), LevelFilter::WARN);
        assert_eq!(log_level(0, 2), LevelFilter::ERROR);
    }

    #[test]
    fn empty_invocation_uses_default_command() {
        let cfg =
            Config::from_overrides(vec![("default.command".to_string(), "counts".to_string())])
                .unwrap();
        let inv = Invocation::parse(&cfg, vec![]).unwrap();
        assert_eq!(inv.command, "counts");
        assert!(inv.command_args.is_empty());
    }

    #[test]
    fn abbreviated_command_expands() {
        let cfg = Config::default();
        let inv = Invocation::parse(&cfg, words(&["app", "A"])).unwrap();
        assert_eq!(inv.command, "approve");
        assert_eq!(inv.command_args, words(&["A"]));

        let inv = Invocation::parse(&cfg, words(&["mo", "A", "urgent"])).unwrap();
        assert_eq!(inv.command, "move");
    }

    #[test]
    fn unknown_or_ambiguous_command_is_an_error() {
        let cfg = Config::default();
        assert!(Invocation::parse(&cfg, words(&["archive", "A"])).is_err());
        assert!(Invocation::parse(&cfg, words(&["", "A"])).is_err());
    }
}
