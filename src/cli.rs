//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Bulk export wiki spaces to local archives.
///
/// Lists every space on a Confluence-style wiki, exports each one as a
/// zipped HTML site and downloads the archives into an output directory.
/// Settings not given on the command line are read from the config file.
#[derive(Parser, Debug)]
#[command(name = "space-export")]
#[command(author, version, about)]
pub struct Args {
    /// Config file with `key = value` settings (created as a template if missing)
    #[arg(short = 'c', long, default_value = "config.ini")]
    pub config: PathBuf,

    /// Base URL of the wiki (e.g. https://example.atlassian.net/wiki)
    #[arg(long)]
    pub url: Option<String>,

    /// Account name or e-mail used for basic auth
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// API token or password used for basic auth
    #[arg(short = 't', long)]
    pub token: Option<String>,

    /// Directory the archives and the export cache are written to
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Maximum concurrent exports (1-100)
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrent: Option<u8>,

    /// Per-request timeout in seconds, also bounds each server-side export (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: Option<u64>,

    /// Export only these space keys (overrides --personal and --archived)
    #[arg(short = 's', long, num_args = 1.., value_name = "KEY", conflicts_with = "all")]
    pub spaces: Vec<String>,

    /// Export every space the filters allow (the default when --spaces is absent)
    #[arg(short = 'a', long)]
    pub all: bool,

    /// Include personal spaces
    #[arg(short = 'p', long)]
    pub personal: bool,

    /// Include archived spaces
    #[arg(long)]
    pub archived: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Shorthand for -v: enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_args_parses_successfully() {
        let args = Args::try_parse_from(["space-export"]).unwrap();
        assert_eq!(args.config, PathBuf::from("config.ini"));
        assert!(args.url.is_none());
        assert!(args.concurrent.is_none());
        assert!(args.spaces.is_empty());
        assert!(!args.personal);
        assert!(!args.archived);
        assert!(!args.insecure);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_connection_flags() {
        let args = Args::try_parse_from([
            "space-export",
            "--url",
            "https://wiki.example.com",
            "-u",
            "jdoe",
            "-t",
            "secret",
            "-o",
            "/tmp/out",
        ])
        .unwrap();
        assert_eq!(args.url.as_deref(), Some("https://wiki.example.com"));
        assert_eq!(args.username.as_deref(), Some("jdoe"));
        assert_eq!(args.token.as_deref(), Some("secret"));
        assert_eq!(args.output, Some(PathBuf::from("/tmp/out")));
    }

    #[test]
    fn test_cli_spaces_take_multiple_values() {
        let args = Args::try_parse_from(["space-export", "-s", "DOCS", "OPS", "~jdoe"]).unwrap();
        assert_eq!(args.spaces, vec!["DOCS", "OPS", "~jdoe"]);
    }

    #[test]
    fn test_cli_spaces_conflicts_with_all() {
        let result = Args::try_parse_from(["space-export", "-s", "DOCS", "--all"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_cli_concurrent_range() {
        let args = Args::try_parse_from(["space-export", "-n", "100"]).unwrap();
        assert_eq!(args.concurrent, Some(100));

        let err = Args::try_parse_from(["space-export", "-n", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = Args::try_parse_from(["space-export", "--concurrent", "101"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_timeout_range() {
        let args = Args::try_parse_from(["space-export", "--timeout", "600"]).unwrap();
        assert_eq!(args.timeout, Some(600));

        let err = Args::try_parse_from(["space-export", "--timeout", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_filter_flags() {
        let args = Args::try_parse_from(["space-export", "-p", "--archived", "-a"]).unwrap();
        assert!(args.personal);
        assert!(args.archived);
        assert!(args.all);
    }

    #[test]
    fn test_cli_logging_flags() {
        let args = Args::try_parse_from([
            "space-export",
            "-vv",
            "--debug",
            "--log-file",
            "export.log",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        assert!(args.debug);
        assert_eq!(args.log_file, Some(PathBuf::from("export.log")));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["space-export", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["space-export", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["space-export", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
