mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "msgserve", version, about = "Framed TCP message server CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_serve_subcommand() {
        let cli = Cli::try_parse_from([
            "msgserve",
            "serve",
            "7000",
            "--echo",
            "--max-connections",
            "4",
            "--bind",
            "127.0.0.1",
        ])
        .expect("serve args should parse");

        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 7000);
        assert!(args.echo);
        assert_eq!(args.max_connections, Some(4));
        assert_eq!(args.bind.to_string(), "127.0.0.1");
        assert!(args.no_delay);
    }

    #[test]
    fn no_delay_takes_an_explicit_value() {
        let cli = Cli::try_parse_from(["msgserve", "serve", "0", "--no-delay", "false"])
            .expect("serve args should parse");
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(!args.no_delay);
    }

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "msgserve",
            "send",
            "127.0.0.1:7000",
            "--data",
            "hello",
            "--wait",
        ])
        .expect("send args should parse");

        assert!(matches!(cli.command, Command::Send(ref args) if args.wait));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "msgserve",
            "send",
            "127.0.0.1:7000",
            "--file",
            "payload.bin",
            "--data",
            "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn rejects_out_of_range_port() {
        let err = Cli::try_parse_from(["msgserve", "serve", "70000"])
            .expect_err("port above u16 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["msgserve", "version", "--format", "json"])
            .expect("global flag should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }
}
