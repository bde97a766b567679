pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::admin::{AdminAction, Selection};

#[derive(Debug, Parser)]
#[command(
    name = "corner",
    about = "Corner operator CLI",
    long_about = "Operate the item request portal: migrations, demo data, config inspection, and an admin console over the HTTP API.",
    after_help = "Examples:\n  corner doctor --json\n  corner seed\n  corner admin list --status pending\n  corner admin batch-status --status approved --all"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo request dataset and verify it")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, database connectivity, and migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Drive the admin view against a running server")]
    Admin {
        #[arg(long, help = "API base URL (defaults to server.public_url or the bind address)")]
        url: Option<String>,
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AdminCommand {
    #[command(about = "Show one page of requests")]
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value = "all", help = "all|pending|approved|completed|rejected")]
        status: String,
    },
    #[command(about = "Create a request")]
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        item: String,
    },
    #[command(about = "Change the status of one request")]
    SetStatus { id: String, status: String },
    #[command(about = "Change the status of the selected requests on a page")]
    BatchStatus {
        #[arg(long)]
        status: String,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    #[command(about = "Delete the selected requests on a page")]
    BatchDelete {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, help = "Confirm the deletion")]
        yes: bool,
    },
}

#[derive(Debug, clap::Args)]
struct SelectionArgs {
    #[arg(long, num_args = 1.., conflicts_with = "all", required_unless_present = "all")]
    ids: Vec<String>,
    #[arg(long, help = "Select every request on the page")]
    all: bool,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value = "all", help = "Tab the page is taken from")]
    tab: String,
}

impl SelectionArgs {
    fn into_selection(self) -> Selection {
        Selection {
            ids: if self.all { None } else { Some(self.ids) },
            page: self.page,
            tab: self.tab,
        }
    }
}

impl AdminCommand {
    fn into_action(self) -> AdminAction {
        match self {
            Self::List { page, status } => AdminAction::List { page, tab: status },
            Self::Create { name, item } => AdminAction::Create { name, item },
            Self::SetStatus { id, status } => AdminAction::SetStatus { id, status },
            Self::BatchStatus { status, selection } => {
                AdminAction::BatchStatus { status, selection: selection.into_selection() }
            }
            Self::BatchDelete { selection, yes } => {
                AdminAction::BatchDelete { selection: selection.into_selection(), confirmed: yes }
            }
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Admin { url, action } => commands::admin::run(url, action.into_action()),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{AdminCommand, Cli, Command};

    #[test]
    fn batch_delete_requires_ids_or_all() {
        assert!(Cli::try_parse_from(["corner", "admin", "batch-delete", "--yes"]).is_err());
        assert!(Cli::try_parse_from(["corner", "admin", "batch-delete", "--all", "--ids", "a"])
            .is_err());

        let cli = Cli::try_parse_from(["corner", "admin", "batch-delete", "--ids", "a", "b"])
            .expect("ids form parses");
        let Command::Admin { action: AdminCommand::BatchDelete { selection, yes }, .. } =
            cli.command
        else {
            panic!("expected batch-delete");
        };
        assert_eq!(selection.ids, ["a", "b"]);
        assert!(!yes);
        assert_eq!(selection.page, 1);
    }

    #[test]
    fn admin_url_flag_is_optional() {
        let cli = Cli::try_parse_from([
            "corner",
            "admin",
            "--url",
            "http://127.0.0.1:9000",
            "list",
            "--status",
            "pending",
        ])
        .expect("parses");
        let Command::Admin { url, action: AdminCommand::List { page, status } } = cli.command else {
            panic!("expected admin list");
        };
        assert_eq!(url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(page, 1);
        assert_eq!(status, "pending");
    }
}
