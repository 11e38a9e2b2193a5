use std::{process::ExitCode, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    actions::{ActionError, ActionRequest},
    session::FileSessionStore,
    AdminClient, ClientConfig, ClientError, SessionEvent, SessionManager,
};
use shared::domain::{LoanId, LoanStatus, ProfileId, TransactionType, UserId, WithdrawalStatus};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::Console;
use config::Settings;

#[derive(Parser, Debug)]
#[command(name = "admin_console", about = "Back-office console for the lending platform")]
struct Args {
    /// Backend base URL, overriding admin.toml and the environment.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Skip confirmation prompts.
    #[arg(long, short = 'y', global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in as an administrator.
    Login {
        phone: String,
        /// Falls back to ADMIN_PASSWORD, then a prompt.
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    Whoami,
    Dashboard,
    #[command(subcommand)]
    Users(UsersCommand),
    #[command(subcommand)]
    Profiles(ProfilesCommand),
    #[command(subcommand)]
    Loans(LoansCommand),
    #[command(subcommand)]
    Withdrawals(WithdrawalsCommand),
    #[command(subcommand)]
    Transactions(TransactionsCommand),
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Matches name or phone.
        #[arg(long)]
        search: Option<String>,
    },
    Show {
        id: String,
    },
    /// Activate or deactivate the account.
    Toggle {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum ProfilesCommand {
    Pending {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Show {
        id: String,
    },
    Verify {
        id: String,
        #[arg(long)]
        loan_limit: Option<i64>,
    },
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
enum LoansCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        status: Option<LoanStatus>,
    },
    PendingVerification {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    PendingDisbursement {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Show {
        id: String,
    },
    Approve {
        id: String,
        /// Approved amount in tugrik, e.g. 150000 or 150,000.
        #[arg(long)]
        amount: String,
    },
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Release approved funds to the borrower's wallet.
    Disburse {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum WithdrawalsCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        status: Option<WithdrawalStatus>,
    },
    Approve {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
enum TransactionsCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long = "type")]
        kind: Option<TransactionType>,
    },
}

async fn read_password(flag: Option<String>) -> Result<String> {
    if let Some(password) = flag.or_else(|| std::env::var("ADMIN_PASSWORD").ok()) {
        return Ok(password);
    }
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Password: ").await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read password")?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

async fn run(args: Args, settings: Settings, session: Arc<SessionManager>) -> Result<()> {
    let client_config = ClientConfig::new(&settings.api_url)
        .with_context(|| format!("invalid api url '{}'", settings.api_url))?
        .with_timeout(settings.request_timeout);
    let client = AdminClient::new(client_config, session)?;

    if let Command::Login { phone, password } = args.command {
        let password = read_password(password).await?;
        let signed_in = client.login(&phone, &password).await?;
        println!(
            "Signed in as {} ({})",
            signed_in.user.full_name(),
            signed_in.user.phone
        );
        return Ok(());
    }
    if let Command::Logout = args.command {
        client.logout().await;
        println!("Signed out.");
        return Ok(());
    }

    let Some(current) = client.restore_session().await? else {
        bail!(ClientError::NotSignedIn);
    };
    let console = Console::new(client, current.user.role, args.yes);

    match args.command {
        Command::Login { .. } | Command::Logout => Ok(()),
        Command::Whoami => {
            println!(
                "{} ({}) id={}",
                current.user.full_name(),
                current.user.phone,
                current.user.id
            );
            Ok(())
        }
        Command::Dashboard => console.dashboard().await,
        Command::Users(cmd) => match cmd {
            UsersCommand::List { page, search } => console.list_users(page, search).await,
            UsersCommand::Show { id } => console.show_user(UserId::from(id)).await,
            UsersCommand::Toggle { id } => console.toggle_user(UserId::from(id)).await,
        },
        Command::Profiles(cmd) => match cmd {
            ProfilesCommand::Pending { page } => console.pending_profiles(page).await,
            ProfilesCommand::Show { id } => console.show_profile(ProfileId::from(id)).await,
            ProfilesCommand::Verify { id, loan_limit } => {
                console.verify_profile(ProfileId::from(id), loan_limit).await
            }
            ProfilesCommand::Reject { id, reason } => {
                console.reject_profile(ProfileId::from(id), reason).await
            }
        },
        Command::Loans(cmd) => match cmd {
            LoansCommand::List { page, status } => console.list_loans(page, status).await,
            LoansCommand::PendingVerification { page } => {
                console.pending_verification_loans(page).await
            }
            LoansCommand::PendingDisbursement { page } => {
                console.pending_disbursement_loans(page).await
            }
            LoansCommand::Show { id } => console.show_loan(LoanId::from(id)).await,
            LoansCommand::Approve { id, amount } => {
                console.approve_loan(LoanId::from(id), &amount).await
            }
            LoansCommand::Reject { id, reason } => {
                console.reject_loan(LoanId::from(id), reason).await
            }
            LoansCommand::Disburse { id } => console.disburse_loan(LoanId::from(id)).await,
        },
        Command::Withdrawals(cmd) => match cmd {
            WithdrawalsCommand::List { page, status } => {
                console.list_withdrawals(page, status).await
            }
            WithdrawalsCommand::Approve { id, notes } => {
                console
                    .act_on_withdrawal(&id, ActionRequest::ApproveWithdrawal { notes })
                    .await
            }
            WithdrawalsCommand::Reject { id, reason } => {
                console
                    .act_on_withdrawal(&id, ActionRequest::RejectWithdrawal { reason })
                    .await
            }
        },
        Command::Transactions(TransactionsCommand::List { page, kind }) => {
            console.list_transactions(page, kind).await
        }
    }
}

fn operator_message(err: &anyhow::Error) -> String {
    if let Some(err) = err.downcast_ref::<ClientError>() {
        return err.user_message();
    }
    if let Some(err) = err.downcast_ref::<ActionError>() {
        if let Some(message) = err.user_message() {
            return message;
        }
    }
    format!("{err:#}")
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = match config::load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(api_url) = args.api_url.clone() {
        settings.api_url = api_url;
    }
    debug!(
        api_url = %settings.api_url,
        session_path = %settings.session_path.display(),
        "console: settings loaded"
    );

    let session = SessionManager::new(Arc::new(FileSessionStore::new(&settings.session_path)));
    let mut events = session.subscribe();

    let outcome = run(args, settings, session).await;

    let mut redirect = None;
    loop {
        match events.try_recv() {
            Ok(SessionEvent::Expired { redirect: route }) => redirect = Some(route),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    if let Some(route) = redirect {
        warn!(redirect = %route, "console: session expired");
        eprintln!("Session expired. Sign in again with `admin_console login <phone>`.");
        return ExitCode::FAILURE;
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if matches!(err.downcast_ref::<ClientError>(), Some(ClientError::NotSignedIn)) => {
            eprintln!("Not signed in. Run `admin_console login <phone>` first.");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {}", operator_message(&err));
            ExitCode::FAILURE
        }
    }
}
