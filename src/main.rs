use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use vitta_ledger_lib::amount_parser::parse_amount_to_cents;
use vitta_ledger_lib::{
    category_breakdown_at_db_path, create_account_at_db_path, create_category_at_db_path,
    create_transaction_at_db_path, delete_account_at_db_path, delete_category_at_db_path,
    delete_transaction_at_db_path, import_statement_file_at_db_path, list_accounts_at_db_path,
    list_categories_at_db_path, list_transactions_at_db_path, migrate_at_db_path,
    migration_status, monthly_trend_at_db_path, preview_statement_file,
    seed_default_categories_at_db_path, summary_report_at_db_path, update_transaction_at_db_path,
    AccountCreateRequest, CategoryCreateRequest, Settings, TransactionCreateRequest,
    TransactionUpdateRequest, TransactionsQueryRequest,
};

type CliResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "vitta-ledger")]
#[command(about = "Import bank statements into a running-balance ledger")]
struct Cli {
    /// Settings file (defaults to `vitta.toml` in the working directory, if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ledger database path, overriding `database.path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Owning user id; every read and write is scoped to it.
    #[arg(long, global = true, env = "VITTA_USER", default_value = "local")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Show applied and pending migrations.
    Status,
    Account(Account),
    Category(Category),
    Tx(Tx),
    /// Import a .csv or .pdf statement into an account.
    Import(ImportArgs),
    /// Parse a statement without writing anything.
    Preview(PreviewArgs),
    Report(Report),
}

#[derive(Args, Debug)]
struct Account {
    #[command(subcommand)]
    command: AccountCommand,
}

#[derive(Subcommand, Debug)]
enum AccountCommand {
    Create(AccountCreateArgs),
    List,
    Delete { id: String },
}

#[derive(Args, Debug)]
struct AccountCreateArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    bank: String,
    /// Opening balance, e.g. `1,00,000.00`.
    #[arg(long, allow_hyphen_values = true)]
    opening_balance: Option<String>,
}

#[derive(Args, Debug)]
struct Category {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Subcommand, Debug)]
enum CategoryCommand {
    /// Create the default categories if the user has none.
    Seed,
    List,
    Create(CategoryCreateArgs),
    Delete { id: String },
}

#[derive(Args, Debug)]
struct CategoryCreateArgs {
    #[arg(long)]
    name: String,
    /// `income` or `expense`.
    #[arg(long)]
    kind: String,
    #[arg(long)]
    color: Option<String>,
}

#[derive(Args, Debug)]
struct Tx {
    #[command(subcommand)]
    command: TxCommand,
}

#[derive(Subcommand, Debug)]
enum TxCommand {
    Create(TxCreateArgs),
    List(TxListArgs),
    Update(TxUpdateArgs),
    Delete { id: String },
}

#[derive(Args, Debug)]
struct TxCreateArgs {
    #[arg(long)]
    account: String,
    #[arg(long)]
    date: String,
    #[arg(long)]
    description: String,
    #[arg(long)]
    amount: String,
    /// `debit` or `credit`.
    #[arg(long)]
    kind: String,
    #[arg(long)]
    category: Option<String>,
}

#[derive(Args, Debug)]
struct TxListArgs {
    #[arg(long)]
    account: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    kind: Option<String>,
    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Args, Debug)]
struct TxUpdateArgs {
    id: String,
    #[arg(long)]
    description: Option<String>,
    /// Pass an empty string to clear the category.
    #[arg(long)]
    category: Option<String>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    file: PathBuf,
    #[arg(long)]
    account: String,
}

#[derive(Args, Debug)]
struct PreviewArgs {
    file: PathBuf,
}

#[derive(Args, Debug)]
struct Report {
    #[arg(value_enum)]
    kind: ReportKind,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReportKind {
    Summary,
    Categories,
    Monthly,
}

fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_account(db_path: &Path, user: &str, command: AccountCommand) -> CliResult<()> {
    match command {
        AccountCommand::Create(args) => {
            let opening_balance_cents = match args.opening_balance.as_deref() {
                Some(raw) => parse_amount_to_cents(raw)?,
                None => 0,
            };
            print_json(&create_account_at_db_path(
                db_path,
                user,
                AccountCreateRequest {
                    account_name: args.name,
                    bank_name: args.bank,
                    opening_balance_cents,
                },
            )?)
        }
        AccountCommand::List => print_json(&list_accounts_at_db_path(db_path, user)?),
        AccountCommand::Delete { id } => print_json(&delete_account_at_db_path(db_path, user, &id)?),
    }
}

fn run_category(db_path: &Path, user: &str, command: CategoryCommand) -> CliResult<()> {
    match command {
        CategoryCommand::Seed => print_json(&seed_default_categories_at_db_path(db_path, user)?),
        CategoryCommand::List => print_json(&list_categories_at_db_path(db_path, user)?),
        CategoryCommand::Create(args) => print_json(&create_category_at_db_path(
            db_path,
            user,
            CategoryCreateRequest {
                name: args.name,
                kind: args.kind,
                color: args.color,
            },
        )?),
        CategoryCommand::Delete { id } => {
            delete_category_at_db_path(db_path, user, &id)?;
            print_json(&serde_json::json!({ "deleted_id": id }))
        }
    }
}

fn run_tx(db_path: &Path, user: &str, command: TxCommand) -> CliResult<()> {
    match command {
        TxCommand::Create(args) => print_json(&create_transaction_at_db_path(
            db_path,
            user,
            TransactionCreateRequest {
                account_id: args.account,
                date: args.date,
                description: args.description,
                amount_cents: parse_amount_to_cents(&args.amount)?,
                kind: args.kind,
                category_id: args.category,
            },
        )?),
        TxCommand::List(args) => print_json(&list_transactions_at_db_path(
            db_path,
            user,
            TransactionsQueryRequest {
                account_id: args.account,
                category_id: args.category,
                kind: args.kind,
                limit: args.limit,
            },
        )?),
        TxCommand::Update(args) => print_json(&update_transaction_at_db_path(
            db_path,
            user,
            &args.id,
            TransactionUpdateRequest {
                description: args.description,
                category_id: args.category,
            },
        )?),
        TxCommand::Delete { id } => print_json(&delete_transaction_at_db_path(db_path, user, &id)?),
    }
}

fn run(cli: Cli, settings: Settings) -> CliResult<()> {
    let db_path = cli.db.unwrap_or(settings.database.path);
    let user = cli.user.trim().to_string();
    if user.is_empty() {
        return Err("--user must not be empty".into());
    }

    match cli.command {
        Command::Migrate => print_json(&migrate_at_db_path(&db_path)?),
        Command::Status => print_json(&migration_status(&db_path)?),
        Command::Account(account) => run_account(&db_path, &user, account.command),
        Command::Category(category) => run_category(&db_path, &user, category.command),
        Command::Tx(tx) => run_tx(&db_path, &user, tx.command),
        Command::Import(args) => print_json(&import_statement_file_at_db_path(
            &db_path,
            &args.file,
            &args.account,
            &user,
        )?),
        Command::Preview(args) => print_json(&preview_statement_file(&args.file)?),
        Command::Report(report) => match report.kind {
            ReportKind::Summary => print_json(&summary_report_at_db_path(&db_path, &user)?),
            ReportKind::Categories => print_json(&category_breakdown_at_db_path(&db_path, &user)?),
            ReportKind::Monthly => print_json(&monthly_trend_at_db_path(&db_path, &user)?),
        },
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: failed to load settings: {err}");
            return ExitCode::FAILURE;
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "vitta_ledger_lib={level},vitta_ledger={level}",
            level = settings.log.level
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!("command failed: {err:?}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
