use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use portal_core::NextStep;
use portal_core::model::{QuestionKind, RoleSet};
use portal_core::roles;
use services::{
    AppServices, ChangeRoleForm, Clock, InductionService, PortalConfig, QuestionPage, StepOutcome,
};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn required(value: Option<String>, flag: &'static str) -> Result<String, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { flag })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  portal induction   --email <email> [--reset] [--db <sqlite_url>] [--bank <json>]");
    eprintln!("  portal plan-role   --current <roles> --requested <Analyst|UserManager|Both>");
    eprintln!("  portal change-role --agreement <id> --email <target> --first <name> --last <name>");
    eprintln!("                     --current <roles> --requested <role> --requester <email>");
    eprintln!("                     [--fleet-type <type>]");
    eprintln!();
    eprintln!("Global flags: --verbose");
    eprintln!("<roles> is a comma-separated list, e.g. Analyst,UserManager");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PORTAL_DB_URL, PORTAL_QUESTION_BANK, PORTAL_INDUCTION_TTL_SECS,");
    eprintln!("  PORTAL_ROLE_SERVICE_URL, PORTAL_PERMISSIONS_URL, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Induction,
    PlanRole,
    ChangeRole,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "induction" => Some(Self::Induction),
            "plan-role" => Some(Self::PlanRole),
            "change-role" => Some(Self::ChangeRole),
            _ => None,
        }
    }
}

/// Flags accepted by every subcommand; unset ones stay `None`.
#[derive(Debug, Default)]
struct Args {
    verbose: bool,
    db_url: Option<String>,
    bank: Option<PathBuf>,
    reset: bool,
    email: Option<String>,
    agreement: Option<String>,
    first: Option<String>,
    last: Option<String>,
    current: Option<String>,
    requested: Option<String>,
    requester: Option<String>,
    fleet_type: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--verbose" | "-v" => parsed.verbose = true,
                "--reset" => parsed.reset = true,
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = Some(normalize_sqlite_url(value));
                }
                "--bank" => parsed.bank = Some(require_value(args, "--bank")?.into()),
                "--email" => parsed.email = Some(require_value(args, "--email")?),
                "--agreement" => parsed.agreement = Some(require_value(args, "--agreement")?),
                "--first" => parsed.first = Some(require_value(args, "--first")?),
                "--last" => parsed.last = Some(require_value(args, "--last")?),
                "--current" => parsed.current = Some(require_value(args, "--current")?),
                "--requested" => parsed.requested = Some(require_value(args, "--requested")?),
                "--requester" => parsed.requester = Some(require_value(args, "--requester")?),
                "--fleet-type" => parsed.fleet_type = Some(require_value(args, "--fleet-type")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(parsed)
    }

    fn config(&self) -> Result<PortalConfig, Box<dyn std::error::Error>> {
        let mut config = PortalConfig::from_env()?;
        if let Some(db_url) = self.db_url.clone() {
            config.db_url = db_url;
        }
        if let Some(bank) = self.bank.clone() {
            config.question_bank_path = Some(bank);
        }
        Ok(config)
    }

    fn current_roles(&self) -> RoleSet {
        RoleSet::from_names(split_list(self.current.as_deref().unwrap_or_default()))
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn open_services(args: &Args) -> Result<AppServices, Box<dyn std::error::Error>> {
    let config = args.config()?;
    // sqlx will not create a missing database file.
    prepare_sqlite_file(&config.db_url)?;
    tracing::debug!(db = %config.db_url, "opening portal storage");
    Ok(AppServices::new_sqlite(&config, Clock::system()).await?)
}

//
// ─── INDUCTION ─────────────────────────────────────────────────────────────────
//

/// Parse "1,3" style input into zero-based option indices.
fn parse_choices(line: &str) -> Option<BTreeSet<usize>> {
    line.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().ok().and_then(|n| n.checked_sub(1)))
        .collect()
}

async fn run_induction(
    induction: &InductionService,
    email: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut step = induction.start(email).await?;

    loop {
        let number = match step {
            NextStep::Passed => {
                println!("You have passed the induction assessment.");
                return Ok(());
            }
            NextStep::NotPassed { .. } => {
                println!();
                println!("You have not passed. Review and answer again:");
                for (number, heading) in induction.not_passed(email).await? {
                    println!("  {number}. {heading}");
                }
                step = induction.start(email).await?;
                continue;
            }
            NextStep::Question(number) => number,
        };

        let view = match induction.question(email, number).await? {
            QuestionPage::Passed => {
                step = NextStep::Passed;
                continue;
            }
            QuestionPage::Redirect(target) => {
                step = NextStep::Question(target);
                continue;
            }
            QuestionPage::Show(view) => view,
        };

        println!();
        println!("Question {number}: {}", view.question.heading);
        if let Some(subtext) = view.question.subtext.as_deref() {
            println!("  {subtext}");
        }
        for (i, option) in view.question.options.iter().enumerate() {
            println!("  [{}] {option}", i + 1);
        }
        let prompt = match view.question.kind {
            QuestionKind::SingleChoice => "Choose one",
            QuestionKind::MultipleChoice => "Choose one or more, separated by commas",
        };
        print!("{prompt}: ");
        io::stdout().flush()?;

        let Some(line) = lines.next().transpose()? else {
            println!();
            println!("Progress saved.");
            return Ok(());
        };
        let Some(choices) = parse_choices(&line) else {
            println!("Enter option numbers from the list.");
            continue;
        };

        match induction.submit_indices(email, number, choices).await {
            Ok(next) => step = next,
            Err(err) => match err.user_message() {
                Some(message) => println!("{message}"),
                None => return Err(err.into()),
            },
        }
    }
}

//
// ─── ROLES ─────────────────────────────────────────────────────────────────────
//

fn describe(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Skipped => "skipped".to_string(),
        StepOutcome::Applied(role) => format!("{role} done"),
        StepOutcome::Failed { role, reason } => format!("{role} failed: {reason}"),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            ArgsError::UnknownArg(first)
        })?,
    };

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    match cmd {
        Command::PlanRole => {
            let plan = roles::plan_from_form(args.current_roles(), args.requested.as_deref())
                .map_err(portal_core::Error::from)
                .inspect_err(|err| {
                    if let Some(message) = err.user_message() {
                        eprintln!("{message}");
                    }
                })?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Induction => {
            let email = required(args.email.clone(), "--email")?;
            let services = open_services(&args).await?;
            let induction = services.induction();
            if args.reset {
                induction.reset(&email).await?;
            }
            run_induction(&induction, &email).await
        }
        Command::ChangeRole => {
            let form = ChangeRoleForm {
                agreement_id: required(args.agreement.clone(), "--agreement")?,
                target_email: required(args.email.clone(), "--email")?,
                target_first_name: required(args.first.clone(), "--first")?,
                target_last_name: required(args.last.clone(), "--last")?,
                current_roles: args.current_roles(),
                fleet_type: args.fleet_type.clone(),
                requested: args.requested.clone(),
            };
            let requester = required(args.requester.clone(), "--requester")?;
            let services = open_services(&args).await?;

            let outcome = services.role_changes().change_role(&requester, form).await?;
            if let Some(message) = outcome.confirmation_message() {
                println!("{message}");
                return Ok(());
            }
            eprintln!("remove: {}", describe(&outcome.removal));
            eprintln!("add: {}", describe(&outcome.addition));
            if outcome.is_inconsistent() {
                eprintln!("Roles were only partly changed; check the user's roles before retrying.");
            }
            Err("role change failed".into())
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
