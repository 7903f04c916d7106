use crate::demo::{run_demo, DemoArgs};
use crate::infra::{build_service, parse_category};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tenant_compliance::config::AppConfig;
use tenant_compliance::error::AppError;
use tenant_compliance::workflows::certification::{IncomeCategory, MaxRentResponse};

#[derive(Parser, Debug)]
#[command(
    name = "Tenant Compliance",
    about = "Income certification and safe-harbor recertification for income-restricted units",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Classify an annual income against the configured AMI limits
    Classify(ClassifyArgs),
    /// Compute the monthly rent ceiling for a household size and income tier
    MaxRent(MaxRentArgs),
    /// Certify and recertify a sample household, printing both recertification signals
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ClassifyArgs {
    /// Gross annual household income
    #[arg(long)]
    pub(crate) income: Decimal,
    /// Number of persons in the household (1-8)
    #[arg(long)]
    pub(crate) household_size: i64,
    /// Program year to classify against (defaults to the table in force today)
    #[arg(long, visible_alias = "year")]
    pub(crate) program_year: Option<u16>,
    /// Print the classification as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct MaxRentArgs {
    /// Number of persons in the household (1-8)
    #[arg(long)]
    pub(crate) household_size: i64,
    /// Income tier: very-low, low or market-rate
    #[arg(long, value_parser = parse_category)]
    pub(crate) category: IncomeCategory,
    /// Program year to price against (defaults to the table in force today)
    #[arg(long, visible_alias = "year")]
    pub(crate) program_year: Option<u16>,
    /// Print the ceiling as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Classify(args) => run_classify(args),
        Command::MaxRent(args) => run_max_rent(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_classify(args: ClassifyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config.compliance)?;

    let classification = match args.program_year {
        Some(year) => service.classify_income_for_year(args.income, args.household_size, year),
        None => service.classify_income(args.income, args.household_size),
    }?;

    if args.json {
        println!("{}", to_json(&classification));
        return Ok(());
    }

    println!(
        "{} (household of {}, program year {})",
        classification.category, classification.household_size, classification.program_year
    );
    println!("- {}% of area median income", classification.ami_percentage);
    println!(
        "- limits: very low <= {} | low <= {}",
        classification.limits.very_low, classification.limits.low
    );
    Ok(())
}

fn run_max_rent(args: MaxRentArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config.compliance)?;

    let max_rent = match args.program_year {
        Some(year) => {
            service.compute_max_rent_for_year(args.household_size, args.category, year)
        }
        None => service.compute_max_rent(args.household_size, args.category),
    }?;

    if args.json {
        println!("{}", to_json(&MaxRentResponse { max_rent }));
        return Ok(());
    }

    match max_rent {
        Some(ceiling) => println!(
            "{} ceiling for a household of {}: {}/month",
            args.category, args.household_size, ceiling
        ),
        None => println!("{} units carry no rent ceiling", args.category),
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("{{\"error\":\"{err}\"}}"))
}
