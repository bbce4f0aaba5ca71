mod cli;

use std::path::Path;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use colored::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{ChargeCommands, ClaimCommands, Cli, Commands, DenialCommands, RemitCommands};
use revenue_cycle::{
    audit::{Actor, TracingAuditLog},
    billing::{ChargeLedger, ClaimAssembler, NewCharge},
    clearinghouse::HttpClearinghouse,
    coding::{self, CodingEngine, CodingResult, EncounterFacts},
    config::Config,
    reconcile::{BatchOutcome, DenialManager, Reconciler},
    storage::{
        models::{Claim, ClaimStatus, Denial, DenialStatus},
        Database,
    },
    utils,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("revcycle=info,revenue_cycle=info,audit=info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    let actor = Actor::new(cli.user.clone());

    let result = match cli.command {
        Commands::Init => initialize(&config),
        Commands::Code {
            encounter,
            facts,
            preview,
            format,
        } => code_encounter(&config, encounter, &facts, preview, &format),
        Commands::Charge { command } => match command {
            ChargeCommands::Add {
                encounter,
                code,
                pointers,
                modifiers,
                units,
            } => add_charge(&config, encounter, code, pointers, modifiers, units),
            ChargeCommands::List { encounter } => list_charges(&config, encounter),
        },
        Commands::Claim { command } => match command {
            ClaimCommands::Create {
                encounter,
                insurance,
            } => create_claim(&config, encounter, insurance, &actor),
            ClaimCommands::Submit { claim, yes } => submit_claim(&config, &claim, yes, &actor).await,
            ClaimCommands::Show { claim, edi, format } => show_claim(&config, &claim, edi, &format),
            ClaimCommands::List { status, format } => list_claims(&config, &status, &format),
        },
        Commands::Remit { command } => match command {
            RemitCommands::Import { file, format } => import_remittance(&config, &file, &format, &actor),
        },
        Commands::Denials { command } => match command {
            DenialCommands::List {
                status,
                overdue,
                format,
            } => list_denials(&config, &status, overdue, &format),
        },
        Commands::Appeal {
            denial,
            reason,
            documents,
            deadline,
        } => {
            info!("Filing appeal on denial {}", denial);
            file_appeal(&config, denial, &reason, documents, deadline, &actor)
        }
        Commands::Resolve {
            denial,
            resolution,
            yes,
        } => resolve_denial(&config, denial, &resolution, yes, &actor),
        Commands::Stats { format } => {
            info!("Generating statistics...");
            show_stats(&config, &format)
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    Database::new(&config.database.path)
        .with_context(|| format!("opening database {}", config.database.path))
}

fn initialize(config: &Config) -> anyhow::Result<()> {
    println!("{}", "Initializing revenue cycle database...".green());
    let db = open_database(config)?;
    let seeded = coding::seed_fee_schedule(db.conn())?;
    println!("{}", "✓ Database initialized".green());
    println!("{}", format!("✓ {} E&M fee schedule entries", seeded).green());
    println!("{}", "✓ Configuration loaded".green());

    println!("\n{}", "Configuration:".cyan());
    println!("  Database:        {}", config.database.path);
    println!("  Clearinghouse:   {}", config.clearinghouse.base_url);
    println!("  Submitter:       {} ({})", config.edi.submitter_name, config.edi.submitter_id);
    println!("  Receiver:        {} ({})", config.edi.receiver_name, config.edi.receiver_id);
    println!("  Usage:           {}", config.edi.usage_indicator);
    println!("  Appeal window:   {} days", config.billing.appeal_window_days);
    println!("  Denial policy:   {:?}", config.billing.denial_policy);

    println!("\n{}", "Ready to use! Try running:".cyan());
    println!("  {} to score an encounter", "revcycle code <encounter> --facts facts.json".yellow());
    println!("  {} to view statistics", "revcycle stats".yellow());
    Ok(())
}

fn code_encounter(
    config: &Config,
    encounter_id: i64,
    facts_path: &Path,
    preview: bool,
    format: &str,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(facts_path)
        .with_context(|| format!("reading {}", facts_path.display()))?;
    let facts: EncounterFacts = serde_json::from_str(&text).context("parsing encounter facts")?;

    let result: CodingResult = if preview {
        coding::preview(&facts)
    } else {
        let db = open_database(config)?;
        CodingEngine::new(&db).code_encounter(encounter_id, &facts)?
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let assessment = &result.assessment;
    println!("{}", format!("=== Encounter {} ===", encounter_id).cyan().bold());
    for score in [&assessment.problems, &assessment.data, &assessment.risk] {
        println!("  {:<10} {}", format!("{:?}", score.element), score.level);
        for line in &score.rationale {
            println!("    - {}", line);
        }
    }
    println!("  Overall:   {}", assessment.level.to_string().bold());
    println!(
        "  Code:      {} {} {}",
        result.selection.code.green(),
        result.selection.description,
        utils::format_amount(result.selection.fee)
    );

    match &result.charge {
        Some(charge) => println!("{}", format!("✓ Charge {} recorded", charge.id).green()),
        None if preview => println!("{}", "PREVIEW: no charge recorded".yellow()),
        None => {}
    }
    Ok(())
}

fn add_charge(
    config: &Config,
    encounter_id: i64,
    code: String,
    pointers: Vec<u32>,
    modifiers: Vec<String>,
    units: u32,
) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let mut request = NewCharge::new(encounter_id, code, pointers);
    request.modifiers = modifiers;
    request.units = units;

    let charge = ChargeLedger::new(&db).add_charge(request)?;
    println!(
        "{}",
        format!(
            "✓ Charge {} recorded: {} x{} = {}",
            charge.id, charge.code, charge.units, utils::format_amount(charge.amount)
        )
        .green()
    );
    Ok(())
}

fn list_charges(config: &Config, encounter_id: i64) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let charges = ChargeLedger::new(&db).list_pending(encounter_id)?;

    if charges.is_empty() {
        println!("No pending charges for encounter {}", encounter_id);
        return Ok(());
    }

    let widths = [8, 10, 10, 6, 14, 12];
    utils::print_table_border(70);
    utils::print_table_row(&["Id", "Code", "Modifiers", "Units", "Amount", "Pointers"], &widths);
    utils::print_table_border(70);
    for charge in &charges {
        let pointers = charge
            .diagnosis_pointers
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        utils::print_table_row(
            &[
                &charge.id.to_string(),
                &charge.code,
                &charge.modifiers.join(","),
                &charge.units.to_string(),
                &utils::format_amount(charge.amount),
                &pointers,
            ],
            &widths,
        );
    }
    utils::print_table_border(70);
    Ok(())
}

fn create_claim(config: &Config, encounter_id: i64, insurance_id: i64, actor: &Actor) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let gateway = HttpClearinghouse::new(&config.clearinghouse)?;
    let assembler = ClaimAssembler::new(&db, gateway, TracingAuditLog, config.edi.clone());

    let claim = assembler.create_claim(encounter_id, insurance_id, actor)?;
    println!(
        "{}",
        format!(
            "✓ Claim {} created for {}",
            claim.claim_number,
            utils::format_amount(claim.total_charge_amount)
        )
        .green()
    );
    Ok(())
}

async fn submit_claim(config: &Config, claim_number: &str, yes: bool, actor: &Actor) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let gateway = HttpClearinghouse::new(&config.clearinghouse)?;
    let assembler = ClaimAssembler::new(&db, gateway, TracingAuditLog, config.edi.clone())
        .with_balance_tolerance(config.billing.balance_tolerance_cents);

    let claim = assembler.find_by_number(claim_number)?;
    if !yes
        && !utils::confirm_action(&format!(
            "Submit {} ({}) to {}?",
            claim.claim_number,
            utils::format_amount(claim.total_charge_amount),
            config.clearinghouse.base_url
        ))
    {
        println!("Cancelled");
        return Ok(());
    }

    let submitted = assembler.submit_claim(claim.id, actor).await?;
    println!("{}", format!("✓ Claim {} submitted", submitted.claim_number).green());
    if let Some(tracking) = &submitted.clearinghouse_claim_id {
        println!("Tracking id: {}", tracking);
    }
    Ok(())
}

fn show_claim(config: &Config, claim_number: &str, show_edi: bool, format: &str) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let gateway = HttpClearinghouse::new(&config.clearinghouse)?;
    let assembler = ClaimAssembler::new(&db, gateway, TracingAuditLog, config.edi.clone())
        .with_balance_tolerance(config.billing.balance_tolerance_cents);

    let claim = assembler.find_by_number(claim_number)?;
    let lines = assembler.claim_lines(claim.id)?;
    let balance = assembler.claim_balance(claim.id)?;

    if format == "json" {
        let body = serde_json::json!({
            "claim": claim,
            "lines": lines,
            "balance": balance,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{}", format!("=== Claim {} ===", claim.claim_number).cyan().bold());
    println!("  Status:        {}", utils::colorize_claim_status(claim.status));
    println!("  Encounter:     {}", claim.encounter_id);
    println!("  Charged:       {}", utils::format_amount(balance.charged));
    println!("  Paid:          {}", utils::format_amount(balance.paid));
    println!("  Adjusted:      {}", utils::format_amount(balance.adjusted));
    println!("  Outstanding:   {}", utils::format_amount(balance.outstanding));
    println!("  Patient resp.: {}", utils::format_amount(claim.patient_responsibility));
    if let Some(submitted) = &claim.submission_date {
        println!("  Submitted:     {}", utils::format_timestamp(submitted));
    }
    println!("  Adjudicated:   {}", utils::format_optional_date(claim.adjudication_date));
    if !balance.balanced {
        println!("{}", "  Claim does not balance".yellow());
    }

    let widths = [6, 10, 10, 6, 14];
    println!();
    utils::print_table_border(56);
    utils::print_table_row(&["Line", "Code", "Modifiers", "Units", "Amount"], &widths);
    utils::print_table_border(56);
    for line in &lines {
        utils::print_table_row(
            &[
                &line.line_number.to_string(),
                &line.charge.code,
                &line.charge.modifiers.join(","),
                &line.charge.units.to_string(),
                &utils::format_amount(line.charge.amount),
            ],
            &widths,
        );
    }
    utils::print_table_border(56);

    if show_edi {
        match &claim.edi_content {
            Some(edi) => println!("\n{}", edi),
            None => println!("\n{}", "Claim has not been encoded yet".yellow()),
        }
    }
    Ok(())
}

fn parse_filter<T>(status: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr<Err = String>,
{
    if status == "all" {
        return Ok(None);
    }
    status.parse::<T>().map(Some).map_err(anyhow::Error::msg)
}

fn list_claims(config: &Config, status: &str, format: &str) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let status: Option<ClaimStatus> = parse_filter(status)?;
    let claims: Vec<Claim> = revenue_cycle::storage::claims::list_claims(db.conn(), status)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&claims)?);
        return Ok(());
    }

    if claims.is_empty() {
        println!("No claims found");
        return Ok(());
    }

    let widths = [14, 16, 14, 14, 14, 24];
    utils::print_table_border(106);
    utils::print_table_row(
        &["Claim", "Status", "Charged", "Paid", "Patient", "Tracking"],
        &widths,
    );
    utils::print_table_border(106);
    for claim in &claims {
        utils::print_table_row(
            &[
                &claim.claim_number,
                &utils::colorize_claim_status(claim.status),
                &utils::format_amount(claim.total_charge_amount),
                &utils::format_amount(claim.total_paid_amount),
                &utils::format_amount(claim.patient_responsibility),
                &utils::truncate_middle(claim.clearinghouse_claim_id.as_deref().unwrap_or("-"), 24),
            ],
            &widths,
        );
    }
    utils::print_table_border(106);
    println!("{} claims", claims.len());
    Ok(())
}

fn import_remittance(config: &Config, file: &Path, format: &str, actor: &Actor) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let reconciler = Reconciler::new(&db, TracingAuditLog, config.billing.clone());

    let outcome: BatchOutcome = reconciler
        .import_remittance_file(file, actor)
        .with_context(|| format!("importing {}", file.display()))?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("\n{}", "=== Remittance Summary ===".cyan().bold());
    println!("Posted:          {}", outcome.processed_count.to_string().green());
    println!("Failed:          {}", outcome.errors.len().to_string().red());
    println!("Paid:            {}", utils::format_amount(outcome.posted_amount));
    println!("Denials created: {}", outcome.denials_created.to_string().yellow());

    if !outcome.errors.is_empty() {
        println!("\n{}", "Errors:".red());
        for err in &outcome.errors {
            println!("  {} - {}", err.claim_number, err.error_message);
        }
    }
    Ok(())
}

fn list_denials(config: &Config, status: &str, overdue: bool, format: &str) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let manager = DenialManager::new(&db, TracingAuditLog);

    let denials: Vec<Denial> = if overdue {
        manager.overdue_denials(Utc::now().date_naive())?
    } else {
        let status: Option<DenialStatus> = parse_filter(status)?;
        manager.list_denials(status)?
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&denials)?);
        return Ok(());
    }

    if denials.is_empty() {
        println!("No denials found");
        return Ok(());
    }

    let widths = [6, 8, 12, 14, 12, 40];
    utils::print_table_border(102);
    utils::print_table_row(&["Id", "Claim", "Status", "Amount", "Deadline", "Reason"], &widths);
    utils::print_table_border(102);
    for denial in &denials {
        utils::print_table_row(
            &[
                &denial.id.to_string(),
                &denial.claim_id.to_string(),
                &utils::colorize_denial_status(denial.status),
                &utils::format_amount(denial.denied_amount),
                &utils::format_optional_date(denial.appeal_deadline),
                &format!(
                    "{} {}",
                    denial.code,
                    utils::truncate_middle(&denial.reason_description, 34)
                ),
            ],
            &widths,
        );
    }
    utils::print_table_border(102);
    Ok(())
}

fn file_appeal(
    config: &Config,
    denial_id: i64,
    reason: &str,
    documents: Vec<String>,
    deadline: chrono::NaiveDate,
    actor: &Actor,
) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let appeal = DenialManager::new(&db, TracingAuditLog)
        .create_appeal(denial_id, reason, documents, deadline, actor)?;
    println!(
        "{}",
        format!("✓ Appeal {} filed on denial {} (deadline {})", appeal.id, denial_id, deadline).green()
    );
    Ok(())
}

fn resolve_denial(config: &Config, denial_id: i64, resolution: &str, yes: bool, actor: &Actor) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let manager = DenialManager::new(&db, TracingAuditLog)
        .allow_direct_resolution(config.billing.allow_direct_resolution);

    if !yes && !utils::confirm_action(&format!("Resolve denial {} as \"{}\"?", denial_id, resolution)) {
        println!("Cancelled");
        return Ok(());
    }

    let denial = manager.resolve_denial(denial_id, resolution, actor)?;
    println!("{}", format!("✓ Denial {} resolved", denial.id).green());
    Ok(())
}

fn show_stats(config: &Config, format: &str) -> anyhow::Result<()> {
    let db = open_database(config)?;
    let stats = db.get_stats()?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== Revenue Cycle Statistics ===".cyan().bold());
    println!("\nClaims:");
    for (status, count) in &stats.claims_by_status {
        println!("  {:<16} {}", utils::colorize_claim_status(*status), count);
    }

    println!("\nMoney:");
    println!("  Charged:        {}", utils::format_amount(stats.total_charged));
    println!("  Paid:           {}", utils::format_amount(stats.total_paid));
    println!("  Adjusted:       {}", utils::format_amount(stats.total_adjusted));

    println!("\nWork queues:");
    println!("  Pending charges: {}", stats.pending_charges.to_string().yellow());
    println!("  Open denials:    {}", stats.open_denials.to_string().red());
    Ok(())
}
