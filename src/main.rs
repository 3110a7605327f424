mod analyzer;
mod api;
mod cli;
mod collector;
mod config;
mod db;
mod scheduler;

use crate::analyzer::categorizer::CategoryRules;
use crate::analyzer::summary;
use crate::cli::{Cli, Commands, ConfigCommands, EmployeeCommands};
use crate::config::Config;
use crate::db::{Database, EmployeeInput};
use crate::scheduler::RollupSchedule;
use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            let mut config = load_or_default_config()?;
            if let Some(port) = port {
                config.api_port = port;
            }
            run_service(config).await
        }
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Config { command } => handle_config_command(command),
        Commands::Employee { command } => handle_employee_command(command),
        Commands::Rollup { date } => handle_rollup(date),
        Commands::Report { employee, date } => handle_report(&employee, date),
        Commands::Summary { employee, date } => handle_summary(&employee, date),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_or_default_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_employee_command(command: EmployeeCommands) -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;

    match command {
        EmployeeCommands::Add {
            id,
            email,
            first_name,
            last_name,
            organization,
        } => {
            let input = EmployeeInput {
                employee_id: id,
                organization_id: organization,
                first_name,
                last_name,
                email,
            };
            input.validate()?;

            match database.insert_employee(&input)? {
                Some(employee) => {
                    println!("Employee registered: {}", employee.employee_id);
                    Ok(())
                }
                None => bail!(
                    "Employee already registered: {} / {}",
                    input.employee_id,
                    input.email
                ),
            }
        }
        EmployeeCommands::List => {
            let employees = database.list_employees()?;
            if employees.is_empty() {
                println!("No employees registered");
            }
            for employee in employees {
                println!(
                    "{}\t{}\t{}",
                    employee.employee_id,
                    employee.full_name(),
                    employee.email
                );
            }
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_or_default_config()?;
    let database = Database::open(&config.db_path)?;

    println!("WorkTrace status");
    println!(
        "- api: {} (port {})",
        if is_port_open(config.api_port) {
            "listening"
        } else {
            "not running"
        },
        config.api_port
    );
    println!("- employees: {}", database.list_employees()?.len());
    println!(
        "- last_event_at: {}",
        database
            .latest_event_timestamp()?
            .map(|timestamp| timestamp.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!(
        "- latest_report_date: {}",
        database
            .latest_report_meta()?
            .map(|meta| meta.date)
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- rollup_time: {}", config.rollup_time);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error:#}");
            issues.push("db unreachable");
        }
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing");
    }

    match CategoryRules::load(&config.categories_path) {
        Ok(rules) => println!(
            "[OK] category rules valid: {} apps, {} domains",
            rules.apps.len(),
            rules.domains.len()
        ),
        Err(error) => {
            println!("[WARN] category rules invalid: {error:#}");
            issues.push("invalid categories");
        }
    }

    match RollupSchedule::parse(&config.rollup_time) {
        Ok(schedule) => println!(
            "[OK] rollup_time valid: {} ({})",
            config.rollup_time,
            schedule.cron_expression()
        ),
        Err(error) => {
            println!("[WARN] invalid rollup_time setting: {error:#}");
            issues.push("invalid rollup_time");
        }
    }

    match config.daily_target_seconds() {
        Ok(seconds) => println!("[OK] daily_target: {} ({seconds}s)", config.daily_target),
        Err(error) => {
            println!("[WARN] {error:#}");
            issues.push("invalid daily_target");
        }
    }

    if config.time_bar_bucket_minutes == 0 || 24 * 60 % config.time_bar_bucket_minutes != 0 {
        println!(
            "[WARN] time_bar_bucket_minutes does not divide a day: {}",
            config.time_bar_bucket_minutes
        );
        issues.push("invalid bucket width");
    } else {
        println!(
            "[OK] time bar buckets: {} minutes",
            config.time_bar_bucket_minutes
        );
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_rollup(date: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let target_date = parse_optional_date(date)?;

    let outcome = analyzer::rollup_day(&config, target_date)?;
    println!("Rollup finished: {target_date}");
    println!("- reports: {}", outcome.reports);
    println!("- failed: {}", outcome.failed);
    println!("- purged events: {}", outcome.purged);

    Ok(())
}

fn handle_report(employee_id: &str, date: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let target_date = parse_optional_date(date)?;
    let database = Database::open(&config.db_path)?;
    let employee = database
        .employee(employee_id)?
        .with_context(|| format!("Unknown employee: {employee_id}"))?;

    let (report, saved) =
        analyzer::generate_and_store_report(&config, &database, &employee, target_date)?;

    println!("Report generated: {} ({})", report.date, report.employee_id);
    println!("- Markdown: {}", saved.markdown_path.display());
    println!("- JSON: {}", saved.json_path.display());

    Ok(())
}

fn handle_summary(employee_id: &str, date: Option<String>) -> Result<()> {
    let config = load_or_default_config()?;
    let target_date = parse_optional_date(date)?;
    let database = Database::open(&config.db_path)?;
    let employee = database
        .employee(employee_id)?
        .with_context(|| format!("Unknown employee: {employee_id}"))?;

    let row = analyzer::refresh_summary(&database, employee_id, target_date)?;
    let details = summary::basic_details(&employee, &row);

    println!("{} - {}", details.employee_name, details.date);
    println!(
        "- start / last seen: {} / {}",
        details.start_time.as_deref().unwrap_or("-"),
        details.last_seen_time.as_deref().unwrap_or("-")
    );
    println!("- working: {}", details.working_time.display_text());
    println!("- productive: {}", details.productive_time.display_text());
    println!("- neutral: {}", details.neutral_time.display_text());
    println!(
        "- non-productive: {}",
        details.non_productive_time.display_text()
    );
    println!("- away: {}", details.away_time.display_text());
    println!("- productivity ratio: {:.1}%", details.productivity_ratio);

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let config_path = Config::config_path()?;
    let shared_config = Arc::new(config);
    let scheduler_config = Arc::clone(&shared_config);
    let scheduler_schedule_fallback = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);

    info!("WorkTrace service started");

    tokio::select! {
        scheduler_result = scheduler::run_rollup_scheduler(move || {
            let rollup_time = Config::load()
                .map(|runtime| runtime.rollup_time)
                .unwrap_or_else(|_| scheduler_schedule_fallback.rollup_time.clone());

            RollupSchedule::parse(&rollup_time)
        }, move |date| {
            let config = Arc::clone(&scheduler_config);
            async move {
                let runtime_config = Config::load().unwrap_or_else(|_| (*config).clone());
                analyzer::scheduled_rollup(&runtime_config, date).map(|_| ())
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config, config_path) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-10-19"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    if Config::config_path()?.exists() {
        return Config::load();
    }

    let config = Config::default();
    config.ensure_bootstrap_files()?;
    config.save()?;
    Ok(config)
}

fn is_port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}
