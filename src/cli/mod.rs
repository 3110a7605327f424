use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "worktrace",
    version,
    about = "Employee activity tracker & dashboard analytics API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API and the daily rollup scheduler
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    Status,
    Doctor,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Employee {
        #[command(subcommand)]
        command: EmployeeCommands,
    },
    /// Summaries and reports for every employee
    Rollup {
        #[arg(long)]
        date: Option<String>,
    },
    Report {
        #[arg(long)]
        employee: String,
        #[arg(long)]
        date: Option<String>,
    },
    Summary {
        #[arg(long)]
        employee: String,
        #[arg(long)]
        date: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}

#[derive(Debug, Subcommand)]
pub enum EmployeeCommands {
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long, default_value = "")]
        organization: String,
    },
    List,
}
