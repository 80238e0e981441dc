#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use hourbook_engines::config::ConfigStore;
use hourbook_engines::render::renderer_for_path;
use hourbook_os::summary::SummaryPeriod;
use hourbook_os::workflow::{InvoiceWorkflow, LedgerStatus, RenderedInvoice};
use hourbook_storage::Ledger;

const DEFAULT_INVOICE_FILE: &str = "invoice.pdf";

/// Track billable hours and issue gapless, sequential invoices.
#[derive(Debug, Parser)]
#[command(name = "hourbook", version)]
pub struct Cli {
    /// Ledger file (default: $HOURBOOK_LEDGER_PATH or the XDG data dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub ledger: Option<PathBuf>,
    /// Settings file (default: $HOURBOOK_CONFIG_PATH or the XDG config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record hours for a day, replacing any earlier record for it
    Log {
        /// YYYY-MM-DD, today, yesterday, tomorrow or daybefore
        date: String,
        #[arg(allow_negative_numbers = true)]
        hours: f64,
        description: Vec<String>,
    },
    /// Hours worked in the current day, week, month or year
    Summary { period: String },
    /// Generate the next invoice draft, or re-render a confirmed one
    Invoice {
        /// Last day to bill (default: today)
        #[arg(conflicts_with = "regenerate")]
        end_date: Option<String>,
        /// Confirmed invoice to render again
        #[arg(long, value_name = "NUMBER")]
        regenerate: Option<String>,
        /// Output file; `.pdf` renders PDF, anything else plain text
        #[arg(short, long, default_value = DEFAULT_INVOICE_FILE)]
        output: PathBuf,
    },
    /// Mark the pending draft as sent and close its billing period
    Confirm { number: String },
    /// Show confirmed history, the pending draft and what comes next
    Status,
    /// Inspect or edit settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default settings file if none exists
    Init,
    Show,
    Path,
    /// Set one field, e.g. `payment.hourly_rate 85`
    Set { key: String, value: String },
}

/// Where state lives and what "now" is for one invocation.
#[derive(Debug, Clone)]
pub struct CliContext {
    pub ledger_path: Option<PathBuf>,
    pub config: ConfigStore,
    pub now: NaiveDateTime,
}

impl CliContext {
    pub fn from_cli(cli: &Cli, now: NaiveDateTime) -> Self {
        Self {
            ledger_path: cli.ledger.clone(),
            config: cli
                .config
                .clone()
                .map(ConfigStore::for_path)
                .unwrap_or_else(ConfigStore::default_local),
            now,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    fn open_ledger(&self) -> Result<Ledger, String> {
        let opened = match &self.ledger_path {
            Some(path) => Ledger::open(path.as_path()),
            None => Ledger::open_default(),
        };
        opened.map_err(|e| format!("failed to open ledger: {e}"))
    }

    fn workflow(&self) -> Result<InvoiceWorkflow<Ledger>, String> {
        let settings = self
            .config
            .load_or_default()
            .map_err(|e| format!("failed to load settings: {e}"))?;
        InvoiceWorkflow::new(self.open_ledger()?, settings).map_err(|e| e.to_string())
    }
}

/// Resolves a date argument. Unknown input is an error, never today.
pub fn parse_date(raw: &str, today: NaiveDate) -> Result<NaiveDate, String> {
    let one_day = Days::new(1);
    let resolved = match raw.trim().to_ascii_lowercase().as_str() {
        "today" => Some(today),
        "yesterday" => today.checked_sub_days(one_day),
        "tomorrow" => today.checked_add_days(one_day),
        "daybefore" => today.checked_sub_days(Days::new(2)),
        other => {
            return NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| {
                format!(
                    "invalid date '{raw}'. expected YYYY-MM-DD, today, yesterday, tomorrow or daybefore"
                )
            })
        }
    };
    resolved.ok_or_else(|| format!("date '{raw}' is outside the supported calendar"))
}

pub fn execute(command: &Commands, ctx: &CliContext) -> Result<String, String> {
    match command {
        Commands::Log {
            date,
            hours,
            description,
        } => {
            let date = parse_date(date, ctx.today())?;
            let description = Some(description.join(" ")).filter(|d| !d.trim().is_empty());
            let mut wf = ctx.workflow()?;
            let replaced = wf.ledger().entry_on(date).is_some();
            let entry = wf
                .log_work(date, *hours, description, ctx.now)
                .map_err(|e| e.to_string())?;
            let verb = if replaced { "Updated" } else { "Logged" };
            Ok(format!("{verb} {:.2} hours for {}", entry.hours, entry.date))
        }
        Commands::Summary { period } => {
            let period: SummaryPeriod = period.parse().map_err(|e| format!("{e}"))?;
            let summary = ctx
                .workflow()?
                .summary(period, ctx.today())
                .map_err(|e| e.to_string())?;
            if summary.is_empty() {
                return Ok(format!(
                    "No work recorded between {} and {}",
                    summary.start, summary.end
                ));
            }
            let mut out = vec![format!(
                "Work summary ({}): {} to {}",
                summary.period, summary.start, summary.end
            )];
            out.extend(
                summary
                    .days
                    .iter()
                    .map(|d| format!("{}  {:>6.2}  {}", d.date, d.hours, d.description)),
            );
            out.push(format!("Total: {:.2} hours", summary.total_hours));
            Ok(out.join("\n"))
        }
        Commands::Invoice {
            end_date,
            regenerate,
            output,
        } => {
            let renderer = renderer_for_path(output);
            let mut wf = ctx.workflow()?;
            let rendered = match regenerate {
                Some(raw) => wf.regenerate(raw, ctx.today(), renderer.as_ref()),
                None => {
                    let end = end_date
                        .as_deref()
                        .map(|raw| parse_date(raw, ctx.today()))
                        .transpose()?;
                    wf.generate(end, ctx.today(), renderer.as_ref())
                }
            }
            .map_err(|e| e.to_string())?;
            write_output(output, &rendered.bytes)?;
            Ok(describe_invoice(
                &rendered,
                output,
                &wf.settings().payment.currency,
                regenerate.is_some(),
            ))
        }
        Commands::Confirm { number } => {
            let confirmed = ctx
                .workflow()?
                .confirm(number)
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "Invoice #{} confirmed for {} to {}\nNext invoice starts {}",
                confirmed.invoice_id,
                confirmed.record.start_date,
                confirmed.record.end_date,
                confirmed.next_start
            ))
        }
        Commands::Status => {
            let wf = ctx.workflow()?;
            let status = wf.status().map_err(|e| e.to_string())?;
            Ok(describe_status(&wf, &status))
        }
        Commands::Config { action } => execute_config(action, &ctx.config),
    }
}

fn execute_config(action: &ConfigCommand, store: &ConfigStore) -> Result<String, String> {
    let path = store.path().display();
    match action {
        ConfigCommand::Init => {
            let created = store
                .ensure_exists()
                .map_err(|e| format!("failed to write settings: {e}"))?;
            if created {
                Ok(format!("Created settings at {path}"))
            } else {
                Ok(format!("Settings already exist at {path}"))
            }
        }
        ConfigCommand::Show => {
            let settings = store
                .load_or_default()
                .map_err(|e| format!("failed to load settings: {e}"))?;
            serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())
        }
        ConfigCommand::Path => Ok(path.to_string()),
        ConfigCommand::Set { key, value } => {
            store
                .set_value(key, value)
                .map_err(|e| format!("failed to set {key}: {e}"))?;
            Ok(format!("Set {key} = {value}"))
        }
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
    }
    fs::write(path, bytes).map_err(|e| format!("failed to write {}: {e}", path.display()))
}

fn describe_invoice(
    rendered: &RenderedInvoice,
    output: &Path,
    currency: &str,
    regenerated: bool,
) -> String {
    let mut out = vec![
        format!(
            "Invoice #{} {}: {}",
            rendered.invoice_id,
            if regenerated { "regenerated" } else { "generated" },
            output.display()
        ),
        format!(
            "Period: {} to {}",
            rendered.period.start(),
            rendered.period.end()
        ),
        format!(
            "Entries: {}, total {:.2} hours, {} {:.2} due",
            rendered.entry_count, rendered.total_hours, currency, rendered.total_amount
        ),
    ];
    if rendered.entries_changed {
        out.push("Warning: work entries changed since this invoice was confirmed".to_string());
    }
    if !regenerated {
        out.push(format!(
            "Run `hourbook confirm {}` once the invoice has been sent",
            rendered.invoice_id
        ));
    }
    out.join("\n")
}

fn describe_status(wf: &InvoiceWorkflow<Ledger>, status: &LedgerStatus) -> String {
    let mut out = Vec::new();
    match &status.last_confirmed {
        Some(r) => out.push(format!(
            "Last confirmed: #{} ({} to {})",
            wf.invoice_id(r.invoice_number),
            r.start_date,
            r.end_date
        )),
        None => out.push("Last confirmed: none".to_string()),
    }
    match &status.pending_draft {
        Some(r) => out.push(format!(
            "Pending draft:  #{} ({} to {})",
            wf.invoice_id(r.invoice_number),
            r.start_date,
            r.end_date
        )),
        None => out.push("Pending draft:  none".to_string()),
    }
    out.push(format!(
        "Next number:    #{}",
        wf.invoice_id(status.next_number)
    ));
    match status.next_start {
        Some(d) => out.push(format!("Next start:     {d}")),
        None => out.push("Next start:     no work recorded yet".to_string()),
    }
    out.join("\n")
}
