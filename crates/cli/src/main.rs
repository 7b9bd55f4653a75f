use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use roster_core::config::{DEFAULT_CONFIG_FILE, RosterConfig};
use roster_core::import::{RosterSeed, import_seed};
use roster_core::roster::{rule_label, weekday_label};
use roster_core::schema::{
    Musician, RecurringSalmistSchedule, RecurringSchedule, SalmistScheduleOverride,
    ScheduleOverride, ScheduleType,
};
use roster_core::{
    Assignment, GeneratedOccurrence, MonthRoster, RecurringRule, RuleOverride, YearMonth, db,
    format_date, new_id, resolve_occurrence_date,
};
use rusqlite::Connection;
use schemars::schema_for;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Parish music ministry roster CLI", long_about = None)]
struct Cli {
    /// Config file (default: ./roster.toml)
    #[arg(long, global = true, env = "ROSTER_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// SQLite database path, overrides the config file
    #[arg(long, global = true, env = "ROSTER_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export JSON Schemas to the ./schemas directory
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Recurring musician duties
    Rule {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Recurring psalmist duties
    Salmist {
        #[command(subcommand)]
        command: SalmistCommands,
    },
    /// One-month replacements of musician duties
    Override {
        #[command(subcommand)]
        command: OverrideCommands,
    },
    /// One-month replacements of psalmist duties
    SalmistOverride {
        #[command(subcommand)]
        command: SalmistOverrideCommands,
    },
    /// Show or export the roster of a month
    Month {
        #[command(subcommand)]
        command: MonthCommands,
    },
    /// Load rules and overrides from a YAML seed file
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for persisted records
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[derive(Args)]
struct Recurrence {
    /// Which occurrence of the weekday in the month (1-5)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    week: u8,
    /// Weekday, 0 = Sunday .. 6 = Saturday
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    day: u8,
    /// First month the rule applies (default: current month)
    #[arg(long)]
    start_month: Option<YearMonth>,
}

#[derive(Args)]
struct MusicianFields {
    #[arg(long)]
    time: Option<String>,
    #[arg(long = "type")]
    schedule_type: Option<ScheduleType>,
    #[arg(long)]
    community: Option<String>,
    /// Repeat for each musician
    #[arg(long = "musician")]
    musicians: Vec<String>,
    #[arg(long)]
    observations: Option<String>,
}

#[derive(Args)]
struct SalmistFields {
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    community: Option<String>,
    #[arg(long)]
    psalmist: Option<String>,
    #[arg(long)]
    observations: Option<String>,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Create a recurring musician duty
    Add {
        #[command(flatten)]
        recurrence: Recurrence,
        #[command(flatten)]
        fields: MusicianFields,
    },
    /// Change fields of a recurring musician duty
    Edit {
        id: String,
        #[command(flatten)]
        recurrence: RecurrenceEdit,
        #[command(flatten)]
        fields: MusicianFields,
    },
    List,
    /// Flip a duty between active and inactive
    Toggle { id: String },
    /// Delete a duty together with its overrides
    Delete { id: String },
}

#[derive(Subcommand)]
enum SalmistCommands {
    /// Create a recurring psalmist duty
    Add {
        #[command(flatten)]
        recurrence: Recurrence,
        #[command(flatten)]
        fields: SalmistFields,
    },
    /// Change fields of a recurring psalmist duty
    Edit {
        id: String,
        #[command(flatten)]
        recurrence: RecurrenceEdit,
        #[command(flatten)]
        fields: SalmistFields,
    },
    List,
    Toggle { id: String },
    Delete { id: String },
}

#[derive(Args)]
struct RecurrenceEdit {
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
    week: Option<u8>,
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    day: Option<u8>,
    #[arg(long)]
    start_month: Option<YearMonth>,
}

#[derive(Subcommand)]
enum OverrideCommands {
    /// Replace a musician duty for one month; unset fields are copied from the rule
    Add {
        #[arg(long)]
        rule: String,
        #[arg(long)]
        month: YearMonth,
        /// Defaults to the rule's date in that month
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: MusicianFields,
    },
    Edit {
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: MusicianFields,
    },
    Delete { id: String },
}

#[derive(Subcommand)]
enum SalmistOverrideCommands {
    /// Replace a psalmist duty for one month; unset fields are copied from the rule
    Add {
        #[arg(long)]
        rule: String,
        #[arg(long)]
        month: YearMonth,
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: SalmistFields,
    },
    Edit {
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: SalmistFields,
    },
    Delete { id: String },
}

#[derive(Args)]
struct MonthSelection {
    /// YYYY-MM (default: current month)
    #[arg(long)]
    month: Option<YearMonth>,
    #[arg(long)]
    community: Option<String>,
}

#[derive(Subcommand)]
enum MonthCommands {
    Show {
        #[command(flatten)]
        selection: MonthSelection,
        #[arg(long)]
        json: bool,
    },
    /// Show the month after --month
    Next {
        #[command(flatten)]
        selection: MonthSelection,
    },
    /// Show the month before --month
    Prev {
        #[command(flatten)]
        selection: MonthSelection,
    },
    /// Write the month's roster note into a notes vault
    Export {
        #[command(flatten)]
        selection: MonthSelection,
        #[arg(long)]
        vault: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RosterConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_tracing(&config);
    if !cli.config.exists() {
        warn!(path = %cli.config.display(), "config file not found, using defaults");
    }

    match cli.command {
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::Rule { command } => musician_rule_command(&open_db(cli.db, &config)?, command),
        Commands::Salmist { command } => salmist_rule_command(&open_db(cli.db, &config)?, command),
        Commands::Override { command } => {
            musician_override_command(&open_db(cli.db, &config)?, command)
        }
        Commands::SalmistOverride { command } => {
            salmist_override_command(&open_db(cli.db, &config)?, command)
        }
        Commands::Month { command } => month_command(&open_db(cli.db, &config)?, &config, command),
        Commands::Import { file } => import_command(&mut open_db(cli.db, &config)?, &file),
    }
}

fn open_db(db: Option<PathBuf>, config: &RosterConfig) -> Result<Connection> {
    let db_path = db.unwrap_or_else(|| config.database.path.clone());
    let db_path = db_path.to_str().context("database path is not valid UTF-8")?;
    let conn = db::open(db_path)?;
    debug!(db_path, "opened roster database");
    Ok(conn)
}

fn init_tracing(config: &RosterConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    write_schema(&out_dir, "RecurringSchedule", &schema_for!(RecurringSchedule))?;
    write_schema(&out_dir, "ScheduleOverride", &schema_for!(ScheduleOverride))?;
    write_schema(
        &out_dir,
        "RecurringSalmistSchedule",
        &schema_for!(RecurringSalmistSchedule),
    )?;
    write_schema(
        &out_dir,
        "SalmistScheduleOverride",
        &schema_for!(SalmistScheduleOverride),
    )?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

fn write_schema(out_dir: &Path, name: &str, schema: &schemars::schema::RootSchema) -> Result<()> {
    let json = serde_json::to_string_pretty(schema)?;
    fs::write(out_dir.join(format!("{name}.schema.json")), json)?;
    Ok(())
}

fn current_month() -> Result<YearMonth> {
    Ok(YearMonth::from_date(OffsetDateTime::now_utc().date())?)
}

/// `base` moved by `shift` months (only -1, 0 and 1 are used).
fn shifted_month(base: YearMonth, shift: i8) -> Result<YearMonth> {
    let month = match shift {
        1 => base.next()?,
        -1 => base.previous()?,
        _ => base,
    };
    Ok(month)
}

fn required(value: Option<String>, flag: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("--{flag} is required"),
    }
}

fn to_musicians(names: Vec<String>) -> Vec<Musician> {
    names
        .into_iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| Musician { name })
        .collect()
}

/// Date of `rule` in `month`, formatted, when it has one.
fn default_override_date<R: RecurringRule>(rule: &R, month: YearMonth) -> Result<String> {
    let date = resolve_occurrence_date(
        month.year(),
        month.month(),
        rule.week_of_month(),
        rule.day_of_week(),
    )?;
    match date {
        Some(date) => Ok(format_date(date)),
        None => bail!(
            "{} has no occurrence in {month}; pass --date",
            rule_label(rule)
        ),
    }
}

fn musician_rule_command(conn: &Connection, command: RuleCommands) -> Result<()> {
    match command {
        RuleCommands::Add { recurrence, fields } => {
            let rule = RecurringSchedule {
                id: new_id(),
                week_of_month: recurrence.week,
                day_of_week: recurrence.day,
                time: required(fields.time, "time")?,
                schedule_type: fields.schedule_type.unwrap_or_default(),
                community: required(fields.community, "community")?,
                musicians: to_musicians(fields.musicians),
                observations: fields.observations,
                is_active: true,
                start_month: recurrence.start_month.map_or_else(current_month, Ok)?,
                created_at: String::new(),
            };
            db::insert_recurring_schedule(conn, &rule)?;
            println!("{}", rule.id);
        }
        RuleCommands::Edit {
            id,
            recurrence,
            fields,
        } => {
            let mut rule = db::get_recurring_schedule(conn, &id)?;
            rule.week_of_month = recurrence.week.unwrap_or(rule.week_of_month);
            rule.day_of_week = recurrence.day.unwrap_or(rule.day_of_week);
            rule.start_month = recurrence.start_month.unwrap_or(rule.start_month);
            if let Some(time) = fields.time {
                rule.time = time;
            }
            if let Some(schedule_type) = fields.schedule_type {
                rule.schedule_type = schedule_type;
            }
            if let Some(community) = fields.community {
                rule.community = community;
            }
            if !fields.musicians.is_empty() {
                rule.musicians = to_musicians(fields.musicians);
            }
            if fields.observations.is_some() {
                rule.observations = fields.observations;
            }
            db::update_recurring_schedule(conn, &rule)?;
        }
        RuleCommands::List => {
            for rule in db::list_recurring_schedules(conn)? {
                println!(
                    "{}  {:<14} {}  {:<10} {:<9} from {}{}  {}",
                    rule.id,
                    rule_label(&rule),
                    rule.time,
                    rule.community,
                    rule.schedule_type,
                    rule.start_month,
                    if rule.is_active { "" } else { " (inactive)" },
                    rule.people()
                );
            }
        }
        RuleCommands::Toggle { id } => {
            let rule = db::get_recurring_schedule(conn, &id)?;
            db::set_recurring_schedule_active(conn, &id, !rule.is_active)?;
        }
        RuleCommands::Delete { id } => db::delete_recurring_schedule(conn, &id)?,
    }
    Ok(())
}

fn salmist_rule_command(conn: &Connection, command: SalmistCommands) -> Result<()> {
    match command {
        SalmistCommands::Add { recurrence, fields } => {
            let rule = RecurringSalmistSchedule {
                id: new_id(),
                week_of_month: recurrence.week,
                day_of_week: recurrence.day,
                time: required(fields.time, "time")?,
                community: required(fields.community, "community")?,
                psalmist: required(fields.psalmist, "psalmist")?,
                observations: fields.observations,
                is_active: true,
                start_month: recurrence.start_month.map_or_else(current_month, Ok)?,
                created_at: String::new(),
            };
            db::insert_salmist_schedule(conn, &rule)?;
            println!("{}", rule.id);
        }
        SalmistCommands::Edit {
            id,
            recurrence,
            fields,
        } => {
            let mut rule = db::get_salmist_schedule(conn, &id)?;
            rule.week_of_month = recurrence.week.unwrap_or(rule.week_of_month);
            rule.day_of_week = recurrence.day.unwrap_or(rule.day_of_week);
            rule.start_month = recurrence.start_month.unwrap_or(rule.start_month);
            if let Some(time) = fields.time {
                rule.time = time;
            }
            if let Some(community) = fields.community {
                rule.community = community;
            }
            if let Some(psalmist) = fields.psalmist {
                rule.psalmist = psalmist;
            }
            if fields.observations.is_some() {
                rule.observations = fields.observations;
            }
            db::update_salmist_schedule(conn, &rule)?;
        }
        SalmistCommands::List => {
            for rule in db::list_salmist_schedules(conn)? {
                println!(
                    "{}  {:<14} {}  {:<10} from {}{}  {}",
                    rule.id,
                    rule_label(&rule),
                    rule.time,
                    rule.community,
                    rule.start_month,
                    if rule.is_active { "" } else { " (inactive)" },
                    rule.psalmist
                );
            }
        }
        SalmistCommands::Toggle { id } => {
            let rule = db::get_salmist_schedule(conn, &id)?;
            db::set_salmist_schedule_active(conn, &id, !rule.is_active)?;
        }
        SalmistCommands::Delete { id } => db::delete_salmist_schedule(conn, &id)?,
    }
    Ok(())
}

fn musician_override_command(
    conn: &Connection,
    command: OverrideCommands,
) -> Result<()> {
    match command {
        OverrideCommands::Add {
            rule,
            month,
            date,
            fields,
        } => {
            let rule = db::get_recurring_schedule(conn, &rule)?;
            let date = match date {
                Some(date) => date,
                None => default_override_date(&rule, month)?,
            };
            let entry = ScheduleOverride {
                id: new_id(),
                recurring_schedule_id: rule.id.clone(),
                specific_month: month,
                date,
                time: fields.time.unwrap_or_else(|| rule.time.clone()),
                schedule_type: fields.schedule_type.unwrap_or(rule.schedule_type),
                community: fields.community.unwrap_or_else(|| rule.community.clone()),
                musicians: if fields.musicians.is_empty() {
                    rule.musicians.clone()
                } else {
                    to_musicians(fields.musicians)
                },
                observations: fields.observations.or_else(|| rule.observations.clone()),
                created_at: String::new(),
            };
            db::insert_schedule_override(conn, &entry)?;
            println!("{}", entry.id);
        }
        OverrideCommands::Edit { id, date, fields } => {
            let mut entry = db::get_schedule_override(conn, &id)?;
            if let Some(date) = date {
                entry.date = date;
            }
            if let Some(time) = fields.time {
                entry.time = time;
            }
            if let Some(schedule_type) = fields.schedule_type {
                entry.schedule_type = schedule_type;
            }
            if let Some(community) = fields.community {
                entry.community = community;
            }
            if !fields.musicians.is_empty() {
                entry.musicians = to_musicians(fields.musicians);
            }
            if fields.observations.is_some() {
                entry.observations = fields.observations;
            }
            db::update_schedule_override(conn, &entry)?;
        }
        OverrideCommands::Delete { id } => db::delete_schedule_override(conn, &id)?,
    }
    Ok(())
}

fn salmist_override_command(
    conn: &Connection,
    command: SalmistOverrideCommands,
) -> Result<()> {
    match command {
        SalmistOverrideCommands::Add {
            rule,
            month,
            date,
            fields,
        } => {
            let rule = db::get_salmist_schedule(conn, &rule)?;
            let date = match date {
                Some(date) => date,
                None => default_override_date(&rule, month)?,
            };
            let entry = SalmistScheduleOverride {
                id: new_id(),
                recurring_salmist_schedule_id: rule.id.clone(),
                specific_month: month,
                date,
                time: fields.time.unwrap_or_else(|| rule.time.clone()),
                community: fields.community.unwrap_or_else(|| rule.community.clone()),
                psalmist: fields.psalmist.unwrap_or_else(|| rule.psalmist.clone()),
                observations: fields.observations.or_else(|| rule.observations.clone()),
                created_at: String::new(),
            };
            db::insert_salmist_override(conn, &entry)?;
            println!("{}", entry.id);
        }
        SalmistOverrideCommands::Edit { id, date, fields } => {
            let mut entry = db::get_salmist_override(conn, &id)?;
            if let Some(date) = date {
                entry.date = date;
            }
            if let Some(time) = fields.time {
                entry.time = time;
            }
            if let Some(community) = fields.community {
                entry.community = community;
            }
            if let Some(psalmist) = fields.psalmist {
                entry.psalmist = psalmist;
            }
            if fields.observations.is_some() {
                entry.observations = fields.observations;
            }
            db::update_salmist_override(conn, &entry)?;
        }
        SalmistOverrideCommands::Delete { id } => db::delete_salmist_override(conn, &id)?,
    }
    Ok(())
}

fn month_command(conn: &Connection, config: &RosterConfig, command: MonthCommands) -> Result<()> {
    let (selection, shift, json, vault) = match command {
        MonthCommands::Show { selection, json } => (selection, 0, json, None),
        MonthCommands::Next { selection } => (selection, 1, false, None),
        MonthCommands::Prev { selection } => (selection, -1, false, None),
        MonthCommands::Export { selection, vault } => (selection, 0, false, Some(vault)),
    };

    let base = selection.month.map_or_else(current_month, Ok)?;
    let month = shifted_month(base, shift)?;
    let community = selection
        .community
        .as_deref()
        .or(config.display.community.as_deref());

    let data = db::load_month(conn, month)?;
    let roster = MonthRoster::build(month, &data, community)?;
    debug!(
        month = %month,
        musicians = roster.musicians.len(),
        psalmists = roster.psalmists.len(),
        "month roster generated"
    );

    if let Some(vault) = vault {
        let path = notes::export_month(&roster, &vault)?;
        info!(path = %path.display(), "exported");
        println!("{}", path.display());
    } else if json {
        println!("{}", serde_json::to_string_pretty(&roster)?);
    } else {
        print_roster(&roster);
    }
    Ok(())
}

fn print_roster(roster: &MonthRoster<'_>) {
    println!("Roster {}", roster.month);
    println!();
    println!("Musicians");
    print_occurrences(&roster.musicians);
    println!();
    println!("Psalmists");
    print_occurrences(&roster.psalmists);
}

fn print_occurrences<R, O>(occurrences: &[GeneratedOccurrence<'_, R, O>])
where
    R: RecurringRule,
    O: RuleOverride,
{
    if occurrences.is_empty() {
        println!("  (none)");
        return;
    }
    for occurrence in occurrences {
        let details = occurrence.assignment();
        let weekday = weekday_label(occurrence.rule.day_of_week());
        println!(
            "  {} {:<9} {}  {:<10} {}{}",
            format_date(occurrence.date),
            weekday,
            details.time(),
            details.community(),
            details.people(),
            if occurrence.is_override { "  [override]" } else { "" }
        );
        if let Some(notes) = details.observations() {
            println!("      {notes}");
        }
    }
}

fn import_command(conn: &mut Connection, file: &Path) -> Result<()> {
    let seed = RosterSeed::load(file).with_context(|| format!("reading {}", file.display()))?;
    let summary = import_seed(conn, &seed)?;
    println!(
        "Imported {} rules, {} overrides, {} psalmist rules, {} psalmist overrides",
        summary.recurring_schedules,
        summary.schedule_overrides,
        summary.salmist_schedules,
        summary.salmist_overrides
    );
    Ok(())
}
