use anyhow::{Context, Result};
use roster_core::roster::{MonthRoster, rule_label};
use roster_core::{GeneratedOccurrence, RecurringRule, RuleOverride, format_date};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct VaultPaths {
    pub root: PathBuf,
    pub index_dir: PathBuf,
    pub rosters_dir: PathBuf,
}

impl VaultPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            index_dir: root.join("00_Index"),
            rosters_dir: root.join("Rosters"),
            root,
        }
    }

    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.index_dir)?;
        fs::create_dir_all(&self.rosters_dir)?;
        Ok(())
    }

    pub fn month_note(&self, month: &str) -> PathBuf {
        self.rosters_dir.join(format!("{month}.md"))
    }
}

/// Writes the month note and regenerates the roster index.
pub fn export_month(roster: &MonthRoster<'_>, vault_root: &Path) -> Result<PathBuf> {
    let paths = VaultPaths::new(vault_root);
    paths.ensure()?;

    let month = roster.month.to_string();
    let note_path = paths.month_note(&month);
    fs::write(&note_path, render_month_note(roster))
        .with_context(|| format!("writing {}", note_path.display()))?;

    write_index(&paths)?;
    info!(month = %month, path = %note_path.display(), "roster note exported");
    Ok(note_path)
}

pub fn render_month_note(roster: &MonthRoster<'_>) -> String {
    let month = roster.month.to_string();
    let overrides = roster.musicians.iter().filter(|o| o.is_override).count()
        + roster.psalmists.iter().filter(|o| o.is_override).count();

    let mut md = String::new();
    md.push_str("---\n");
    md.push_str(&format!("month: {month}\n"));
    md.push_str(&format!("musician_duties: {}\n", roster.musicians.len()));
    md.push_str(&format!("psalmist_duties: {}\n", roster.psalmists.len()));
    md.push_str(&format!("overrides: {overrides}\n"));
    md.push_str("---\n\n");

    md.push_str(&format!("# Roster {month}\n\n"));

    md.push_str("## Musicians\n\n");
    push_table(&mut md, &roster.musicians, "Musicians");

    md.push_str("\n## Psalmists\n\n");
    push_table(&mut md, &roster.psalmists, "Psalmist");

    md
}

fn push_table<R, O>(md: &mut String, occurrences: &[GeneratedOccurrence<'_, R, O>], people_header: &str)
where
    R: RecurringRule,
    O: RuleOverride,
{
    if occurrences.is_empty() {
        md.push_str("_No duties this month._\n");
        return;
    }

    md.push_str(&format!(
        "| Date | Rule | Time | Community | {people_header} | Notes |\n"
    ));
    md.push_str("|---|---|---|---|---|---|\n");
    for occurrence in occurrences {
        let details = occurrence.assignment();
        let mut label = rule_label(occurrence.rule);
        if occurrence.is_override {
            label.push_str(" (override)");
        }
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            format_date(occurrence.date),
            label,
            cell(details.time()),
            cell(details.community()),
            cell(&details.people()),
            cell(details.observations().unwrap_or(""))
        ));
    }
}

/// Table cells cannot hold pipes or newlines.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn write_index(paths: &VaultPaths) -> Result<()> {
    let mut months: Vec<String> = fs::read_dir(&paths.rosters_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                return None;
            }
            Some(path.file_stem()?.to_str()?.to_string())
        })
        .collect();
    months.sort();
    months.reverse();

    let mut lines: Vec<String> = Vec::new();
    lines.push("# MOC - Rosters".to_string());
    lines.push(String::new());
    lines.push("This index is generated. Do not edit manually.".to_string());
    lines.push(String::new());
    if months.is_empty() {
        lines.push("_No rosters exported._".to_string());
    } else {
        lines.extend(
            months
                .iter()
                .map(|month| format!("- [[Rosters/{month}|{month}]]")),
        );
    }

    fs::write(paths.index_dir.join("MOC - Rosters.md"), lines.join("\n"))?;
    Ok(())
}
