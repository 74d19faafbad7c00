//! Plain-text renderer: a short header followed by an aligned region table.

use std::fmt::Write as _;

use crate::ReportModel;

const HEADERS: [&str; 7] = ["Region", "Abbr", "Weight", "Basis", "Leader", "Tier", "Margin"];

fn cells(m: &ReportModel) -> Vec<[String; 7]> {
    m.regions
        .iter()
        .map(|r| {
            [
                r.region.clone(),
                r.abbreviation.clone().unwrap_or_default(),
                r.weight.to_string(),
                r.basis.to_string(),
                r.leader.clone().unwrap_or_else(|| "-".into()),
                r.tier.to_string(),
                r.margin_text.clone(),
            ]
        })
        .collect()
}

fn push_row(out: &mut String, row: &[&str], widths: &[usize; 7], tail: Option<&str>) {
    let mut line = String::new();
    for (i, cell) in row.iter().enumerate() {
        let _ = write!(line, "{:<w$}  ", cell, w = widths[i]);
    }
    if let Some(t) = tail {
        line.push_str(t);
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Render `model` as plain lines.
pub fn render_text(model: &ReportModel) -> String {
    let s = &model.summary;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Projection as of {} (window {} days, swing {}, seed {})",
        s.as_of, s.window_days, s.swing, s.seed
    );
    let _ = writeln!(out, "{}", s.tally_text);
    if let Some(p) = &s.win_probability_text {
        let _ = writeln!(out, "Win Probability: {p}");
    }
    if let Some(t) = &s.trials_text {
        let _ = writeln!(out, "Simulation: {t}");
    }
    for n in &s.notes {
        let _ = writeln!(out, "note: {n}");
    }

    let rows = cells(model);
    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.len());
        }
    }

    out.push('\n');
    push_row(&mut out, &HEADERS, &widths, Some("Win Probability"));
    for (row, region) in rows.iter().zip(&model.regions) {
        let refs: Vec<&str> = row.iter().map(String::as_str).collect();
        push_row(&mut out, &refs, &widths, region.win_probability_text.as_deref());
    }

    if !model.history.is_empty() {
        out.push('\n');
        for h in &model.history {
            let _ = writeln!(
                out,
                "history: {:>3} days (swing {}): {}",
                h.window_days,
                h.swing,
                h.win_probability_text.as_deref().unwrap_or("-")
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_model;
    use crate::fixtures::{projection, table};

    #[test]
    fn text_has_header_notes_and_one_line_per_region() {
        let text = render_text(&build_model(&projection(), &table()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Projection as of 2024-11-01 (window 15 days, swing -1.50, seed 7)");
        assert_eq!(lines[1], "EV: A: 300, B: 10");
        assert_eq!(lines[2], "Win Probability: A: 99.60%");
        assert!(text.contains("note: priors unavailable (timeout)"));

        let north = lines.iter().find(|l| l.starts_with("Northland")).unwrap();
        assert!(north.contains("solid_favorable"));
        assert!(north.ends_with("A: 99.70%"));
        let east = lines.iter().find(|l| l.starts_with("Eastmark")).unwrap();
        assert!(east.ends_with("-10.00"));
        assert!(!text.contains("history:"));
    }
}
