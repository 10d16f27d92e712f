use chrono::NaiveDateTime;

use crate::domain::{Punch, TIMESTAMP_FORMAT};

const FIELD_COUNT: usize = 4;

/// One line with exactly four fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRow {
    Accepted(Punch),
    Rejected { id: i64, diagnostic: String },
}

impl ParsedRow {
    pub fn id(&self) -> i64 {
        match self {
            ParsedRow::Accepted(punch) => punch.id,
            ParsedRow::Rejected { id, .. } => *id,
        }
    }
}

/// Result of parsing one ROC payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Four-field lines in payload order.
    pub rows: Vec<ParsedRow>,
    /// Number of newline-separated segments in the payload.
    pub line_count: usize,
}

impl ParseOutcome {
    pub fn accepted(&self) -> impl Iterator<Item = &Punch> {
        self.rows.iter().filter_map(|row| match row {
            ParsedRow::Accepted(punch) => Some(punch),
            ParsedRow::Rejected { .. } => None,
        })
    }

    pub fn into_accepted(self) -> Vec<Punch> {
        self.rows
            .into_iter()
            .filter_map(|row| match row {
                ParsedRow::Accepted(punch) => Some(punch),
                ParsedRow::Rejected { .. } => None,
            })
            .collect()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().filter_map(|row| match row {
            ParsedRow::Rejected { diagnostic, .. } => Some(diagnostic.as_str()),
            ParsedRow::Accepted(_) => None,
        })
    }

    pub fn rejected(&self) -> usize {
        self.diagnostics().count()
    }

    /// Id of every four-field line, valid or not.
    pub fn examined_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.rows.iter().map(ParsedRow::id)
    }

    pub fn max_examined_id(&self) -> Option<i64> {
        self.examined_ids().max()
    }
}

/// Parses `<id>;<code>;<si>;<yyyy-MM-dd HH:mm:ss>` lines.
///
/// Lines without exactly four fields are skipped without a diagnostic.
/// Numeric fields are read leniently: anything that is not an integer
/// becomes 0 and is then caught by the id/si checks.
pub fn parse_payload(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    if text.is_empty() {
        return outcome;
    }

    for raw in text.split('\n') {
        outcome.line_count += 1;
        let line = simplify(raw);
        let fields = line.split(';').collect::<Vec<_>>();
        if fields.len() != FIELD_COUNT {
            continue;
        }

        let id = lenient_int(fields[0]);
        let code = lenient_int(fields[1]);
        let si = lenient_int(fields[2]);
        let raw_ts = fields[3].trim();
        let timestamp = NaiveDateTime::parse_from_str(raw_ts, TIMESTAMP_FORMAT).ok();

        let candidate = timestamp.map(|timestamp| Punch {
            id,
            code,
            si,
            timestamp,
        });
        match candidate {
            Some(punch) if punch.is_valid() => outcome.rows.push(ParsedRow::Accepted(punch)),
            _ => {
                let ts = timestamp
                    .map(|value| value.format(TIMESTAMP_FORMAT).to_string())
                    .unwrap_or_default();
                let diagnostic = format!(
                    "Invalid punch {id} | {code:>3} | {si:>7} | {ts} == {raw_ts} | '{line}'"
                );
                outcome.rows.push(ParsedRow::Rejected { id, diagnostic });
            }
        }
    }

    outcome
}

fn simplify(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lenient_int(field: &str) -> i64 {
    field.trim().parse().unwrap_or(0)
}
