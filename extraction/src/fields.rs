//! Parsing of labelled statement fields out of recognised page text.

use anyhow::{Result, anyhow};
use lazy_regex::regex_find;
use serde::Serialize;

use crate::error::{ExtractionError, Label};

/// Value used for range endpoints that could not be parsed.
pub const NOT_AVAILABLE: &str = "NA";

/// Start and end of a range read from a `... from X to Y` line.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Range {
    pub start: String,
    pub end: String,
}

impl Range {
    pub fn new<S, E>(start: S, end: E) -> Self
    where
        S: Into<String>,
        E: Into<String>,
    {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    pub fn not_available() -> Self {
        Self::new(NOT_AVAILABLE, NOT_AVAILABLE)
    }
}

/// Fields read from a statement page.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct StatementFields {
    pub account_number: String,
    pub first_name: String,
    pub last_name: String,
    pub date_range: Range,
    pub amount_range: Range,
    pub cheque_range: Range,
}

/// Parses the range in a line of the form `... from X to Y`.
///
/// The text after the last ` from ` (or the whole line) must split on ` to `
/// into exactly two parts, otherwise both endpoints are [NOT_AVAILABLE]. An
/// endpoint that is a single space is also [NOT_AVAILABLE].
pub fn range_split(line: &str) -> Range {
    let values = line.rsplit(" from ").next().unwrap_or(line);
    let parts: Vec<&str> = values.split(" to ").collect();
    match parts.as_slice() {
        [start, end] => Range::new(normalise_endpoint(start), normalise_endpoint(end)),
        _ => Range::not_available(),
    }
}

fn normalise_endpoint(value: &str) -> &str {
    if value == " " { NOT_AVAILABLE } else { value }
}

/// Account number and holder name from an `Account Number` line.
struct AccountLine {
    number: String,
    first_name: String,
    last_name: String,
}

fn parse_account_line(line: &str) -> Result<AccountLine> {
    let number = regex_find!(r"\d+", line).ok_or_else(|| {
        anyhow!(ExtractionError::LabelMissing(Label::AccountNumber))
            .context(format!("no digits in account line {:?}", line))
    })?;

    let owner_name = line.rsplit(" - ").next().unwrap_or(line);
    let tokens: Vec<&str> = owner_name.split(' ').collect();
    let [first_name, last_name] = tokens.as_slice() else {
        return Err(anyhow!(ExtractionError::NameShape {
            tokens: tokens.len()
        })
        .context(format!("parsing account holder name {:?}", owner_name)));
    };

    Ok(AccountLine {
        number: number.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    })
}

/// Parses [StatementFields] from the text recognised on a statement page.
///
/// Lines are matched against the labels in priority order, and the first
/// matching label claims the line. The first transaction date and amount
/// lines are used; for account number and cheque number lines the last one
/// wins. Missing range lines leave the range [NOT_AVAILABLE]. A missing
/// account number line is an error.
pub fn parse_fields(text: &str) -> Result<StatementFields> {
    let mut account: Option<AccountLine> = None;
    let mut date_range: Option<Range> = None;
    let mut amount_range: Option<Range> = None;
    let mut cheque_range: Option<Range> = None;

    for line in text.split('\n') {
        if line.contains(Label::AccountNumber.as_ref()) {
            account = Some(parse_account_line(line)?);
        } else if line.contains(Label::TransactionDate.as_ref()) && date_range.is_none() {
            date_range = Some(range_split(line));
        } else if line.contains(Label::Amount.as_ref()) && amount_range.is_none() {
            amount_range = Some(range_split(line));
        } else if line.contains(Label::ChequeNumber.as_ref()) {
            cheque_range = Some(range_split(line));
        }
    }

    let account = account.ok_or(ExtractionError::LabelMissing(Label::AccountNumber))?;

    Ok(StatementFields {
        account_number: account.number,
        first_name: account.first_name,
        last_name: account.last_name,
        date_range: range_or_warn(date_range, Label::TransactionDate),
        amount_range: range_or_warn(amount_range, Label::Amount),
        cheque_range: range_or_warn(cheque_range, Label::ChequeNumber),
    })
}

fn range_or_warn(range: Option<Range>, label: Label) -> Range {
    range.unwrap_or_else(|| {
        log::warn!("No {:?} line found in recognised text.", label.as_ref());
        Range::not_available()
    })
}
