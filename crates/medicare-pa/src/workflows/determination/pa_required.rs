use serde::Serialize;

use super::case::clean_code;
use super::error::DeterminationError;
use crate::datasets::{PaRequiredEntry, ReferenceCache};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaDetermination {
    NotListed,
    NotRequiredInState,
    Required,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicableList {
    pub name: String,
    pub effective_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaRequiredOutcome {
    pub code: String,
    pub required: bool,
    pub determination: PaDetermination,
    /// Every list row for the code, whether or not it applies in the state.
    pub matches: Vec<PaRequiredEntry>,
    pub applicable_lists: Vec<ApplicableList>,
    pub message: String,
}

/// Matches a procedure code against the PA-required lists.
///
/// With no practice state every code match is kept: showing a list that might
/// not apply is preferred over hiding one that does.
pub fn match_pa_required(
    entries: &[PaRequiredEntry],
    code: &str,
    practice_state: Option<&str>,
) -> Result<PaRequiredOutcome, DeterminationError> {
    let code = clean_code(code);
    if code.is_empty() {
        return Err(DeterminationError::Format(
            "No procedure code provided".to_string(),
        ));
    }

    let matches: Vec<PaRequiredEntry> = entries
        .iter()
        .filter(|entry| entry.hcpcs.trim().eq_ignore_ascii_case(&code))
        .cloned()
        .collect();

    if matches.is_empty() {
        return Ok(PaRequiredOutcome {
            message: format!(
                "PA NOT REQUIRED: Code {code} does not appear on any CMS prior authorization required list for Original Medicare FFS."
            ),
            code,
            required: false,
            determination: PaDetermination::NotListed,
            matches,
            applicable_lists: Vec::new(),
        });
    }

    let applicable_lists: Vec<ApplicableList> = matches
        .iter()
        .filter(|entry| match practice_state {
            Some(state) => entry.applies_in(state),
            None => true,
        })
        .map(|entry| ApplicableList {
            name: entry.list.clone(),
            effective_date: entry.effective_date.clone(),
        })
        .collect();

    if applicable_lists.is_empty() {
        let state = practice_state.unwrap_or_default().to_ascii_uppercase();
        return Ok(PaRequiredOutcome {
            message: format!(
                "PA NOT REQUIRED in {state}: Code {code} appears on a state-specific PA list but not for your state."
            ),
            code,
            required: false,
            determination: PaDetermination::NotRequiredInState,
            matches,
            applicable_lists,
        });
    }

    let names = applicable_lists
        .iter()
        .map(|list| list.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    Ok(PaRequiredOutcome {
        message: format!(
            "PA REQUIRED: Code {code} appears on: {names}. Authorization must be obtained before service."
        ),
        code,
        required: true,
        determination: PaDetermination::Required,
        matches,
        applicable_lists,
    })
}

pub async fn check_pa_required(
    datasets: &ReferenceCache,
    code: &str,
    practice_state: Option<&str>,
) -> Result<PaRequiredOutcome, DeterminationError> {
    let table = datasets.pa_required().await?;
    match_pa_required(&table.codes, code, practice_state)
}
