use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::case::clean_code;
use super::error::DeterminationError;
use super::slot::Supervised;
use crate::datasets::{MueEdit, PtpEdit, ReferenceCache};

const MODIFIER_ALLOWED_NOTE: &str =
    "Modifier allowed: use modifier -59 (distinct procedural service) if services are truly separate.";
const MODIFIER_DENIED_NOTE: &str =
    "No modifier override: these codes cannot be billed together on the same claim.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpConflict {
    pub code1: String,
    pub code2: String,
    pub code1_desc: Option<String>,
    pub code2_desc: Option<String>,
    pub modifier_allowed: bool,
    pub modifier_note: &'static str,
    pub context: Option<String>,
    pub effective_date: Option<String>,
}

impl PtpConflict {
    fn from_edit(edit: &PtpEdit) -> Self {
        let modifier_allowed = edit.modifier == 1;
        Self {
            code1: edit.col1.clone(),
            code2: edit.col2.clone(),
            code1_desc: edit.col1_desc.clone(),
            code2_desc: edit.col2_desc.clone(),
            modifier_allowed,
            modifier_note: if modifier_allowed {
                MODIFIER_ALLOWED_NOTE
            } else {
                MODIFIER_DENIED_NOTE
            },
            context: edit.context.clone(),
            effective_date: edit.effective_date.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PtpOutcome {
    pub has_conflicts: bool,
    pub conflicts: Vec<PtpConflict>,
    pub message: String,
}

/// Checks every unordered pair of claim codes against the PTP table and
/// reports the first matching edit for each pair. Duplicate codes are
/// collapsed first, so a code is never paired with itself.
pub fn check_ptp(edits: &[PtpEdit], codes: &[String]) -> PtpOutcome {
    let mut unique: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes.iter().map(|c| clean_code(c)) {
        if !code.is_empty() && !unique.contains(&code) {
            unique.push(code);
        }
    }

    let mut conflicts = Vec::new();
    for (i, first) in unique.iter().enumerate() {
        for second in &unique[i + 1..] {
            if let Some(edit) = edits.iter().find(|edit| edit.pairs(first, second)) {
                conflicts.push(PtpConflict::from_edit(edit));
            }
        }
    }

    let message = if conflicts.is_empty() {
        "No NCCI PTP conflicts found for this code combination.".to_string()
    } else {
        format!(
            "WARNING: {} NCCI PTP edit conflict(s) found.",
            conflicts.len()
        )
    };

    PtpOutcome {
        has_conflicts: !conflicts.is_empty(),
        conflicts,
        message,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MueOutcome {
    pub code: String,
    pub found: bool,
    pub mue_value: Option<u32>,
    pub adjudication_type: Option<String>,
    pub rationale: Option<String>,
}

/// Most codes carry no MUE limit; a miss is `found: false`, not an error.
pub fn check_mue(edits: &[MueEdit], code: &str) -> MueOutcome {
    let code = clean_code(code);
    match edits.iter().find(|edit| edit.cpt.eq_ignore_ascii_case(&code)) {
        Some(edit) => MueOutcome {
            code,
            found: true,
            mue_value: Some(edit.mue_value),
            adjudication_type: edit.adjudication_type.clone(),
            rationale: edit.rationale.clone(),
        },
        None => MueOutcome {
            code,
            found: false,
            mue_value: None,
            adjudication_type: None,
            rationale: None,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NcciOutcome {
    pub ptp: Option<PtpOutcome>,
    pub mue: Option<MueOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// PTP and MUE checks for one claim. Either side may fail on its own; the
/// aggregate fails only when both do.
pub async fn evaluate_ncci(
    datasets: Arc<ReferenceCache>,
    codes: Vec<String>,
    timeout: Duration,
) -> Result<NcciOutcome, DeterminationError> {
    let primary = codes.first().cloned().unwrap_or_default();

    let ptp = {
        let datasets = datasets.clone();
        Supervised::spawn("NCCI PTP check", timeout, async move {
            let table = datasets.ptp_edits().await?;
            Ok(check_ptp(&table.edits, &codes))
        })
    };
    let mue = Supervised::spawn("NCCI MUE check", timeout, async move {
        let table = datasets.mue_edits().await?;
        Ok(check_mue(&table.edits, &primary))
    });

    let (ptp, mue) = tokio::join!(ptp.settle(), mue.settle());
    let mut errors = Vec::new();
    let ptp = ptp.map_err(|err| errors.push(err.to_string())).ok();
    let mue = mue.map_err(|err| errors.push(err.to_string())).ok();

    if ptp.is_none() && mue.is_none() {
        return Err(DeterminationError::Transport(format!(
            "NCCI check failed: {}",
            errors.join("; ")
        )));
    }
    Ok(NcciOutcome { ptp, mue, errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(col1: &str, col2: &str, modifier: u8) -> PtpEdit {
        PtpEdit {
            col1: col1.to_string(),
            col2: col2.to_string(),
            col1_desc: None,
            col2_desc: None,
            modifier,
            context: None,
            effective_date: None,
        }
    }

    fn codes(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn modifier_one_permits_override() {
        let outcome = check_ptp(&[edit("96413", "96360", 1)], &codes(&["96413", "96360"]));
        assert!(outcome.has_conflicts);
        assert!(outcome.conflicts[0].modifier_allowed);
        assert_eq!(outcome.conflicts[0].modifier_note, MODIFIER_ALLOWED_NOTE);
    }

    #[test]
    fn modifier_zero_forbids_override_in_either_order() {
        let outcome = check_ptp(&[edit("96413", "96360", 0)], &codes(&["96360", "96413"]));
        assert_eq!(outcome.conflicts.len(), 1);
        assert!(!outcome.conflicts[0].modifier_allowed);
        assert_eq!(outcome.conflicts[0].modifier_note, MODIFIER_DENIED_NOTE);
    }

    #[test]
    fn unknown_pairs_do_not_conflict() {
        let outcome = check_ptp(&[edit("96413", "96360", 1)], &codes(&["99213", "96360"]));
        assert!(!outcome.has_conflicts);
        assert_eq!(
            outcome.message,
            "No NCCI PTP conflicts found for this code combination."
        );
    }

    #[test]
    fn n_way_lists_report_every_matching_pair() {
        let table = [
            edit("96413", "96360", 1),
            edit("96413", "96365", 0),
            edit("20610", "J1030", 1),
        ];
        let outcome = check_ptp(&table, &codes(&["96413", "96360", "96365", "96413"]));
        assert_eq!(outcome.conflicts.len(), 2);
        assert_eq!(outcome.message, "WARNING: 2 NCCI PTP edit conflict(s) found.");
    }

    #[test]
    fn pair_listed_in_both_orders_counts_once() {
        let table = [
            edit("96413", "96360", 1),
            edit("96360", "96413", 1),
            edit("96413", "96360", 0),
        ];
        let outcome = check_ptp(&table, &codes(&["96413", "96360"]));
        assert_eq!(outcome.conflicts.len(), 1);
        assert!(outcome.conflicts[0].modifier_allowed, "first matching row wins");
        assert_eq!(outcome.message, "WARNING: 1 NCCI PTP edit conflict(s) found.");
    }

    #[test]
    fn single_code_never_pairs_with_itself() {
        let outcome = check_ptp(&[edit("96413", "96413", 0)], &codes(&["96413"]));
        assert!(!outcome.has_conflicts);
    }

    #[test]
    fn mue_miss_is_not_an_error() {
        let table = [MueEdit {
            cpt: "J9271".to_string(),
            mue_value: 100,
            adjudication_type: Some("Date of Service Edit: Clinical".to_string()),
            rationale: None,
        }];
        let hit = check_mue(&table, "j9271");
        assert!(hit.found);
        assert_eq!(hit.mue_value, Some(100));

        let miss = check_mue(&table, "99213");
        assert!(!miss.found);
        assert_eq!(miss.mue_value, None);
    }
}
