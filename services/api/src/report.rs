use chrono::NaiveDate;
use medicare_pa::workflows::determination::{
    CaseHeader, CheckCard, DashboardView, EvaluationSlot, LetterCard, LetterState,
};
use std::fmt::Write;

/// Plain-text rendering of a dashboard for the `check` command.
pub(crate) fn render_report(view: &DashboardView, evaluated: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Prior authorization determination (evaluated {evaluated})");

    match view {
        DashboardView::MedicareAdvantage {
            case,
            eligibility,
            alert,
            ..
        } => {
            render_header(&mut out, case);
            render_card(&mut out, eligibility);
            let _ = writeln!(out, "\nALERT: {alert}");
        }
        DashboardView::Determinations {
            case,
            settled,
            eligibility,
            pa_required,
            coverage,
            ncci,
            sad,
            letter,
            ..
        } => {
            render_header(&mut out, case);
            render_card(&mut out, eligibility);
            render_card(&mut out, pa_required);
            render_card(&mut out, coverage);
            render_card(&mut out, ncci);
            render_card(&mut out, sad);
            render_letter(&mut out, letter);
            if !settled {
                let _ = writeln!(out, "\nSome checks were still running when the report was produced.");
            }
        }
    }

    out
}

fn render_header(out: &mut String, case: &CaseHeader) {
    let _ = writeln!(out, "Patient: {} (MBI {})", case.patient, case.mbi);
    let _ = writeln!(out, "Provider NPI: {}", case.npi);
    let _ = writeln!(out, "Diagnosis: {}", case.diagnosis);
    let _ = writeln!(out, "Procedure codes: {}", case.procedure_codes.join(", "));
}

fn render_card<T>(out: &mut String, card: &CheckCard<T>) {
    let _ = writeln!(out, "\n[{}] {}", card.status.label(), card.title);
    let _ = writeln!(out, "- {}", card.summary);
    if let EvaluationSlot::Failed { error } = &card.slot {
        if error != &card.summary {
            let _ = writeln!(out, "- error: {error}");
        }
    }
}

fn render_letter(out: &mut String, card: &LetterCard) {
    let detail = match &card.letter {
        LetterState::Idle => "not requested".to_string(),
        LetterState::Drafting => "drafting".to_string(),
        LetterState::Ready { letter } => match &letter.model {
            Some(model) => format!("ready ({model})"),
            None => "ready".to_string(),
        },
        LetterState::Failed { error } => format!("failed: {error}"),
    };
    let _ = writeln!(out, "\n[{}] Appeal letter", card.status.label());
    let _ = writeln!(out, "- {detail}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicare_pa::workflows::determination::{CheckStatus, EligibilityOutcome};

    fn header() -> CaseHeader {
        CaseHeader {
            patient: "Jane Doe".to_string(),
            mbi: "1EG4-TE5-MK73".to_string(),
            npi: "1245319599".to_string(),
            diagnosis: "C34.90".to_string(),
            procedure_codes: vec!["J9271".to_string(), "96413".to_string()],
        }
    }

    fn evaluated() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date")
    }

    #[test]
    fn advantage_report_shows_only_the_alert() {
        let view = DashboardView::MedicareAdvantage {
            generation: 1,
            case: header(),
            eligibility: CheckCard::<EligibilityOutcome> {
                title: "Medicare Eligibility",
                status: CheckStatus::Fail,
                summary: "Medicare Advantage (Sunrise Advantage PPO)".to_string(),
                slot: EvaluationSlot::Pending,
            },
            alert: "This tool supports Original Medicare FFS only.".to_string(),
        };

        let report = render_report(&view, evaluated());
        assert!(report.contains("evaluated 2026-01-15"));
        assert!(report.contains("[FAIL] Medicare Eligibility"));
        assert!(report.contains("ALERT: This tool supports Original Medicare FFS only."));
        assert!(!report.contains("NCCI"));
    }

    #[test]
    fn failed_card_lists_its_error_once() {
        let mut out = String::new();
        render_card::<EligibilityOutcome>(
            &mut out,
            &CheckCard {
                title: "Medicare Eligibility",
                status: CheckStatus::Fail,
                summary: "Eligibility API error (503)".to_string(),
                slot: EvaluationSlot::Failed {
                    error: "Eligibility API error (503)".to_string(),
                },
            },
        );
        assert_eq!(out.matches("Eligibility API error (503)").count(), 1);
    }
}
