use super::common::*;
use std::sync::Arc;

use crate::workflows::determination::{
    render_dashboard, DashboardView, DeterminationResults, EvaluationSlot, LetterState,
};

#[tokio::test]
async fn advantage_patient_sees_only_eligibility_and_alert() {
    let orchestrator = orchestrator_with(
        ScriptedEligibility::replying(advantage()),
        FakeCoverage::default(),
        FakeSad::default(),
        settings(),
    );
    let case = case();
    let results = orchestrator.evaluate(Arc::new(case.clone())).await;

    let view = render_dashboard(3, &case, &results, &LetterState::Idle);
    assert!(view.is_medicare_advantage());

    let payload = serde_json::to_value(&view).expect("serialize");
    assert_eq!(payload["view"], "medicare_advantage");
    assert_eq!(payload["generation"], 3);
    assert_eq!(payload["eligibility"]["status"], "fail");
    assert!(payload["alert"]
        .as_str()
        .expect("alert text")
        .starts_with("This tool supports Original Medicare FFS only."));
    assert!(payload["alert"]
        .as_str()
        .expect("alert text")
        .contains("Sunrise Advantage PPO"));
    for hidden in ["paRequired", "coverage", "ncci", "sad", "letter"] {
        assert!(payload.get(hidden).is_none(), "{hidden} should be hidden");
    }
}

#[tokio::test]
async fn original_medicare_patient_sees_every_card() {
    let case = case();
    let results = orchestrator().evaluate(Arc::new(case.clone())).await;

    let payload = serde_json::to_value(render_dashboard(1, &case, &results, &LetterState::Idle))
        .expect("serialize");
    assert_eq!(payload["view"], "determinations");
    assert_eq!(payload["settled"], true);
    assert_eq!(payload["case"]["mbi"], "1EG4-TE5-MK73");
    assert_eq!(payload["eligibility"]["status"], "pass");
    assert_eq!(
        payload["eligibility"]["summary"],
        "Active Original Medicare (Part B)"
    );
    assert_eq!(payload["paRequired"]["status"], "pass");
    assert_eq!(payload["coverage"]["status"], "pass");
    assert_eq!(payload["ncci"]["status"], "warn");
    assert_eq!(payload["sad"]["status"], "pass");
    assert_eq!(payload["letter"]["state"], "idle");
}

#[test]
fn pending_slots_render_as_loading() {
    let case = case();
    let view = render_dashboard(1, &case, &DeterminationResults::default(), &LetterState::Idle);

    let DashboardView::Determinations {
        settled,
        coverage,
        sad,
        ..
    } = view
    else {
        panic!("pending results must not trigger the advantage gate");
    };
    assert!(!settled);
    assert_eq!(coverage.summary, "Searching NCD/LCD...");
    assert_eq!(sad.slot, EvaluationSlot::Pending);
}

#[test]
fn failed_eligibility_keeps_the_full_dashboard() {
    let case = case();
    let results = DeterminationResults {
        eligibility: EvaluationSlot::Failed {
            error: "Eligibility API error (503)".to_string(),
        },
        ..DeterminationResults::default()
    };

    let payload = serde_json::to_value(render_dashboard(1, &case, &results, &LetterState::Idle))
        .expect("serialize");
    assert_eq!(payload["view"], "determinations");
    assert_eq!(payload["eligibility"]["state"], "failed");
    assert_eq!(payload["eligibility"]["summary"], "Eligibility API error (503)");
}
