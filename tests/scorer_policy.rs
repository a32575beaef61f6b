// tests/scorer_policy.rs
//
// Behavioral contract of the heuristic scorer: determinism, bounds,
// additivity, and the reference scenarios used across the product.

use veilleur::assessment::{EscalationLevel, RiskCategory};
use veilleur::scorer::score;

#[test]
fn sad_and_lonely_message_scores_point_four() {
    let a = score("je me sens triste et seul");
    assert_eq!(a.score, 0.4);
    assert_eq!(a.labels, vec![RiskCategory::Deprime, RiskCategory::Isolement]);
    assert_eq!(a.escalation, EscalationLevel::Vigilance);
}

#[test]
fn danger_message_reaches_the_alert_line() {
    let a = score("je veux disparaitre");
    assert_eq!(a.score, 0.6);
    assert_eq!(a.labels, vec![RiskCategory::Danger]);
    assert_eq!(a.escalation, EscalationLevel::Important);
}

#[test]
fn score_is_always_in_unit_interval() {
    let samples = [
        "",
        "bonjour",
        "triste",
        "triste et seul et harcele",
        "suicide drogue alcool harcele triste seul",
        "⚠️ unicode et ponctuation !!! 😢",
    ];
    for s in samples {
        let a = score(s);
        assert!((0.0..=1.0).contains(&a.score), "out of range for {s:?}");
    }
}

#[test]
fn scoring_twice_yields_identical_results() {
    let t = "on se moque de moi et je me sens seul";
    let a = score(t);
    let b = score(t);
    assert_eq!(a.score, b.score);
    assert_eq!(a.labels, b.labels);
}

#[test]
fn adding_matching_terms_never_lowers_the_score() {
    let steps = [
        "bonjour",
        "bonjour, je suis triste",
        "bonjour, je suis triste et seul",
        "bonjour, je suis triste et seul, on me harcele",
        "bonjour, je suis triste et seul, on me harcele, je veux mourir",
    ];
    let mut prev = -1.0f32;
    for s in steps {
        let cur = score(s).score;
        assert!(cur >= prev, "score decreased at {s:?}: {prev} -> {cur}");
        prev = cur;
    }
}

#[test]
fn case_and_layout_do_not_change_the_result() {
    let a = score("Je Me Sens TRISTE   et\tseul");
    let b = score("je me sens triste et seul");
    assert_eq!(a, b);
}

#[test]
fn labels_never_repeat() {
    let a = score("triste, tellement triste, toujours triste et deprime");
    assert_eq!(a.labels, vec![RiskCategory::Deprime]);
}
