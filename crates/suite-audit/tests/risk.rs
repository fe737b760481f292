mod common;

use common::*;
use indexmap::IndexMap;
use suite_audit::{
    audit_contest, AuditError, AuditParameters, Collaborators, Contest, Discrepancies,
    ObservedSample, ReportedVotes, StratumSizes, TriHypergeometricPolling,
};

fn collaborators(modulus: &RecordingModulus) -> Collaborators<'_> {
    Collaborators::new(&FakeComparison, &FakePolling, &FisherCombiner, modulus)
}

fn poll(entries: &[(&str, u64)]) -> IndexMap<String, u64> {
    entries
        .iter()
        .map(|(name, votes)| (name.to_string(), *votes))
        .collect()
}

#[test]
fn empty_samples_carry_full_risk() {
    let modulus = RecordingModulus::default();
    let observed = ObservedSample {
        n1: 0,
        n2: 0,
        discrepancies: Discrepancies::default(),
        poll: poll(&[("Winner", 0), ("Loser", 0), ("Minor", 0)]),
    };
    let risks = audit_contest(
        &example_contest(),
        &observed,
        &AuditParameters::default(),
        collaborators(&modulus),
    )
    .unwrap();
    assert_eq!(risks.len(), 2);
    assert!(risks.values().all(|&risk| risk == 1.0));
}

#[test]
fn risks_follow_winner_major_order() {
    let candidates: IndexMap<String, ReportedVotes> = [
        ("D", ReportedVotes::new(100, 100)),
        ("A", ReportedVotes::new(400, 300)),
        ("C", ReportedVotes::new(150, 150)),
        ("B", ReportedVotes::new(350, 250)),
    ]
    .into_iter()
    .map(|(name, votes)| (name.to_string(), votes))
    .collect();
    let contest = Contest::new(candidates, 2, StratumSizes::new(1_000, 1_000)).unwrap();
    let observed = ObservedSample {
        n1: 50,
        n2: 50,
        discrepancies: Discrepancies::default(),
        poll: poll(&[("A", 20), ("B", 17), ("C", 6), ("D", 5)]),
    };
    let modulus = RecordingModulus::default();
    let risks = audit_contest(
        &contest,
        &observed,
        &AuditParameters::default(),
        collaborators(&modulus),
    )
    .unwrap();

    let keys: Vec<(&str, &str)> = risks
        .keys()
        .map(|(w, l)| (w.as_str(), l.as_str()))
        .collect();
    assert_eq!(keys, [("A", "C"), ("A", "D"), ("B", "C"), ("B", "D")]);
    assert!(risks.values().all(|&risk| (0.0..=1.0).contains(&risk)));
    // A wider margin over the same loser means lower risk.
    let pair = |w: &str, l: &str| risks[&(w.to_string(), l.to_string())];
    assert!(pair("A", "C") <= pair("B", "C"));

    let calls = modulus.calls.borrow();
    assert_eq!(calls.len(), 4);
    assert_eq!((calls[0].n_w2, calls[0].n_l2), (20, 6));
    assert_eq!(calls[0].reported_margin, 700 - 300);
}

#[test]
fn observed_counts_reach_collaborators_unchanged() {
    let modulus = RecordingModulus::default();
    let observed = ObservedSample {
        n1: 30,
        n2: 40,
        discrepancies: Discrepancies {
            o1: 1,
            ..Discrepancies::default()
        },
        poll: poll(&[("Winner", 22), ("Loser", 15), ("Minor", 1)]),
    };
    let risks = audit_contest(
        &example_contest(),
        &observed,
        &AuditParameters::default(),
        collaborators(&modulus),
    )
    .unwrap();

    let winner_loser = risks[&("Winner".to_string(), "Loser".to_string())];
    // p1 = 0.85^30 * 2, p2 = 0.9^7
    let expected = fisher(0.85f64.powi(30) * 2.0 * 0.9f64.powi(7));
    assert!((winner_loser - expected).abs() < 1e-12);
}

#[test]
fn missing_poll_count_is_rejected() {
    let modulus = RecordingModulus::default();
    let observed = ObservedSample {
        n1: 10,
        n2: 10,
        discrepancies: Discrepancies::default(),
        poll: poll(&[("Winner", 6), ("Loser", 3)]),
    };
    let err = audit_contest(
        &example_contest(),
        &observed,
        &AuditParameters::default(),
        collaborators(&modulus),
    )
    .unwrap_err();
    assert!(matches!(err, AuditError::InvalidParameter(_)));
}

#[test]
fn oversized_samples_are_rejected() {
    let modulus = RecordingModulus::default();
    let observed = ObservedSample {
        n1: 10,
        n2: 5,
        discrepancies: Discrepancies::default(),
        poll: poll(&[("Winner", 4), ("Loser", 3), ("Minor", 0)]),
    };
    assert!(audit_contest(
        &example_contest(),
        &observed,
        &AuditParameters::default(),
        collaborators(&modulus),
    )
    .is_err());

    let beyond_stratum = ObservedSample {
        n1: 10_001,
        ..ObservedSample::default()
    };
    assert!(audit_contest(
        &example_contest(),
        &beyond_stratum,
        &AuditParameters::default(),
        collaborators(&modulus),
    )
    .is_err());
}

#[test]
fn trihypergeometric_polling_end_to_end() {
    let candidates: IndexMap<String, ReportedVotes> = [
        ("Alice", ReportedVotes::new(60, 35)),
        ("Bob", ReportedVotes::new(30, 20)),
    ]
    .into_iter()
    .map(|(name, votes)| (name.to_string(), votes))
    .collect();
    let contest = Contest::new(candidates, 1, StratumSizes::new(100, 60)).unwrap();
    let polling = TriHypergeometricPolling::new();
    let modulus = RecordingModulus::default();
    let collaborators = Collaborators::new(&FakeComparison, &polling, &FisherCombiner, &modulus);
    let params = AuditParameters {
        lambda_step: 0.25,
        ..AuditParameters::default()
    };

    let strong = ObservedSample {
        n1: 0,
        n2: 12,
        discrepancies: Discrepancies::default(),
        poll: poll(&[("Alice", 10), ("Bob", 1)]),
    };
    let weak = ObservedSample {
        poll: poll(&[("Alice", 6), ("Bob", 5)]),
        ..strong.clone()
    };
    let key = ("Alice".to_string(), "Bob".to_string());
    let strong_risk = audit_contest(&contest, &strong, &params, collaborators).unwrap()[&key];
    let weak_risk = audit_contest(&contest, &weak, &params, collaborators).unwrap()[&key];

    assert!((0.0..=1.0).contains(&strong_risk));
    assert!((0.0..=1.0).contains(&weak_risk));
    assert!(strong_risk < weak_risk);
}
