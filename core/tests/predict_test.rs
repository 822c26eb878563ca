//! Evaluation harness tests: ranking, confusion matrix, summary text.

use nano_infer_core::*;

static ID3_W: [i8; 9] = [1, 0, 0, 0, 1, 0, 0, 0, 1];
static ZERO3: [i8; 3] = [0; 3];

fn identity_model() -> Model {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(3), QFormat::default()).unwrap();
    let x = b.dense(x, DenseParams::new(3), Weights::new(&ID3_W, &ZERO3)).unwrap();
    b.build(x).unwrap()
}

// =============================================================================
// Ranking
// =============================================================================

#[test]
fn test_rank_of_strict_and_ties() {
    assert_eq!(rank_of(&[5, 9, 1], 1), Some(0));
    assert_eq!(rank_of(&[5, 9, 1], 2), Some(2));
    // equal scores at lower indices rank ahead
    assert_eq!(rank_of(&[10, 10, 10], 0), Some(0));
    assert_eq!(rank_of(&[10, 10, 10], 1), Some(1));
    assert_eq!(rank_of(&[10, 10, 10], 2), Some(2));
    assert_eq!(rank_of(&[1, 2], 2), None);
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn test_session_counts() {
    let mut model = identity_model();
    let clock = ManualClock::new(1);
    let mut session = Prediction::new(&mut model, &clock, 3, 2).unwrap();

    assert_eq!(session.run_sample(&[10, 0, 0], 0).unwrap(), 0);
    assert_eq!(session.run_sample(&[0, 10, 0], 0).unwrap(), 1);
    assert_eq!(session.run_sample(&[0, 0, 10], 2).unwrap(), 2);
    session.finish();

    let report = session.report();
    assert_eq!(report.frames, 3);
    assert_eq!(report.top_k, [2, 1]);
    assert_eq!(report.top_k_hits(1), 2);
    assert_eq!(report.top_k_hits(2), 3);
    assert_eq!(report.confusion(0, 0), 1);
    assert_eq!(report.confusion(0, 1), 1);
    assert_eq!(report.confusion(2, 2), 1);
    assert_eq!(report.confusion(1, 1), 0);
    assert_eq!(report.row_total(0), 2);
    assert_eq!(report.row_accuracy(0), Some(0.5));
    assert_eq!(report.row_accuracy(1), None);
    assert_eq!(report.total_ops, 9);
    assert!(report.run_time_us > 0);
    assert!(report.total_time_us >= report.run_time_us);
}

#[test]
fn test_session_rank_beyond_depth_is_not_counted() {
    let mut model = identity_model();
    let clock = ManualClock::new(0);
    let mut session = Prediction::new(&mut model, &clock, 3, 1).unwrap();
    session.run_sample(&[3, 2, 1], 2).unwrap();
    let report = session.report();
    assert_eq!(report.frames, 1);
    assert_eq!(report.top_k, [0]);
    assert_eq!(report.confusion(2, 0), 1);
}

#[test]
fn test_session_input_through_model_mut() {
    let mut model = identity_model();
    let clock = ManualClock::new(0);
    let mut session = Prediction::new(&mut model, &clock, 3, 1).unwrap();
    session.model_mut().input_mut().copy_from_slice(&[0, 0, 7]);
    assert_eq!(session.run(2).unwrap(), 2);
    assert_eq!(session.model().output(), &[0, 0, 7]);
}

#[test]
fn test_session_argument_errors() {
    let mut model = identity_model();
    let clock = ManualClock::new(0);
    assert!(Prediction::new(&mut model, &clock, 0, 1).is_err());
    assert!(Prediction::new(&mut model, &clock, 4, 1).is_err());
    assert!(Prediction::new(&mut model, &clock, 3, 0).is_err());

    let mut session = Prediction::new(&mut model, &clock, 2, 1).unwrap();
    assert!(matches!(session.run(2), Err(NanoError::InvalidArgument(_))));
    assert_eq!(session.report().frames, 0);
}

#[test]
fn test_finish_stamps_total_time() {
    let mut model = identity_model();
    let clock = ManualClock::new(0);
    let mut session = Prediction::new(&mut model, &clock, 3, 1).unwrap();
    clock.advance(250);
    session.finish();
    clock.advance(1000);
    assert_eq!(session.report().total_time_us, 250);
}

// =============================================================================
// Summary
// =============================================================================

fn sample_report() -> PredictionReport {
    PredictionReport {
        frames: 3,
        label_count: 2,
        top_k: vec![2, 1],
        confusion: vec![1, 1, 0, 1],
        total_time_us: 400,
        run_time_us: 300,
        total_ops: 100,
    }
}

#[test]
fn test_report_derived_figures() {
    let r = sample_report();
    assert_eq!(r.average_latency_us(), Some(100.0));
    assert_eq!(r.efficiency(), Some(1.0));
    assert_eq!(r.frame_rate_hz(), Some(10_000.0));
    assert_eq!(r.top_k_accuracy(2), Some(1.0));
}

#[test]
fn test_report_text() {
    let text = sample_report().to_string();
    assert!(text.starts_with("Prediction summary:\n"));
    assert!(text.contains("Test frames: 3\n"));
    assert!(text.contains("Average prediction time: 100.00us\n"));
    assert!(text.contains("Average efficiency: 1.00 ops/us\n"));
    assert!(text.contains("Top 1 Accuracy: 66.66%\n"));
    assert!(text.contains("Top 2 Accuracy: 100%\n"));
    assert!(text.contains("predic     0     1\n"));
    assert!(text.contains("   0 |     1     1   | 50.00%\n"));
    assert!(text.contains("   1 |     0     1   | 100%\n"));
}

#[test]
fn test_empty_report_guards() {
    let r = PredictionReport {
        frames: 0,
        label_count: 1,
        top_k: vec![0],
        confusion: vec![0],
        total_time_us: 0,
        run_time_us: 0,
        total_ops: 10,
    };
    assert_eq!(r.top_k_accuracy(1), None);
    assert_eq!(r.average_latency_us(), None);
    assert_eq!(r.efficiency(), None);
    let text = r.to_string();
    assert!(text.contains("Top 1 Accuracy: n/a"));
    assert!(text.contains("Average frame rate: n/aHz"));
    assert!(text.contains("   0 |     0   | n/a"));
}

#[cfg(feature = "serde")]
#[test]
fn test_report_serde_round_trip() {
    let r = sample_report();
    let json = serde_json::to_string(&r).unwrap();
    assert!(json.contains(r#""top_k":[2,1]"#));
    assert_eq!(serde_json::from_str::<PredictionReport>(&json).unwrap(), r);
}
