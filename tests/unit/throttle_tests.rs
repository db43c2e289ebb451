//! Unit tests for the load-progress throttle.

use loomd::session::ProgressThrottle;

#[test]
fn emits_whole_percent_points_only() {
    let mut throttle = ProgressThrottle::new();
    assert_eq!(throttle.accept(0.0), Some(0));
    assert_eq!(throttle.accept(0.004), None);
    assert_eq!(throttle.accept(0.01), Some(1));
    assert_eq!(throttle.accept(0.019), None);
    assert_eq!(throttle.accept(0.5), Some(50));
}

#[test]
fn emissions_are_strictly_increasing() {
    let mut throttle = ProgressThrottle::new();
    assert_eq!(throttle.accept(0.4), Some(40));
    assert_eq!(throttle.accept(0.4), None);
    assert_eq!(throttle.accept(0.3), None);
    assert_eq!(throttle.accept(0.41), Some(41));
}

#[test]
fn fractions_are_clamped() {
    let mut throttle = ProgressThrottle::new();
    assert_eq!(throttle.accept(-0.5), Some(0));
    assert_eq!(throttle.accept(1.7), Some(100));
    assert_eq!(throttle.accept(2.0), None);
}

#[test]
fn noisy_stream_yields_monotonic_sequence() {
    let mut throttle = ProgressThrottle::new();
    let observations = [0.0, 0.1, 0.05, 0.1, 0.25, 0.25, 0.9, 0.3, 1.0];
    let emitted: Vec<u8> = observations
        .iter()
        .filter_map(|&fraction| throttle.accept(fraction))
        .collect();
    assert_eq!(emitted, vec![0, 10, 25, 90, 100]);
}
