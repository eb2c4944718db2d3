// Unit tests for estimate rules

use super::*;

#[test]
fn test_combinations_small_pool() {
    assert_eq!(estimate_combinations(0, 0, false), CombinationEstimate::Exact(0));
    assert_eq!(estimate_combinations(1, 0, false), CombinationEstimate::Exact(1));
    assert_eq!(estimate_combinations(4, 0, false), CombinationEstimate::Exact(24));
    assert_eq!(estimate_combinations(10, 0, false), CombinationEstimate::Exact(3_628_800));
}

#[test]
fn test_combinations_unbounded_past_limit() {
    assert!(estimate_combinations(11, 0, false).is_unbounded());
    assert!(estimate_combinations(5, 11, true).is_unbounded());
}

#[test]
fn test_combinations_group_factor() {
    // 3! * 2!
    assert_eq!(estimate_combinations(3, 2, true), CombinationEstimate::Exact(12));
    // group factor ignored without group mixing or with a single group
    assert_eq!(estimate_combinations(3, 2, false), CombinationEstimate::Exact(6));
    assert_eq!(estimate_combinations(3, 1, true), CombinationEstimate::Exact(6));
}

#[test]
fn test_strength_scoring() {
    let mut settings = GenerationSettings::default();
    assert_eq!(anti_fingerprint_strength(&settings), 0);
    assert_eq!(strength_label(0), "None");

    settings.enable_order_mixing = true;
    settings.enable_different_start = true;
    settings.enable_group_mixing = true;
    settings.group_mixing_mode = GroupMixingMode::Sequential;
    assert_eq!(anti_fingerprint_strength(&settings), 3);

    settings.group_mixing_mode = GroupMixingMode::Random;
    settings.enable_speed_variations = true;
    assert_eq!(anti_fingerprint_strength(&settings), 5);
    assert_eq!(strength_label(5), "Excellent");
}

#[test]
fn test_estimated_duration() {
    let mut settings = GenerationSettings::default();
    assert_eq!(estimated_duration(&settings, 30.0), 30.0);

    settings.enable_speed_variations = true;
    settings.speed_min = 1.0;
    settings.speed_max = 2.0;
    assert!((estimated_duration(&settings, 30.0) - 20.0).abs() < 1e-9);

    settings.duration_type = DurationType::Fixed;
    settings.fixed_duration_seconds = Some(12.0);
    assert_eq!(estimated_duration(&settings, 30.0), 12.0);
}

#[test]
fn test_generation_estimate_for_project() {
    let project = ProjectRecord {
        id: "p1".to_string(),
        user_id: "u1".to_string(),
        clips: vec![
            ClipRef::new("a", "a.mp4", 5.0),
            ClipRef::new("b", "b.mp4", 3.0),
            ClipRef::new("c", "c.mp4", 2.0),
        ],
        groups: vec![],
    };
    let settings = GenerationSettings {
        enable_order_mixing: true,
        ..Default::default()
    };

    let estimate = GenerationEstimate::for_project(&project, &settings, 4);
    assert_eq!(estimate.total_source_clips, 3);
    assert_eq!(estimate.possible_combinations, CombinationEstimate::Exact(6));
    assert_eq!(estimate.estimated_duration_per_video, 10.0);
    assert_eq!(estimate.strength_label, "Weak");
}
