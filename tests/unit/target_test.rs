//! Tests for src/target - Target and TargetFlags

use gardenctl::target::{Target, TargetFlags};

// ============================================================================
// Target invariants
// ============================================================================

#[test]
fn test_empty_target_is_valid() {
    assert!(Target::default().validate().is_ok());
}

#[test]
fn test_project_without_garden_is_invalid() {
    let target = Target::new("", "prod", "", "");
    assert_eq!(target.validate().unwrap_err().kind(), "NoGardenTargeted");
}

#[test]
fn test_control_plane_requires_shoot() {
    let target = Target::new("g", "prod", "", "").with_control_plane(true);
    assert_eq!(target.validate().unwrap_err().kind(), "NoShootTargeted");
}

#[test]
fn test_project_and_seed_only_with_shoot() {
    assert!(Target::new("g", "prod", "seed", "").validate().is_err());
    assert!(Target::new("g", "prod", "seed", "shoot").validate().is_ok());
}

#[test]
fn test_to_flags_prefers_project_over_seed() {
    let target = Target::new("g", "prod", "seed", "shoot").with_control_plane(true);
    assert_eq!(target.to_flags(), "--garden g --project prod --shoot shoot --control-plane");
    assert_eq!(Target::new("g", "", "seed", "shoot").to_flags(), "--garden g --seed seed --shoot shoot");
}

#[test]
fn test_yaml_omits_empty_fields() {
    let yaml = serde_yaml::to_string(&Target::new("g", "prod", "", "")).unwrap();
    assert_eq!(yaml, "garden: g\nproject: prod\n");
}

// ============================================================================
// Flag overrides
// ============================================================================

#[test]
fn test_garden_flag_resets_lower_levels() {
    let current = Target::new("g1", "prod", "seed", "shoot");
    let flags = TargetFlags::new("g2", "", "", "", false);
    assert_eq!(flags.override_target(&current).unwrap(), Target::new("g2", "", "", ""));
}

#[test]
fn test_no_flags_keep_current() {
    let current = Target::new("g1", "prod", "", "shoot");
    assert_eq!(TargetFlags::default().override_target(&current).unwrap(), current);
}

#[test]
fn test_project_and_seed_flags_conflict() {
    let flags = TargetFlags::new("", "prod", "seed", "", false);
    assert_eq!(
        flags.override_target(&Target::default()).unwrap_err().kind(),
        "InvalidArgument"
    );
}
