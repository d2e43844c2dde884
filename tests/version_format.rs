//! `build.rs` must embed a bare semver-ish `SHEETDO_VERSION`.
//!
//! Release builds get it from `SHEETDO_RELEASE_VERSION` with any `v` prefix
//! stripped; dev builds fall back to the Cargo.toml version (`0.0.0-dev`).

const VERSION: &str = env!("SHEETDO_VERSION");

#[test]
fn version_has_no_v_prefix() {
    assert!(
        !VERSION.starts_with('v'),
        "SHEETDO_VERSION must not start with 'v' (got {VERSION:?})"
    );
}

#[test]
fn version_starts_with_digit() {
    assert!(
        VERSION.starts_with(|c: char| c.is_ascii_digit()),
        "SHEETDO_VERSION must start with a digit (got {VERSION:?})"
    );
}

#[test]
fn dev_build_version_matches_cargo_toml() {
    if VERSION.contains("-dev") {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
