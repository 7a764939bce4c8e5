use std::fs;

use tempfile::tempdir;

use jersey::config::{load_and_validate_config, DEFAULT_PLACEHOLDER};
use jersey::schema::{Color, Region};

#[test]
fn partial_config_fills_defaults_and_roots_paths() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r##"
asset_root: public
palette:
  - { name: White, color: "#FFFFFF" }
  - { name: Black, color: "#000" }
  - { name: Teal, color: "#008080" }
fonts:
  default_family: Oswald
  faces:
    Oswald: fonts/Oswald.ttf
mesh:
  nodes:
    front: Front_Panel
    back: Back_Panel
"##,
    )
    .expect("config should write");

    let catalog = load_and_validate_config(&path).expect("config should load");
    assert_eq!(catalog.palette.len(), 3);
    assert_eq!(catalog.palette.get("Teal"), Some(Color::rgb(0, 0x80, 0x80)));
    assert_eq!(catalog.palette.black(), Color::BLACK);
    assert_eq!(catalog.asset_root, dir.path().join("public"));
    assert_eq!(
        catalog.fonts.faces.get("Oswald"),
        Some(&dir.path().join("fonts/Oswald.ttf"))
    );
    assert_eq!(catalog.placeholder, DEFAULT_PLACEHOLDER);
    assert_eq!(catalog.patterns.len(), 12);
    assert_eq!(catalog.mesh.nodes.len(), 2);
    assert_eq!(
        catalog.mesh.nodes.get(&Region::Front).map(String::as_str),
        Some("Front_Panel")
    );
    assert_eq!(
        catalog.resolve_asset_path("/textures/design/texture3.jpg"),
        dir.path().join("public/textures/design/texture3.jpg")
    );
}

#[test]
fn unknown_fields_report_their_location() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("catalog.yaml");
    fs::write(&path, "placeholder: /logo.png\nsparkle: true\n").expect("config should write");

    let error = load_and_validate_config(&path).expect_err("unknown field should fail");
    let message = format!("{error:#}");
    assert!(message.contains("line 2"), "{message}");
    assert!(message.contains("sparkle"), "{message}");
}

#[test]
fn semantic_errors_name_the_offending_entry() {
    let dir = tempdir().expect("tempdir should create");
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r#"
fabrics:
  - name: default
"#,
    )
    .expect("config should write");
    let error = load_and_validate_config(&path).expect_err("missing polyster should fail");
    assert!(format!("{error:#}").contains("polyster"));

    fs::write(
        &path,
        r#"
fonts:
  fallback: Missing
"#,
    )
    .expect("config should write");
    let error = load_and_validate_config(&path).expect_err("dangling fallback should fail");
    assert!(format!("{error:#}").contains("fonts.fallback 'Missing'"));

    fs::write(&path, "palette:\n  - { name: White, color: \"white\" }\n")
        .expect("config should write");
    let error = load_and_validate_config(&path).expect_err("bad color should fail");
    assert!(format!("{error:#}").contains("must start with '#'"));
}
