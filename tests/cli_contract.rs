use std::fs;
use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::tempdir;

fn run_jersey(cwd: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jersey"))
        .current_dir(cwd)
        .args(args)
        .output()
        .expect("jersey command should run")
}

fn write_assets(root: &Path, paths: &[&str]) {
    for path in paths {
        let target = root.join(path.trim_start_matches('/'));
        fs::create_dir_all(target.parent().expect("asset has a parent"))
            .expect("asset dir should create");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 40, 40]))
            .save(&target)
            .expect("asset should write");
    }
}

#[test]
fn schema_prints_panel_controls_as_json() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_jersey(dir.path(), &["schema", "left-sleeve"]);
    assert!(output.status.success(), "schema should succeed");

    let json: Value = serde_json::from_slice(&output.stdout).expect("schema should be json");
    assert_eq!(json["LogoRotationY"]["value"]["value"], 82.0);
    assert_eq!(json["NameText"]["value"]["value"], "TEAM NAME");
    assert!(json.get("Reset").is_some());
}

#[test]
fn check_rejects_invalid_config() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(dir.path().join("bad.yaml"), "palette: []\n").expect("config should write");
    let output = run_jersey(dir.path(), &["check", "bad.yaml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("palette must define at least one color"), "{stderr}");
}

#[test]
fn compose_applies_edits_and_reports_the_scene() {
    let dir = tempdir().expect("tempdir should create");
    write_assets(
        &dir.path().join("public"),
        &["/assets/logo/nys1.png", "/textures/design/texture3.jpg"],
    );
    fs::write(
        dir.path().join("catalog.yaml"),
        "asset_root: public\nfabrics:\n  - name: polyster\n  - name: default\n",
    )
    .expect("config should write");
    fs::write(
        dir.path().join("edits.yaml"),
        r#"
- { panel: colors, key: BaseColor, value: Red }
- { panel: texture_branding, key: Texture, value: /textures/design/texture3.jpg }
- { panel: front_branding, key: NumberText, value: "9" }
"#,
    )
    .expect("edits should write");

    let output = run_jersey(
        dir.path(),
        &["compose", "catalog.yaml", "--edits", "edits.yaml"],
    );
    assert!(
        output.status.success(),
        "compose should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: Value = serde_json::from_slice(&output.stdout).expect("report should be json");
    assert_eq!(report["fabric"], "polyster");

    let regions = report["regions"].as_array().expect("regions array");
    let front = regions
        .iter()
        .find(|region| region["region"] == "front")
        .expect("front region");
    assert_eq!(front["color"], "#D0102C");
    let decals = front["decals"].as_array().expect("decals array");
    assert_eq!(decals[0]["layer"], "pattern");
    assert_eq!(decals[0]["source"], "/textures/design/texture3.jpg");
    assert!(decals.iter().any(|decal| decal["layer"] == "logo"));
    assert!(!decals.iter().any(|decal| decal["layer"] == "number"));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(
        stderr.matches("no font faces configured").count(),
        1,
        "{stderr}"
    );
}

#[test]
fn compose_reports_unknown_controls() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(dir.path().join("catalog.yaml"), "placeholder: /logo.png\n")
        .expect("config should write");
    fs::write(
        dir.path().join("edits.yaml"),
        "- { panel: colors, key: Sparkle, value: true }\n",
    )
    .expect("edits should write");
    let output = run_jersey(
        dir.path(),
        &["compose", "catalog.yaml", "--edits", "edits.yaml"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("has no control 'Sparkle'"), "{stderr}");
}
