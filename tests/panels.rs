use jersey::config::Catalog;
use jersey::controls::{Binding, ControlOptions, ControlValue};
use jersey::layers::{LayerField, LayerKind};
use jersey::panels::{build_panel, Panel, SLEEVE_ROTATION_Y};

#[test]
fn sleeves_mirror_each_other_except_rotation_y() {
    let catalog = Catalog::default();
    let left = build_panel(Panel::LeftSleeve, &catalog);
    let right = build_panel(Panel::RightSleeve, &catalog);

    let left_keys: Vec<&str> = left.keys().collect();
    let right_keys: Vec<&str> = right.keys().collect();
    assert_eq!(left_keys, right_keys, "sleeve panels should expose the same keys");

    let mut differing = Vec::new();
    for (key, control) in left.iter() {
        let other = right.get(key).expect("key present on both sleeves");
        assert_eq!(control.bounds, other.bounds, "{key} bounds");
        assert_eq!(control.options, other.options, "{key} options");
        if control.value != other.value {
            differing.push(key.to_owned());
        }
    }
    assert_eq!(
        differing,
        vec!["LogoRotationY", "NameRotationY", "NumberRotationY"]
    );
    assert_eq!(
        left.get("LogoRotationY").expect("logo rotation").value,
        ControlValue::Number(SLEEVE_ROTATION_Y)
    );
    assert_eq!(
        right.get("NumberRotationY").expect("number rotation").value,
        ControlValue::Number(-SLEEVE_ROTATION_Y)
    );
}

#[test]
fn sleeve_text_defaults_and_bounds() {
    let catalog = Catalog::default();
    let left = build_panel(Panel::LeftSleeve, &catalog);

    assert_eq!(
        left.get("NameText").expect("name text").value,
        ControlValue::Text("TEAM NAME".to_owned())
    );
    assert_eq!(
        left.get("NumberText").expect("number text").value,
        ControlValue::Text("23".to_owned())
    );
    let scale = left.get("NameScale").expect("name scale");
    assert_eq!(scale.value, ControlValue::Number(0.5));
    let bounds = scale.bounds.expect("scale is bounded");
    assert_eq!((bounds.min, bounds.max), (0.02, 0.9));
    assert_eq!(
        left.get("NumberRotationZ").expect("rotation z").value,
        ControlValue::Number(-180.0)
    );
    assert!(left.get("Reset").is_some());
}

#[test]
fn chest_panels_seed_branding_defaults() {
    let catalog = Catalog::default();
    let front = build_panel(Panel::FrontBranding, &catalog);

    assert_eq!(
        front.get("NumberFontSize").expect("number font size").value,
        ControlValue::Number(166.0)
    );
    assert_eq!(
        front.get("NameFontSize").expect("name font size").value,
        ControlValue::Number(70.0)
    );
    assert_eq!(
        front.get("SponsorScale").expect("sponsor scale").value,
        ControlValue::Number(0.15)
    );
    assert_eq!(
        front.get("NameStrokeWidth").expect("stroke width").value,
        ControlValue::Number(5.0)
    );
    match &front.get("NameFontFamily").expect("font family").options {
        Some(ControlOptions::Choices(choices)) => {
            assert_eq!(choices.first().map(String::as_str), Some("Arial"));
            assert!(choices.iter().any(|family| family == "Oswald"));
        }
        other => panic!("font family should offer choices, got {other:?}"),
    }
}

#[test]
fn texture_branding_wires_every_layer() {
    let catalog = Catalog::default();
    let group = build_panel(Panel::TextureBranding, &catalog);

    assert_eq!(
        group.get("Texture").expect("pattern picker").binding,
        Binding::Layer {
            kind: LayerKind::Pattern,
            field: LayerField::Load
        }
    );
    assert_eq!(
        group.get("TextureimageGallery").expect("pattern gallery").binding,
        Binding::Layer {
            kind: LayerKind::Pattern,
            field: LayerField::Load
        }
    );
    assert_eq!(
        group.get("OffsetX").expect("gradient offset").binding,
        Binding::Layer {
            kind: LayerKind::Gradient,
            field: LayerField::OffsetX
        }
    );
    assert_eq!(
        group.get("BackObject").expect("object toggle").binding,
        Binding::Layer {
            kind: LayerKind::Object,
            field: LayerField::Back
        }
    );
    assert!(group.get("ObjectOffsetX").is_none());
    assert_eq!(
        group.get("CollarGradient").expect("gradient collar").folder.as_deref(),
        Some("Gradient")
    );
}

#[test]
fn schema_json_is_keyed_by_control_name() {
    let catalog = Catalog::default();
    let group = build_panel(Panel::Colors, &catalog);
    let json = serde_json::to_value(&group).expect("panel serializes");

    let base = &json["BaseColor"];
    assert_eq!(base["value"]["type"], "color");
    assert_eq!(base["value"]["value"], "#FFFFFF");
    assert_eq!(base["folder"], "Color");
    assert_eq!(json["Reset"]["value"]["type"], "button");
}
