use std::f64::consts::FRAC_PI_2;

use dxfchat_core::document::{Document, Entity, EntityKind};
use dxfchat_engine::command::EditBus;
use dxfchat_engine::errors::EngineError;
use dxfchat_engine::sample::{self, DIMENSIONS, DOORS, TEXT, WALLS};

fn run(document: &mut Document, script: &str) -> Result<String, EngineError> {
    EditBus::new()
        .run(script, document)
        .map(|report| report.summary())
}

fn texts(document: &Document) -> Vec<String> {
    document
        .entities()
        .filter_map(|(_, entity)| entity.text_content().map(str::to_string))
        .collect()
}

fn failure_message(result: Result<String, EngineError>) -> String {
    match result {
        Err(EngineError::Operation { message, .. }) => message,
        other => panic!("期望 Operation 错误，实际为 {other:?}"),
    }
}

#[test]
fn delete_dimension_layer_content() {
    let mut doc = sample::floorplan();
    let summary = run(&mut doc, r#"[{"op": "delete", "layer": "DIMENSIONS"}]"#).unwrap();
    assert_eq!(summary, "8 element(s) removed");
    assert_eq!(doc.count_on_layer(DIMENSIONS), 0);
    assert!(doc.layer(DIMENSIONS).is_some(), "删除实体不应删除图层");
}

#[test]
fn rename_room_label() {
    let mut doc = sample::floorplan();
    let summary = run(
        &mut doc,
        r#"[{"op": "set_text", "text": "KITCHEN", "value": "DINING ROOM"}]"#,
    )
    .unwrap();
    assert_eq!(summary, "Changes applied successfully");
    let labels = texts(&doc);
    assert!(labels.contains(&"DINING ROOM".to_string()));
    assert!(!labels.contains(&"KITCHEN".to_string()));
}

#[test]
fn replace_text_across_layer() {
    let mut doc = sample::floorplan();
    run(
        &mut doc,
        r#"[{"op": "replace_text", "layer": "TEXT", "find": "ROOM", "replace": "AREA"}]"#,
    )
    .unwrap();
    let labels = texts(&doc);
    assert!(labels.contains(&"LIVING AREA".to_string()));
    assert!(labels.contains(&"BATHAREA".to_string()));
    assert!(labels.contains(&"KITCHEN".to_string()));
}

#[test]
fn move_entities_between_layers() {
    let mut doc = sample::floorplan();
    run(
        &mut doc,
        r#"[{"op": "set_layer", "type": "ARC", "to": "OPENINGS"}]"#,
    )
    .unwrap();
    assert_eq!(doc.count_on_layer(DOORS), 0);
    assert_eq!(doc.count_on_layer("OPENINGS"), 2);
    assert!(doc.layer("OPENINGS").is_some());
}

#[test]
fn translate_and_scale_text() {
    let mut doc = sample::floorplan();
    run(
        &mut doc,
        r#"[
            {"op": "translate", "text": "BEDROOM", "dx": 100, "dy": -50},
            {"op": "scale", "text": "BATHROOM", "factor": 2, "origin": [0, 0]}
        ]"#,
    )
    .unwrap();
    for (_, entity) in doc.entities() {
        let Entity::Text(text) = entity else { continue };
        match text.content.as_str() {
            "BEDROOM" => {
                assert!((text.insert.x() - 7600.0).abs() < 1e-9);
                assert!((text.insert.y() - 5950.0).abs() < 1e-9);
            }
            "BATHROOM" => {
                assert!((text.insert.x() - 15000.0).abs() < 1e-9);
                assert!((text.height - 600.0).abs() < 1e-9);
            }
            _ => {}
        }
    }
}

#[test]
fn scale_defaults_to_selection_center() {
    let mut doc = Document::new();
    doc.add_circle(dxfchat_core::geometry::Point2::new(10.0, 10.0), 2.0, "0");
    run(&mut doc, r#"[{"op": "scale", "type": "CIRCLE", "factor": 3}]"#).unwrap();
    let (_, entity) = doc.entities().next().unwrap();
    let Entity::Circle(circle) = entity else {
        panic!("期望圆");
    };
    assert!((circle.center.x() - 10.0).abs() < 1e-9);
    assert!((circle.radius - 6.0).abs() < 1e-9);
}

#[test]
fn set_text_height_on_room_labels() {
    let mut doc = sample::floorplan();
    run(
        &mut doc,
        r#"[{"op": "set_text_height", "layer": "TEXT", "height": 450}]"#,
    )
    .unwrap();
    for (_, entity) in doc.entities() {
        if let Entity::Text(text) = entity {
            let expected = if text.layer == TEXT { 450.0 } else { 200.0 };
            assert!((text.height - expected).abs() < 1e-9);
        }
    }
}

#[test]
fn add_geometry_reports_added_count() {
    let mut doc = sample::floorplan();
    let summary = run(
        &mut doc,
        r#"[
            {"op": "add_line", "start": [0, 4000], "end": [4000, 4000], "layer": "WALLS"},
            {"op": "add_circle", "center": [2000, 4000], "radius": 150},
            {"op": "add_arc", "center": [6000, 6000], "radius": 800, "start_angle": 90, "end_angle": 180, "layer": "DOORS"},
            {"op": "add_polyline", "points": [[100, 100], [900, 100], [900, 900]], "closed": true, "layer": "FURNITURE"},
            {"op": "add_text", "content": "STORAGE", "insert": [5000, 1000], "height": 250, "layer": "TEXT"}
        ]"#,
    )
    .unwrap();
    assert_eq!(summary, "5 element(s) added");
    assert_eq!(doc.count_on_layer(WALLS), 5);
    assert_eq!(doc.count_on_layer("0"), 1);
    assert_eq!(doc.count_on_layer("FURNITURE"), 1);

    let arc = doc
        .entities()
        .filter_map(|(_, entity)| match entity {
            Entity::Arc(arc) => Some(arc),
            _ => None,
        })
        .last()
        .unwrap();
    assert!((arc.start_angle - FRAC_PI_2).abs() < 1e-9);

    let polyline = doc
        .entities()
        .find_map(|(_, entity)| match entity {
            Entity::Polyline(polyline) if polyline.layer == "FURNITURE" => Some(polyline),
            _ => None,
        })
        .unwrap();
    assert!(polyline.is_closed);
    assert_eq!(polyline.vertices.len(), 3);
}

#[test]
fn add_text_uses_default_height() {
    let mut doc = Document::new();
    run(
        &mut doc,
        r#"[{"op": "add_text", "text": "NOTE", "position": {"x": 1, "y": 2}}]"#,
    )
    .unwrap();
    let (_, entity) = doc.entities().next().unwrap();
    let Entity::Text(text) = entity else {
        panic!("期望 TEXT");
    };
    assert_eq!(text.content, "NOTE");
    assert!((text.height - 2.5).abs() < 1e-9);
    assert_eq!(text.layer, "0");
}

#[test]
fn layer_table_operations() {
    let mut doc = sample::floorplan();
    run(
        &mut doc,
        r#"[
            {"op": "add_layer", "name": "FURNITURE", "color": 2},
            {"op": "rename_layer", "from": "TEXT", "to": "LABELS"},
            {"op": "set_layer_color", "name": "WALLS", "color": 1},
            {"op": "set_layer_visibility", "name": "DIMENSIONS", "visible": false}
        ]"#,
    )
    .unwrap();
    assert_eq!(doc.layer("FURNITURE").map(|layer| layer.color), Some(2));
    assert!(doc.layer(TEXT).is_none());
    assert_eq!(doc.count_on_layer("LABELS"), 4);
    assert_eq!(doc.layer(WALLS).map(|layer| layer.color), Some(1));
    assert!(!doc.is_layer_visible(DIMENSIONS));
}

#[test]
fn delete_layer_removes_its_entities() {
    let mut doc = sample::floorplan();
    let summary = run(&mut doc, r#"[{"op": "delete_layer", "name": "DOORS"}]"#).unwrap();
    assert_eq!(summary, "2 element(s) removed");
    assert!(doc.layer(DOORS).is_none());
    assert!(
        doc.entities()
            .all(|(_, entity)| entity.kind() != EntityKind::Arc)
    );
}

#[test]
fn failing_operation_rolls_back_whole_script() {
    let mut doc = sample::floorplan();
    let original = doc.clone();
    let message = failure_message(run(
        &mut doc,
        r#"[
            {"op": "delete", "layer": "TEXT"},
            {"op": "add_circle", "center": [0, 0], "radius": -5}
        ]"#,
    ));
    assert!(message.contains("radius"), "{message}");
    assert_eq!(doc, original);
}

#[test]
fn invalid_arguments_are_rejected() {
    let cases = [
        r#"[{"op": "add_layer", "name": "WALLS"}]"#,
        r#"[{"op": "add_layer", "name": "bad:name"}]"#,
        r#"[{"op": "set_layer_color", "name": "WALLS", "color": 300}]"#,
        r#"[{"op": "set_layer_color", "name": "MISSING", "color": 3}]"#,
        r#"[{"op": "delete_layer", "name": "0"}]"#,
        r#"[{"op": "rename_layer", "from": "TEXT", "to": "WALLS"}]"#,
        r#"[{"op": "set_text", "text": "GARAGE", "value": "X"}]"#,
        r#"[{"op": "set_text", "type": "LINE", "value": "X"}]"#,
        r#"[{"op": "scale", "layer": "WALLS", "factor": 0}]"#,
        r#"[{"op": "add_line", "start": [0, 0]}]"#,
        r#"[{"op": "add_polyline", "points": [[0, 0]]}]"#,
        r#"[{"op": "set_text_height", "layer": "WALLS", "height": 100}]"#,
        r#"[{"op": "delete", "type": "HATCH"}]"#,
    ];
    for script in cases {
        let mut doc = sample::floorplan();
        let original = doc.clone();
        let result = run(&mut doc, script);
        assert!(
            matches!(result, Err(EngineError::Operation { .. })),
            "脚本应失败: {script} => {result:?}"
        );
        assert_eq!(doc, original, "失败脚本不应修改文档: {script}");
    }
}

#[test]
fn malformed_script_is_an_invalid_script() {
    let mut doc = sample::floorplan();
    assert!(matches!(
        run(&mut doc, "doc.entities.clear()"),
        Err(EngineError::InvalidScript(_))
    ));
}
