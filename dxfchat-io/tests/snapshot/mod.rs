use serde_json::{Value, json};
use dxfchat_core::document::{Document, Entity, PolylineVertex};
use dxfchat_core::geometry::{Point2, Vector2};

const TOLERANCE: f64 = 1e-9;

/// 将文档转换为便于比较的 JSON 快照，实体按 id 顺序排列。
pub fn document_snapshot(document: &Document) -> Value {
    let layers: Vec<Value> = document
        .layers()
        .map(|layer| {
            json!({
                "name": layer.name,
                "color": layer.color,
                "is_visible": layer.is_visible
            })
        })
        .collect();
    let entities: Vec<Value> = document
        .entities()
        .map(|(_, entity)| {
            json!({
                "kind": entity.kind().as_dxf_name(),
                "layer": entity.layer_name(),
                "data": entity_payload(entity)
            })
        })
        .collect();
    json!({ "layers": layers, "entities": entities })
}

/// 数值按容差比较，其余字段要求完全一致。
pub fn assert_close(actual: &Value, expected: &Value) {
    if let Err(path) = compare(actual, expected, String::from("$")) {
        panic!(
            "快照在 {path} 处不一致\n实际：{}\n期望：{}",
            serde_json::to_string_pretty(actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }
}

fn compare(actual: &Value, expected: &Value, path: String) -> Result<(), String> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => {
            let (a, b) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            if (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0) {
                Ok(())
            } else {
                Err(path)
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(format!("{path}.len"));
            }
            for (index, (x, y)) in a.iter().zip(b).enumerate() {
                compare(x, y, format!("{path}[{index}]"))?;
            }
            Ok(())
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.len() != b.len() {
                return Err(format!("{path}.keys"));
            }
            for (key, x) in a {
                let y = b.get(key).ok_or_else(|| format!("{path}.{key}"))?;
                compare(x, y, format!("{path}.{key}"))?;
            }
            Ok(())
        }
        (a, b) if a == b => Ok(()),
        _ => Err(path),
    }
}

fn entity_payload(entity: &Entity) -> Value {
    match entity {
        Entity::Line(line) => json!({
            "start": point_to_array(line.start),
            "end": point_to_array(line.end)
        }),
        Entity::Circle(circle) => json!({
            "center": point_to_array(circle.center),
            "radius": circle.radius
        }),
        Entity::Arc(arc) => json!({
            "center": point_to_array(arc.center),
            "radius": arc.radius,
            "start_angle": arc.start_angle,
            "end_angle": arc.end_angle
        }),
        Entity::Ellipse(ellipse) => json!({
            "center": point_to_array(ellipse.center),
            "major_axis": vector_to_array(ellipse.major_axis),
            "ratio": ellipse.ratio,
            "start_parameter": ellipse.start_parameter,
            "end_parameter": ellipse.end_parameter
        }),
        Entity::Polyline(polyline) => {
            let vertices: Vec<Value> = polyline.vertices.iter().map(vertex_to_value).collect();
            json!({
                "is_closed": polyline.is_closed,
                "vertices": vertices
            })
        }
        Entity::Text(text) => json!({
            "insert": point_to_array(text.insert),
            "content": text.content,
            "height": text.height,
            "rotation": text.rotation
        }),
        Entity::MText(mtext) => json!({
            "insert": point_to_array(mtext.insert),
            "content": mtext.content,
            "height": mtext.height,
            "reference_width": mtext.reference_width,
            "direction": vector_to_array(mtext.direction),
            "attachment_point": mtext.attachment_point,
            "style": mtext.style
        }),
    }
}

fn vertex_to_value(vertex: &PolylineVertex) -> Value {
    json!({
        "position": point_to_array(vertex.position),
        "bulge": vertex.bulge
    })
}

fn point_to_array(point: Point2) -> [f64; 2] {
    [point.x(), point.y()]
}

fn vector_to_array(vector: Vector2) -> [f64; 2] {
    let v = vector.as_vec2();
    [v.x, v.y]
}
