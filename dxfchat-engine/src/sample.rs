//! 演示用户型图：外墙、内墙、两扇门、房间名称与总尺寸标注。

use std::f64::consts::{FRAC_PI_2, PI};

use dxfchat_core::document::Document;
use dxfchat_core::geometry::Point2;

pub const WALLS: &str = "WALLS";
pub const DOORS: &str = "DOORS";
pub const DIMENSIONS: &str = "DIMENSIONS";
pub const TEXT: &str = "TEXT";

const ROOM_TEXT_HEIGHT: f64 = 300.0;
const DIMENSION_TEXT_HEIGHT: f64 = 200.0;

/// 10000 x 8000 的示例平面图。
pub fn floorplan() -> Document {
    let mut doc = Document::new();
    doc.add_layer(WALLS, 7);
    doc.add_layer(DOORS, 4);
    doc.add_layer(DIMENSIONS, 6);
    doc.add_layer(TEXT, 3);

    let p = Point2::new;

    doc.add_polyline(
        [
            p(0.0, 0.0),
            p(10000.0, 0.0),
            p(10000.0, 8000.0),
            p(0.0, 8000.0),
            p(0.0, 0.0),
        ],
        false,
        WALLS,
    );
    doc.add_line(p(4000.0, 0.0), p(4000.0, 4000.0), WALLS);
    doc.add_line(p(4000.0, 4000.0), p(6000.0, 4000.0), WALLS);
    doc.add_line(p(6000.0, 4000.0), p(6000.0, 8000.0), WALLS);

    doc.add_arc(p(4000.0, 2500.0), 800.0, 0.0, FRAC_PI_2, DOORS);
    doc.add_arc(p(7500.0, 4000.0), 800.0, FRAC_PI_2, PI, DOORS);

    for (label, x, y) in [
        ("LIVING ROOM", 2000.0, 6000.0),
        ("KITCHEN", 2000.0, 2000.0),
        ("BEDROOM", 7500.0, 6000.0),
        ("BATHROOM", 7500.0, 2000.0),
    ] {
        doc.add_text(p(x, y), label, ROOM_TEXT_HEIGHT, 0.0, TEXT);
    }

    // 水平总尺寸
    doc.add_line(p(0.0, -500.0), p(10000.0, -500.0), DIMENSIONS);
    doc.add_line(p(0.0, -300.0), p(0.0, -700.0), DIMENSIONS);
    doc.add_line(p(10000.0, -300.0), p(10000.0, -700.0), DIMENSIONS);
    doc.add_text(p(5000.0, -800.0), "10000", DIMENSION_TEXT_HEIGHT, 0.0, DIMENSIONS);

    // 竖直总尺寸
    doc.add_line(p(-500.0, 0.0), p(-500.0, 8000.0), DIMENSIONS);
    doc.add_line(p(-300.0, 0.0), p(-700.0, 0.0), DIMENSIONS);
    doc.add_line(p(-300.0, 8000.0), p(-700.0, 8000.0), DIMENSIONS);
    doc.add_text(p(-1200.0, 4000.0), "8000", DIMENSION_TEXT_HEIGHT, 0.0, DIMENSIONS);

    doc
}
