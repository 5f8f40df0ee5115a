//! SVG 预览输出。几何直接使用图纸坐标，通过 `scale(1,-1)` 翻转 y 轴。

use std::f64::consts::TAU;
use std::fmt::Write;

use tracing::debug;
use dxfchat_core::document::{Document, Entity, canonical_interval};
use dxfchat_core::geometry::{BulgeArc, Point2};
use dxfchat_core::tessellate;

use crate::{
    BASE_LINEWEIGHT_MM, BackgroundPolicy, LINE_SPACING, Page, RenderProfile, entity_color, num,
    visible_entities,
};

/// CSS 像素与毫米的换算（96 dpi）。
const PX_PER_MM: f64 = 96.0 / 25.4;

/// 将文档渲染为独立的 SVG 文本，空文档也会得到合法的 SVG。
pub fn render_svg(document: &Document, profile: &RenderProfile) -> String {
    let page = Page::fit(document, profile.page_width);
    let extents = page.extents;
    // 线宽按输出像素给定，换算回图纸单位
    let stroke_width = BASE_LINEWEIGHT_MM * PX_PER_MM * profile.lineweight_scaling / page.scale;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}">"#,
        num(page.width),
        num(page.height),
        num(extents.min().x()),
        num(-extents.max().y()),
        num(extents.width()),
        num(extents.height()),
    );
    if profile.background == BackgroundPolicy::White {
        let _ = writeln!(
            svg,
            r##"  <rect x="{}" y="{}" width="{}" height="{}" fill="#ffffff"/>"##,
            num(extents.min().x()),
            num(-extents.max().y()),
            num(extents.width()),
            num(extents.height()),
        );
    }
    let _ = writeln!(
        svg,
        r#"  <g transform="scale(1,-1)" fill="none" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round">"#,
        num(stroke_width),
    );

    let mut drawn = 0usize;
    for (_, entity) in visible_entities(document) {
        let color = entity_color(document, entity, profile).hex();
        if let Some(element) = entity_element(entity, &color) {
            let _ = writeln!(svg, "    {element}");
            drawn += 1;
        }
    }

    svg.push_str("  </g>\n</svg>\n");
    debug!(entities = drawn, width = page.width, height = page.height, "SVG 渲染完成");
    svg
}

fn entity_element(entity: &Entity, color: &str) -> Option<String> {
    let layer = xml_escape(entity.layer_name());
    match entity {
        Entity::Line(line) => Some(format!(
            r#"<line data-layer="{layer}" x1="{}" y1="{}" x2="{}" y2="{}" stroke="{color}"/>"#,
            num(line.start.x()),
            num(line.start.y()),
            num(line.end.x()),
            num(line.end.y()),
        )),
        Entity::Circle(circle) => Some(format!(
            r#"<circle data-layer="{layer}" cx="{}" cy="{}" r="{}" stroke="{color}"/>"#,
            num(circle.center.x()),
            num(circle.center.y()),
            num(circle.radius.abs()),
        )),
        Entity::Arc(arc) => {
            let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
            let span = end - start;
            if span >= TAU - 1e-9 {
                return Some(format!(
                    r#"<circle data-layer="{layer}" cx="{}" cy="{}" r="{}" stroke="{color}"/>"#,
                    num(arc.center.x()),
                    num(arc.center.y()),
                    num(arc.radius.abs()),
                ));
            }
            let from = polar(arc.center, arc.radius, start);
            let to = polar(arc.center, arc.radius, end);
            let large = u8::from(span > TAU / 2.0);
            // 翻转后的坐标系中 sweep-flag=1 对应图纸中的逆时针
            Some(format!(
                r#"<path data-layer="{layer}" d="M {} {} A {r} {r} 0 {large} 1 {} {}" stroke="{color}"/>"#,
                num(from.x()),
                num(from.y()),
                num(to.x()),
                num(to.y()),
                r = num(arc.radius.abs()),
            ))
        }
        Entity::Ellipse(ellipse) => {
            let full = (ellipse.end_parameter - ellipse.start_parameter).abs() < 1e-9
                || (ellipse.end_parameter - ellipse.start_parameter).abs() >= TAU - 1e-9;
            if full {
                let major = ellipse.major_axis;
                Some(format!(
                    r#"<ellipse data-layer="{layer}" cx="{cx}" cy="{cy}" rx="{}" ry="{}" transform="rotate({} {cx} {cy})" stroke="{color}"/>"#,
                    num(major.length()),
                    num(major.length() * ellipse.ratio.abs()),
                    num(major.angle().to_degrees()),
                    cx = num(ellipse.center.x()),
                    cy = num(ellipse.center.y()),
                ))
            } else {
                polyline_elements(&tessellate::entity_polylines(entity), &layer, color)
            }
        }
        Entity::Polyline(polyline) => {
            let vertices = &polyline.vertices;
            let first = vertices.first()?;
            let mut d = format!("M {} {}", num(first.position.x()), num(first.position.y()));
            let count = vertices.len();
            let segments = if polyline.is_closed { count } else { count - 1 };
            for index in 0..segments {
                let current = &vertices[index];
                let next = &vertices[(index + 1) % count];
                match BulgeArc::from_segment(current.position, next.position, current.bulge) {
                    Some(arc) => {
                        let _ = write!(
                            d,
                            " A {r} {r} 0 {} {} {} {}",
                            u8::from(arc.is_large()),
                            u8::from(arc.sweep > 0.0),
                            num(next.position.x()),
                            num(next.position.y()),
                            r = num(arc.radius),
                        );
                    }
                    None => {
                        let _ = write!(
                            d,
                            " L {} {}",
                            num(next.position.x()),
                            num(next.position.y())
                        );
                    }
                }
            }
            if polyline.is_closed {
                d.push_str(" Z");
            }
            Some(format!(
                r#"<path data-layer="{layer}" d="{d}" stroke="{color}"/>"#
            ))
        }
        Entity::Text(text) => Some(text_element(
            &layer,
            color,
            text.insert,
            text.rotation,
            text.height,
            &[text.content.as_str()],
            false,
        )),
        Entity::MText(mtext) => {
            let lines: Vec<&str> = mtext.content.split('\n').collect();
            Some(text_element(
                &layer,
                color,
                mtext.insert,
                mtext.direction.angle(),
                mtext.height,
                &lines,
                true,
            ))
        }
    }
}

fn polyline_elements(polylines: &[Vec<Point2>], layer: &str, color: &str) -> Option<String> {
    let points = polylines.first()?;
    let mut list = String::new();
    for (index, point) in points.iter().enumerate() {
        if index > 0 {
            list.push(' ');
        }
        let _ = write!(list, "{},{}", num(point.x()), num(point.y()));
    }
    Some(format!(
        r#"<polyline data-layer="{layer}" points="{list}" stroke="{color}"/>"#
    ))
}

/// 文字在局部坐标中再翻转一次，使字形正向显示。
/// `from_top` 为真时插入点位于首行顶部（MTEXT），否则位于基线（TEXT）。
fn text_element(
    layer: &str,
    color: &str,
    insert: Point2,
    rotation: f64,
    height: f64,
    lines: &[&str],
    from_top: bool,
) -> String {
    let height = height.abs();
    let mut out = format!(
        r#"<text data-layer="{layer}" x="0" y="0" font-family="sans-serif" font-size="{}" fill="{color}" stroke="none" transform="translate({} {}) rotate({}) scale(1 -1)">"#,
        num(height),
        num(insert.x()),
        num(insert.y()),
        num(rotation.to_degrees()),
    );
    if let [single] = lines {
        if !from_top {
            out.push_str(&xml_escape(single));
            out.push_str("</text>");
            return out;
        }
    }
    let first_baseline = if from_top { height } else { 0.0 };
    for (index, line) in lines.iter().enumerate() {
        let y = first_baseline + index as f64 * height * LINE_SPACING;
        let _ = write!(
            out,
            r#"<tspan x="0" y="{}">{}</tspan>"#,
            num(y),
            xml_escape(line)
        );
    }
    out.push_str("</text>");
    out
}

fn polar(center: Point2, radius: f64, angle: f64) -> Point2 {
    Point2::new(
        center.x() + radius * angle.cos(),
        center.y() + radius * angle.sin(),
    )
}

pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            // XML 1.0 不允许的控制字符直接丢弃
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => escaped.push(c),
        }
    }
    escaped
}
