//! 单页 PDF 1.4 输出。曲线离散为折线，文字使用内置 Helvetica。

use std::fmt::Write;

use tracing::debug;
use dxfchat_core::document::{Document, Entity};
use dxfchat_core::geometry::Point2;
use dxfchat_core::tessellate;

use crate::aci::Rgb;
use crate::{
    BASE_LINEWEIGHT_MM, BackgroundPolicy, LINE_SPACING, Page, RenderProfile, entity_color, num,
    visible_entities,
};

const PT_PER_MM: f64 = 72.0 / 25.4;

/// 图纸坐标到页面坐标（点）。PDF 的 y 轴向上，与图纸一致。
struct PageTransform {
    origin: Point2,
    scale: f64,
}

impl PageTransform {
    fn apply(&self, point: Point2) -> (f64, f64) {
        (
            (point.x() - self.origin.x()) * self.scale,
            (point.y() - self.origin.y()) * self.scale,
        )
    }
}

/// 将文档渲染为单页 PDF。
pub fn render_pdf(document: &Document, profile: &RenderProfile) -> Vec<u8> {
    let page = Page::fit(document, profile.page_width);
    let transform = PageTransform {
        origin: page.extents.min(),
        scale: page.scale,
    };

    let mut content = String::new();
    if profile.background == BackgroundPolicy::White {
        let _ = writeln!(
            content,
            "1 1 1 rg 0 0 {} {} re f",
            num(page.width),
            num(page.height)
        );
    }
    let _ = writeln!(
        content,
        "{} w 1 J 1 j",
        num(BASE_LINEWEIGHT_MM * PT_PER_MM * profile.lineweight_scaling)
    );

    let mut strokes = 0usize;
    let mut labels = 0usize;
    for (_, entity) in visible_entities(document) {
        let color = entity_color(document, entity, profile);
        match entity {
            Entity::Text(text) => {
                labels += 1;
                write_text(
                    &mut content,
                    &transform,
                    color,
                    text.insert,
                    text.rotation,
                    text.height,
                    &[text.content.as_str()],
                    false,
                );
            }
            Entity::MText(mtext) => {
                labels += 1;
                let lines: Vec<&str> = mtext.content.split('\n').collect();
                write_text(
                    &mut content,
                    &transform,
                    color,
                    mtext.insert,
                    mtext.direction.angle(),
                    mtext.height,
                    &lines,
                    true,
                );
            }
            _ => {
                for polyline in tessellate::entity_polylines(entity) {
                    strokes += 1;
                    write_stroke(&mut content, &transform, color, &polyline);
                }
            }
        }
    }

    debug!(strokes, labels, width = page.width, height = page.height, "PDF 渲染完成");
    assemble(page.width, page.height, content.as_bytes())
}

fn write_stroke(content: &mut String, transform: &PageTransform, color: Rgb, points: &[Point2]) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    let (r, g, b) = color.unit();
    let (x, y) = transform.apply(*first);
    let _ = write!(
        content,
        "{} {} {} RG {} {} m",
        num(r),
        num(g),
        num(b),
        num(x),
        num(y)
    );
    for point in rest {
        let (x, y) = transform.apply(*point);
        let _ = write!(content, " {} {} l", num(x), num(y));
    }
    content.push_str(" S\n");
}

/// `from_top` 为真时插入点位于首行顶部。
#[allow(clippy::too_many_arguments)]
fn write_text(
    content: &mut String,
    transform: &PageTransform,
    color: Rgb,
    insert: Point2,
    rotation: f64,
    height: f64,
    lines: &[&str],
    from_top: bool,
) {
    let size = height.abs() * transform.scale;
    if size <= f64::EPSILON {
        return;
    }
    let (r, g, b) = color.unit();
    let (cos, sin) = (rotation.cos(), rotation.sin());
    let (x0, y0) = transform.apply(insert);
    let first = if from_top { -size } else { 0.0 };
    let _ = write!(
        content,
        "BT {} {} {} rg /F1 {} Tf",
        num(r),
        num(g),
        num(b),
        num(size)
    );
    for (index, line) in lines.iter().enumerate() {
        // 行基线沿文字方向的法向向下偏移
        let offset = first - index as f64 * size * LINE_SPACING;
        let x = x0 - offset * sin;
        let y = y0 + offset * cos;
        let _ = write!(
            content,
            " {} {} {} {} {} {} Tm ({}) Tj",
            num(cos),
            num(sin),
            num(-sin),
            num(cos),
            num(x),
            num(y),
            pdf_string(line)
        );
    }
    content.push_str(" ET\n");
}

/// 转义为 PDF 字面字符串内容（WinAnsi）。超出 Latin-1 的字符替换为 `?`。
pub(crate) fn pdf_string(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(escaped, "\\{:03o}", ch as u32);
            }
            _ => escaped.push('?'),
        }
    }
    escaped
}

/// 拼装对象、交叉引用表与文件尾。
fn assemble(width: f64, height: f64, content: &[u8]) -> Vec<u8> {
    let mut objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}] \
             /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>",
            num(width),
            num(height)
        )
        .into_bytes(),
    ];
    let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
    stream.extend_from_slice(content);
    stream.extend_from_slice(b"\nendstream");
    objects.push(stream);
    objects.push(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
    );

    let mut out: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(xref, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n",
        objects.len() + 1
    );
    out.extend_from_slice(xref.as_bytes());
    out
}
