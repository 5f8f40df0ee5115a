use tracing::debug;
use dxfchat_core::{
    document::{
        Arc, Circle, DEFAULT_LAYER_COLOR, Document, Ellipse, Entity, Layer, Line, MText, Polyline,
        PolylineVertex, Text,
    },
    geometry::{Point2, Vector2},
};

use crate::reader::{GroupReader, GroupRecord, parse_real};
use crate::{DxfError, LoadReport};

/// 3D 多段线、多边形网格与多面网格。
const POLYLINE_NON_PLANAR: i32 = 8 | 16 | 64;

type EntityBuilder = fn(&GroupRecord) -> Result<Entity, DxfError>;

pub(crate) struct DxfParser<'a> {
    reader: GroupReader<'a>,
    report: LoadReport,
}

impl<'a> DxfParser<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            reader: GroupReader::new(source),
            report: LoadReport::default(),
        }
    }

    pub(crate) fn parse(mut self) -> Result<(Document, LoadReport), DxfError> {
        let mut document = Document::new();
        let mut sections = 0usize;
        while let Some((code, marker)) = self.reader.next_pair()? {
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match marker.trim() {
                "EOF" => break,
                "SECTION" => {
                    sections += 1;
                    let name = self.section_name()?;
                    match name.as_str() {
                        "TABLES" => self.tables(&mut document)?,
                        "ENTITIES" => self.entities(&mut document)?,
                        other => {
                            debug!(section = other, "跳过段");
                            self.skip_section()?;
                        }
                    }
                }
                unexpected => {
                    return Err(DxfError::invalid(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        if sections == 0 {
            return Err(DxfError::invalid("文件中没有任何 SECTION，可能不是 DXF"));
        }
        Ok((document, self.report))
    }

    fn section_name(&mut self) -> Result<String, DxfError> {
        match self.reader.next_pair()? {
            Some((2, name)) => Ok(name.trim().to_string()),
            Some((code, _)) => Err(DxfError::invalid(format!(
                "SECTION 名称使用了组码 {code}（期望 2）"
            ))),
            None => Err(DxfError::invalid("SECTION 缺少名称（组码 2）")),
        }
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        while let Some((code, value)) = self.reader.next_pair()? {
            if code == 0 && value.trim() == "ENDSEC" {
                return Ok(());
            }
        }
        Err(DxfError::invalid("SECTION 未找到 ENDSEC 终止标记"))
    }

    /// 只读取 LAYER 表，其余表项忽略。
    fn tables(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let Some((code, value)) = self.reader.next_pair()? else {
                return Err(DxfError::invalid("TABLES 段提前结束"));
            };
            match (code, value.trim()) {
                (0, "ENDSEC") => return Ok(()),
                (0, "LAYER") => {
                    let record = self.reader.record("LAYER 记录")?;
                    document.upsert_layer(layer_from(&record)?);
                }
                _ => {}
            }
        }
    }

    fn entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let Some((code, value)) = self.reader.next_pair()? else {
                return Err(DxfError::invalid("ENTITIES 段提前结束"));
            };
            if code != 0 {
                return Err(DxfError::invalid(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }
            let kind = value.trim();
            match kind {
                "ENDSEC" => return Ok(()),
                // 游离的序列成员
                "SEQEND" | "VERTEX" => self.reader.skip_record()?,
                "POLYLINE" => {
                    if let Some(entity) = self.legacy_polyline()? {
                        document.add_entity(entity);
                    }
                }
                _ => match builder_for(kind) {
                    Some(build) => {
                        let record = self.reader.record(kind)?;
                        document.add_entity(build(&record)?);
                    }
                    None => {
                        debug!(kind, "跳过暂不支持的实体类型");
                        self.report.record_skip(kind);
                        self.reader.skip_record()?;
                    }
                },
            }
        }
    }

    /// POLYLINE 头部之后跟随若干 VERTEX，以 SEQEND 收尾。
    fn legacy_polyline(&mut self) -> Result<Option<Entity>, DxfError> {
        let header = self.reader.record("POLYLINE")?;
        let flags = header.int_or(70, "标志", 0)?;

        let mut vertices = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, marker)) if marker.trim() == "VERTEX" => {
                    let record = self.reader.record("VERTEX")?;
                    vertices.push(vertex_from(&record)?);
                }
                Some((0, marker)) if marker.trim() == "SEQEND" => {
                    self.reader.skip_record()?;
                    break;
                }
                // 缺少 SEQEND 时按序列结束处理
                Some(pair @ (0, _)) => {
                    self.reader.push_back(pair);
                    break;
                }
                Some((code, _)) => {
                    return Err(DxfError::invalid(format!(
                        "POLYLINE 序列中遇到组码 {code}（期望 0 表示 VERTEX/SEQEND）"
                    )));
                }
                None => return Err(DxfError::invalid("POLYLINE 缺少 SEQEND")),
            }
        }

        if flags & POLYLINE_NON_PLANAR != 0 {
            debug!(flags, "跳过三维多段线或网格");
            self.report.record_skip("POLYLINE");
            return Ok(None);
        }
        if vertices.is_empty() {
            return Err(DxfError::invalid("POLYLINE 未包含任何 VERTEX"));
        }
        Ok(Some(Entity::Polyline(Polyline {
            vertices,
            is_closed: flags & 0x01 == 0x01,
            layer: header.layer(),
        })))
    }
}

fn builder_for(kind: &str) -> Option<EntityBuilder> {
    let builder: EntityBuilder = match kind {
        "LINE" => line_from,
        "CIRCLE" => circle_from,
        "ARC" => arc_from,
        "ELLIPSE" => ellipse_from,
        "LWPOLYLINE" => lwpolyline_from,
        "TEXT" => text_from,
        "MTEXT" => mtext_from,
        _ => return None,
    };
    Some(builder)
}

/// 负颜色表示图层关闭，标志位 1 表示冻结。
fn layer_from(record: &GroupRecord) -> Result<Layer, DxfError> {
    let name = record
        .last(2)
        .map(|name| name.trim().to_string())
        .ok_or_else(|| DxfError::invalid("LAYER 记录缺少名称（组码 2）"))?;
    let color = record.short_or(62, "颜色", DEFAULT_LAYER_COLOR)?;
    let frozen = record.int_or(70, "标志", 0)? & 0x01 == 0x01;
    Ok(Layer {
        name,
        color: match color.checked_abs() {
            Some(0) | None => DEFAULT_LAYER_COLOR,
            Some(value) => value.min(255),
        },
        is_visible: color >= 0 && !frozen,
    })
}

fn line_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    Ok(Entity::Line(Line {
        start: record.required_point(10, "起点")?,
        end: record.required_point(11, "终点")?,
        layer: record.layer(),
    }))
}

fn circle_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    Ok(Entity::Circle(Circle {
        center: record.required_point(10, "圆心")?,
        radius: record.required_real(40, "半径")?,
        layer: record.layer(),
    }))
}

/// DXF 中的角度以度为单位。
fn arc_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    Ok(Entity::Arc(Arc {
        center: record.required_point(10, "圆心")?,
        radius: record.required_real(40, "半径")?,
        start_angle: record.required_real(50, "起始角")?.to_radians(),
        end_angle: record.required_real(51, "终止角")?.to_radians(),
        layer: record.layer(),
    }))
}

fn ellipse_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    let center = record.required_point(10, "圆心")?;
    let major = record.required_point(11, "主轴向量")?;
    if major.x().abs() < f64::EPSILON && major.y().abs() < f64::EPSILON {
        return Err(DxfError::invalid("ELLIPSE 主轴向量长度为 0，无法创建实体"));
    }
    let ratio = record.unique_real(40, "半径比")?.unwrap_or(1.0);
    if ratio <= 0.0 {
        return Err(DxfError::invalid(format!(
            "ELLIPSE 半径比必须为正数，实际为 {ratio}"
        )));
    }
    Ok(Entity::Ellipse(Ellipse {
        center,
        major_axis: Vector2::new(major.x(), major.y()),
        ratio,
        start_parameter: record.real_or(41, "起始参数", 0.0)?,
        end_parameter: record.real_or(42, "终止参数", std::f64::consts::TAU)?,
        layer: record.layer(),
    }))
}

/// 顶点由相邻的 10/20 组成，42 作用于最近的顶点。
fn lwpolyline_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    let mut vertices: Vec<PolylineVertex> = Vec::new();
    let mut half: Option<(i32, f64)> = None;
    for (code, raw) in record.pairs() {
        match code {
            10 | 20 => {
                let value = parse_real(raw, &record.label(code, "顶点坐标"))?;
                match half.take() {
                    Some((10, x)) if code == 20 => {
                        vertices.push(PolylineVertex::new(Point2::new(x, value)));
                    }
                    Some((20, y)) if code == 10 => {
                        vertices.push(PolylineVertex::new(Point2::new(value, y)));
                    }
                    Some(_) => {
                        let missing = if code == 10 { "Y（组码 20）" } else { "X（组码 10）" };
                        return Err(DxfError::invalid(format!(
                            "LWPOLYLINE 顶点缺少对应的 {missing}"
                        )));
                    }
                    None => half = Some((code, value)),
                }
            }
            42 => {
                let bulge = parse_real(raw, &record.label(42, "顶点 bulge"))?;
                let Some(vertex) = vertices.last_mut() else {
                    return Err(DxfError::invalid(
                        "LWPOLYLINE 在定义首个顶点前遇到 bulge（组码 42）",
                    ));
                };
                vertex.bulge = bulge;
            }
            _ => {}
        }
    }
    if half.is_some() {
        return Err(DxfError::invalid(
            "LWPOLYLINE 顶点坐标成对出现（组码 10/20），检测到不完整的顶点",
        ));
    }
    if vertices.is_empty() {
        return Err(DxfError::invalid("LWPOLYLINE 未解析到任何顶点"));
    }
    let flags = record.int_or(70, "标志", 0)?;
    Ok(Entity::Polyline(Polyline {
        vertices,
        is_closed: flags & 0x01 == 0x01,
        layer: record.layer(),
    }))
}

fn vertex_from(record: &GroupRecord) -> Result<PolylineVertex, DxfError> {
    let position = record.required_point(10, "坐标")?;
    let bulge = record.real_or(42, "bulge", 0.0)?;
    Ok(PolylineVertex::with_bulge(position, bulge))
}

/// 多个组码 1 视为多行内容。
fn text_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    let lines: Vec<String> = record.values(1).map(decode_inline_text).collect();
    if lines.is_empty() {
        return Err(DxfError::invalid("TEXT 缺少文本内容（组码 1）"));
    }
    Ok(Entity::Text(Text {
        insert: record.required_point(10, "插入点")?,
        content: lines.join("\n"),
        height: record.required_real(40, "文字高度")?,
        rotation: record.real_or(50, "旋转角", 0.0)?.to_radians(),
        layer: record.layer(),
    }))
}

fn mtext_from(record: &GroupRecord) -> Result<Entity, DxfError> {
    let insert = record.required_point(10, "插入点")?;
    let height = record.required_real(40, "文本高度")?;

    // 分段内容先拼接再解码，转义序列可能跨段
    let mut chunks = record
        .pairs()
        .filter(|(code, _)| matches!(code, 1 | 3))
        .map(|(_, chunk)| chunk)
        .peekable();
    if chunks.peek().is_none() {
        return Err(DxfError::invalid(format!(
            "{} 缺少内容（组码 1/3）",
            record.kind()
        )));
    }
    let raw: String = chunks.collect();

    let reference_width = record
        .optional_real(41, "参考宽度")?
        .filter(|width| width.abs() >= f64::EPSILON);
    let direction = match (
        record.optional_real(11, "方向向量 X")?,
        record.optional_real(21, "方向向量 Y")?,
    ) {
        (Some(x), Some(y)) if x.abs() >= f64::EPSILON || y.abs() >= f64::EPSILON => {
            Vector2::new(x, y)
        }
        _ => {
            let angle = record.real_or(50, "旋转角", 0.0)?.to_radians();
            Vector2::new(angle.cos(), angle.sin())
        }
    };

    Ok(Entity::MText(MText {
        insert,
        content: decode_mtext_content(&raw),
        height,
        reference_width,
        direction,
        attachment_point: record.short_or(71, "附着点", 1)?,
        style: record.last(7).map(|style| style.trim().to_string()),
        layer: record.layer(),
    }))
}

/// `\P` 换行，`\~` 不换行空格，`\\` 反斜杠；其他格式码原样保留。
fn decode_mtext_content(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            decoded.push(ch);
            continue;
        }
        match chars.next() {
            Some('P' | 'p') => decoded.push('\n'),
            Some('~') => decoded.push(' '),
            Some('\\') | None => decoded.push('\\'),
            Some(other) => {
                decoded.push('\\');
                decoded.push(other);
            }
        }
    }
    decoded
}

/// `%%d` 度、`%%p` 正负号、`%%c` 直径，`%%%` 为百分号本身。
fn decode_inline_text(raw: &str) -> String {
    let mut decoded = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(index) = rest.find("%%") {
        decoded.push_str(&rest[..index]);
        let after = &rest[index + 2..];
        let symbol = match after.chars().next() {
            Some('d' | 'D') => Some('°'),
            Some('p' | 'P') => Some('±'),
            Some('c' | 'C') => Some('⌀'),
            Some('%') => Some('%'),
            _ => None,
        };
        match symbol {
            Some(symbol) => {
                decoded.push(symbol);
                rest = &after[1..];
            }
            None => {
                decoded.push('%');
                rest = &rest[index + 1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DxfFacade;

    #[test]
    fn mtext_escapes_are_decoded() {
        assert_eq!(decode_mtext_content("Line1\\PLine2"), "Line1\nLine2");
        assert_eq!(decode_mtext_content("A\\~B"), "A B");
        assert_eq!(decode_mtext_content("C:\\\\temp"), "C:\\temp");
        assert_eq!(decode_mtext_content("keep\\Hx"), "keep\\Hx");
    }

    #[test]
    fn inline_control_codes_are_decoded() {
        assert_eq!(decode_inline_text("45%%d"), "45°");
        assert_eq!(decode_inline_text("%%c10"), "⌀10");
        assert_eq!(decode_inline_text("%%P0.5"), "±0.5");
        assert_eq!(decode_inline_text("100%"), "100%");
        assert_eq!(decode_inline_text("50%%%d"), "50%d");
        assert_eq!(decode_inline_text("%%%%%%"), "%%");
        assert_eq!(decode_inline_text("5%%%%%%d"), "5%%d");
    }

    #[test]
    fn layer_record_flags_map_to_visibility() {
        let source = "0\nSECTION\n2\nTABLES\n0\nTABLE\n2\nLAYER\n\
                      0\nLAYER\n2\nOFF\n70\n0\n62\n-3\n\
                      0\nLAYER\n2\nFROZEN\n70\n1\n62\n5\n\
                      0\nENDTAB\n0\nENDSEC\n0\nEOF\n";
        let doc = DxfFacade::new().read_str(source).expect("parse tables");
        let off = doc.layer("OFF").expect("OFF layer");
        assert_eq!(off.color, 3);
        assert!(!off.is_visible);
        let frozen = doc.layer("FROZEN").expect("FROZEN layer");
        assert_eq!(frozen.color, 5);
        assert!(!frozen.is_visible);
    }

    #[test]
    fn lwpolyline_accepts_y_before_x() {
        let source = "0\nSECTION\n2\nENTITIES\n\
                      0\nLWPOLYLINE\n8\nA\n90\n2\n20\n1\n10\n2\n10\n3\n20\n4\n42\n0.5\n\
                      0\nENDSEC\n0\nEOF\n";
        let doc = DxfFacade::new().read_str(source).expect("parse");
        let Some((_, Entity::Polyline(polyline))) = doc.entities().next() else {
            panic!("期望多段线");
        };
        assert_eq!(polyline.vertices[0].position, Point2::new(2.0, 1.0));
        assert_eq!(polyline.vertices[1].position, Point2::new(3.0, 4.0));
        assert_eq!(polyline.vertices[1].bulge, 0.5);
    }

    #[test]
    fn lwpolyline_with_dangling_coordinate_is_rejected() {
        let source = "0\nSECTION\n2\nENTITIES\n\
                      0\nLWPOLYLINE\n10\n1\n10\n2\n\
                      0\nENDSEC\n0\nEOF\n";
        let err = DxfFacade::new().read_str(source).unwrap_err();
        assert!(err.to_string().contains("缺少对应的 Y"), "{err}");
    }
}
