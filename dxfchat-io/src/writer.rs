use std::fmt::{self, Display};

use dxfchat_core::{
    document::{Document, Entity, Layer, MText, Polyline, Text},
    geometry::Point2,
};

/// 组码 1/3 单段允许的最大字符数。
const MTEXT_CHUNK: usize = 250;
const MODEL_SPACE: &str = "*Model_Space";
const PAPER_SPACE: &str = "*Paper_Space";

/// R2000 对象句柄，按十六进制大写输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Handle(u64);

impl Handle {
    /// 表头与根字典的所有者。
    const ROOT: Handle = Handle(0);
}

impl Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// 块表中两条固定记录的句柄。
struct BlockOwners {
    model_space: Handle,
    paper_space: Handle,
}

/// 先写 TABLES 之后的内容以确定句柄总数，再补上 HEADER 与 CLASSES。
pub(crate) fn write_document(document: &Document) -> String {
    let mut body = DxfWriter::new();
    let owners = body.tables(document);
    body.blocks(&owners);
    body.entities(document, owners.model_space);
    body.objects();
    body.pair(0, "EOF");

    let mut head = DxfWriter::new();
    head.header(body.handle_seed());
    head.classes();
    head.out.push_str(&body.out);
    head.out
}

struct DxfWriter {
    out: String,
    next_handle: u64,
}

impl DxfWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            next_handle: 1,
        }
    }

    fn allocate(&mut self) -> Handle {
        let handle = Handle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// 大于所有已分配句柄的下一个值。
    fn handle_seed(&self) -> Handle {
        Handle(self.next_handle)
    }

    fn pair(&mut self, code: i32, value: impl Display) {
        self.out.push_str(&format!("{code:>3}\n{value}\n"));
    }

    fn point(&mut self, base_code: i32, point: Point2) {
        self.pair(base_code, point.x());
        self.pair(base_code + 10, point.y());
        self.pair(base_code + 20, 0.0);
    }

    fn section(&mut self, name: &str) {
        self.pair(0, "SECTION");
        self.pair(2, name);
    }

    fn end_section(&mut self) {
        self.pair(0, "ENDSEC");
    }

    fn header(&mut self, seed: Handle) {
        self.section("HEADER");
        self.pair(9, "$ACADVER");
        self.pair(1, "AC1015");
        self.pair(9, "$HANDSEED");
        self.pair(5, seed);
        self.pair(9, "$INSUNITS");
        self.pair(70, 0);
        self.end_section();
    }

    fn classes(&mut self) {
        self.section("CLASSES");
        self.end_section();
    }

    fn tables(&mut self, document: &Document) -> BlockOwners {
        self.section("TABLES");

        let vport = self.table("VPORT", 1);
        self.table_record("VPORT", vport, "AcDbViewportTableRecord", "*Active");
        self.pair(0, "ENDTAB");

        let ltype = self.table("LTYPE", 3);
        for name in ["ByBlock", "ByLayer", "Continuous"] {
            self.table_record("LTYPE", ltype, "AcDbLinetypeTableRecord", name);
            let description = if name == "Continuous" { "Solid line" } else { "" };
            self.pair(3, description);
            self.pair(72, 65);
            self.pair(73, 0);
            self.pair(40, 0.0);
        }
        self.pair(0, "ENDTAB");

        let layers: Vec<&Layer> = document.layers().collect();
        let layer_table = self.table("LAYER", layers.len());
        for layer in layers {
            // 关闭的图层以负颜色表示
            let color = if layer.is_visible {
                layer.color
            } else {
                -layer.color
            };
            self.table_record("LAYER", layer_table, "AcDbLayerTableRecord", &layer.name);
            self.pair(62, color);
            self.pair(6, "Continuous");
        }
        self.pair(0, "ENDTAB");

        let style = self.table("STYLE", 1);
        self.table_record("STYLE", style, "AcDbTextStyleTableRecord", "Standard");
        self.pair(40, 0.0);
        self.pair(41, 1.0);
        self.pair(50, 0.0);
        self.pair(71, 0);
        self.pair(42, 2.5);
        self.pair(3, "txt");
        self.pair(4, "");
        self.pair(0, "ENDTAB");

        self.table("VIEW", 0);
        self.pair(0, "ENDTAB");
        self.table("UCS", 0);
        self.pair(0, "ENDTAB");

        let appid = self.table("APPID", 1);
        self.table_record("APPID", appid, "AcDbRegAppTableRecord", "ACAD");
        self.pair(0, "ENDTAB");

        let dimstyle = self.table("DIMSTYLE", 1);
        self.table_record("DIMSTYLE", dimstyle, "AcDbDimStyleTableRecord", "Standard");
        self.pair(0, "ENDTAB");

        let block_table = self.table("BLOCK_RECORD", 2);
        let model_space =
            self.table_record("BLOCK_RECORD", block_table, "AcDbBlockTableRecord", MODEL_SPACE);
        let paper_space =
            self.table_record("BLOCK_RECORD", block_table, "AcDbBlockTableRecord", PAPER_SPACE);
        self.pair(0, "ENDTAB");

        self.end_section();
        BlockOwners {
            model_space,
            paper_space,
        }
    }

    fn table(&mut self, name: &str, count: usize) -> Handle {
        let handle = self.allocate();
        self.pair(0, "TABLE");
        self.pair(2, name);
        self.pair(5, handle);
        self.pair(330, Handle::ROOT);
        self.pair(100, "AcDbSymbolTable");
        self.pair(70, count);
        if name == "DIMSTYLE" {
            self.pair(100, "AcDbDimStyleTable");
        }
        handle
    }

    fn table_record(&mut self, kind: &str, owner: Handle, subclass: &str, name: &str) -> Handle {
        let handle = self.allocate();
        // DIMSTYLE 记录的句柄使用组码 105
        let handle_code = if kind == "DIMSTYLE" { 105 } else { 5 };
        self.pair(0, kind);
        self.pair(handle_code, handle);
        self.pair(330, owner);
        self.pair(100, "AcDbSymbolTableRecord");
        self.pair(100, subclass);
        self.pair(2, name);
        self.pair(70, 0);
        handle
    }

    fn blocks(&mut self, owners: &BlockOwners) {
        self.section("BLOCKS");
        self.block(MODEL_SPACE, owners.model_space, false);
        self.block(PAPER_SPACE, owners.paper_space, true);
        self.end_section();
    }

    fn block(&mut self, name: &str, owner: Handle, paper_space: bool) {
        let begin = self.allocate();
        self.pair(0, "BLOCK");
        self.pair(5, begin);
        self.pair(330, owner);
        self.pair(100, "AcDbEntity");
        if paper_space {
            self.pair(67, 1);
        }
        self.pair(8, "0");
        self.pair(100, "AcDbBlockBegin");
        self.pair(2, name);
        self.pair(70, 0);
        self.point(10, Point2::new(0.0, 0.0));
        self.pair(3, name);
        self.pair(1, "");

        let end = self.allocate();
        self.pair(0, "ENDBLK");
        self.pair(5, end);
        self.pair(330, owner);
        self.pair(100, "AcDbEntity");
        if paper_space {
            self.pair(67, 1);
        }
        self.pair(8, "0");
        self.pair(100, "AcDbBlockEnd");
    }

    fn entities(&mut self, document: &Document, owner: Handle) {
        self.section("ENTITIES");
        for (_, entity) in document.entities() {
            self.entity(entity, owner);
        }
        self.end_section();
    }

    /// 根字典只挂一个空的 ACAD_GROUP 字典。
    fn objects(&mut self) {
        let root = self.allocate();
        let groups = self.allocate();
        self.section("OBJECTS");
        self.pair(0, "DICTIONARY");
        self.pair(5, root);
        self.pair(330, Handle::ROOT);
        self.pair(100, "AcDbDictionary");
        self.pair(281, 1);
        self.pair(3, "ACAD_GROUP");
        self.pair(350, groups);
        self.pair(0, "DICTIONARY");
        self.pair(5, groups);
        self.pair(330, root);
        self.pair(100, "AcDbDictionary");
        self.pair(281, 1);
        self.end_section();
    }

    fn entity_start(&mut self, kind: &str, layer: &str, owner: Handle) {
        let handle = self.allocate();
        self.pair(0, kind);
        self.pair(5, handle);
        self.pair(330, owner);
        self.pair(100, "AcDbEntity");
        self.pair(8, layer);
    }

    fn entity(&mut self, entity: &Entity, owner: Handle) {
        self.entity_start(entity.kind().as_dxf_name(), entity.layer_name(), owner);
        match entity {
            Entity::Line(line) => {
                self.pair(100, "AcDbLine");
                self.point(10, line.start);
                self.point(11, line.end);
            }
            Entity::Circle(circle) => {
                self.pair(100, "AcDbCircle");
                self.point(10, circle.center);
                self.pair(40, circle.radius);
            }
            Entity::Arc(arc) => {
                self.pair(100, "AcDbCircle");
                self.point(10, arc.center);
                self.pair(40, arc.radius);
                self.pair(100, "AcDbArc");
                self.pair(50, arc.start_angle.to_degrees());
                self.pair(51, arc.end_angle.to_degrees());
            }
            Entity::Ellipse(ellipse) => {
                self.pair(100, "AcDbEllipse");
                self.point(10, ellipse.center);
                self.pair(11, ellipse.major_axis.x());
                self.pair(21, ellipse.major_axis.y());
                self.pair(31, 0.0);
                self.pair(40, ellipse.ratio);
                self.pair(41, ellipse.start_parameter);
                self.pair(42, ellipse.end_parameter);
            }
            Entity::Polyline(polyline) => self.lwpolyline(polyline),
            Entity::Text(text) => self.text(text),
            Entity::MText(mtext) => self.mtext(mtext),
        }
    }

    fn lwpolyline(&mut self, polyline: &Polyline) {
        self.pair(100, "AcDbPolyline");
        self.pair(90, polyline.vertices.len());
        self.pair(70, if polyline.is_closed { 1 } else { 0 });
        for vertex in &polyline.vertices {
            self.pair(10, vertex.position.x());
            self.pair(20, vertex.position.y());
            if vertex.bulge != 0.0 {
                self.pair(42, vertex.bulge);
            }
        }
    }

    fn text(&mut self, text: &Text) {
        self.pair(100, "AcDbText");
        self.point(10, text.insert);
        self.pair(40, text.height);
        // TEXT 为单行实体，多行内容拆成多个组码 1
        for line in text.content.split('\n') {
            self.pair(1, encode_inline_text(line));
        }
        if text.rotation != 0.0 {
            self.pair(50, text.rotation.to_degrees());
        }
        self.pair(100, "AcDbText");
    }

    fn mtext(&mut self, mtext: &MText) {
        self.pair(100, "AcDbMText");
        self.point(10, mtext.insert);
        self.pair(40, mtext.height);
        self.pair(41, mtext.reference_width.unwrap_or(0.0));
        self.pair(71, mtext.attachment_point);
        let encoded = encode_mtext_content(&mtext.content);
        let chunks: Vec<String> = chunk_chars(&encoded, MTEXT_CHUNK);
        if let Some((last, leading)) = chunks.split_last() {
            for chunk in leading {
                self.pair(3, chunk);
            }
            self.pair(1, last);
        } else {
            self.pair(1, "");
        }
        if let Some(style) = &mtext.style {
            self.pair(7, style);
        }
        self.pair(11, mtext.direction.x());
        self.pair(21, mtext.direction.y());
        self.pair(31, 0.0);
    }
}

/// 内容中出现 `%%` 时，所有百分号写成 `%%%`，读回时不会被当作控制码。
fn encode_inline_text(line: &str) -> String {
    if line.contains("%%") {
        line.replace('%', "%%%")
    } else {
        line.to_string()
    }
}

fn encode_mtext_content(content: &str) -> String {
    let mut encoded = String::with_capacity(content.len());
    for ch in content.chars() {
        match ch {
            '\\' => encoded.push_str("\\\\"),
            '\n' => encoded.push_str("\\P"),
            '\r' => {}
            other => encoded.push(other),
        }
    }
    encoded
}

fn chunk_chars(value: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = value.chars().collect();
    chars
        .chunks(size)
        .map(|chunk| chunk.iter().collect())
        .collect()
}
