pub mod geometry {
    use std::f64::consts::TAU;

    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        /// 以 `origin` 为基点按 `factor` 缩放。
        #[inline]
        pub fn scale_about(self, origin: Point2, factor: f64) -> Self {
            Self(origin.0 + (self.0 - origin.0) * factor)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn scale(self, factor: f64) -> Self {
            Self(self.0 * factor)
        }

        /// 向量相对 X 轴的角度（弧度）。
        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 向四周各扩展 `margin`。
        pub fn expanded(&self, margin: f64) -> Bounds2D {
            if self.is_empty() {
                return *self;
            }
            let delta = DVec2::splat(margin);
            Bounds2D {
                min: Point2::from_vec(self.min.as_vec2() - delta),
                max: Point2::from_vec(self.max.as_vec2() + delta),
            }
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }

    /// 由 bulge 描述的多段线圆弧段。`sweep` 为带符号包角，正值表示逆时针。
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct BulgeArc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub sweep: f64,
    }

    impl BulgeArc {
        /// 将 `start -> end` 的 bulge 段换算为圆弧；直线段或退化弦返回 `None`。
        pub fn from_segment(start: Point2, end: Point2, bulge: f64) -> Option<Self> {
            if bulge.abs() <= 1e-9 {
                return None;
            }
            let chord = end.as_vec2() - start.as_vec2();
            let chord_len = chord.length();
            if chord_len <= f64::EPSILON {
                return None;
            }
            let sweep = 4.0 * bulge.atan();
            let half = sweep / 2.0;
            let radius = (chord_len / (2.0 * half.sin())).abs();
            let midpoint = (start.as_vec2() + end.as_vec2()) * 0.5;
            let left = DVec2::new(-chord.y, chord.x) / chord_len;
            let offset = chord_len / (2.0 * half.tan());
            let center = midpoint + left * offset;
            let start_dir = start.as_vec2() - center;
            Some(Self {
                center: Point2::from_vec(center),
                radius,
                start_angle: start_dir.y.atan2(start_dir.x),
                sweep,
            })
        }

        #[inline]
        pub fn point_at(&self, t: f64) -> Point2 {
            let angle = self.start_angle + self.sweep * t;
            Point2::new(
                self.center.x() + self.radius * angle.cos(),
                self.center.y() + self.radius * angle.sin(),
            )
        }

        #[inline]
        pub fn is_large(&self) -> bool {
            self.sweep.abs() > TAU / 2.0
        }
    }
}

pub mod document {
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, BulgeArc, Point2, Vector2};

    /// 新建图层的默认颜色（ACI 7，白/黑）。
    pub const DEFAULT_LAYER_COLOR: i16 = 7;
    /// 不可删除、不可重命名的默认图层。
    pub const DEFAULT_LAYER: &str = "0";

    /// 文字宽度估算系数（相对字高）。
    const GLYPH_WIDTH_FACTOR: f64 = 0.6;
    const MTEXT_LINE_SPACING: f64 = 1.4;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        /// AutoCAD 颜色索引 1..=255。
        pub color: i16,
        pub is_visible: bool,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self::with_color(name, DEFAULT_LAYER_COLOR)
        }

        #[inline]
        pub fn with_color(name: impl Into<String>, color: i16) -> Self {
            Self {
                name: name.into(),
                color,
                is_visible: true,
            }
        }
    }

    /// 实体类型，名称与 DXF 实体类型一致。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "UPPERCASE")]
    pub enum EntityKind {
        Line,
        Circle,
        Arc,
        Ellipse,
        #[serde(rename = "LWPOLYLINE", alias = "POLYLINE")]
        LwPolyline,
        Text,
        #[serde(rename = "MTEXT")]
        MText,
    }

    impl EntityKind {
        pub const ALL: [EntityKind; 7] = [
            EntityKind::Line,
            EntityKind::Circle,
            EntityKind::Arc,
            EntityKind::Ellipse,
            EntityKind::LwPolyline,
            EntityKind::Text,
            EntityKind::MText,
        ];

        pub fn as_dxf_name(self) -> &'static str {
            match self {
                EntityKind::Line => "LINE",
                EntityKind::Circle => "CIRCLE",
                EntityKind::Arc => "ARC",
                EntityKind::Ellipse => "ELLIPSE",
                EntityKind::LwPolyline => "LWPOLYLINE",
                EntityKind::Text => "TEXT",
                EntityKind::MText => "MTEXT",
            }
        }

        /// 大小写不敏感地解析 DXF 类型名，`POLYLINE` 视作 `LWPOLYLINE`。
        pub fn from_dxf_name(name: &str) -> Option<Self> {
            let upper = name.trim().to_ascii_uppercase();
            match upper.as_str() {
                "LINE" => Some(EntityKind::Line),
                "CIRCLE" => Some(EntityKind::Circle),
                "ARC" => Some(EntityKind::Arc),
                "ELLIPSE" => Some(EntityKind::Ellipse),
                "LWPOLYLINE" | "POLYLINE" => Some(EntityKind::LwPolyline),
                "TEXT" => Some(EntityKind::Text),
                "MTEXT" => Some(EntityKind::MText),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Polyline(Polyline),
        Text(Text),
        MText(MText),
    }

    impl Entity {
        #[inline]
        pub fn kind(&self) -> EntityKind {
            match self {
                Entity::Line(_) => EntityKind::Line,
                Entity::Circle(_) => EntityKind::Circle,
                Entity::Arc(_) => EntityKind::Arc,
                Entity::Ellipse(_) => EntityKind::Ellipse,
                Entity::Polyline(_) => EntityKind::LwPolyline,
                Entity::Text(_) => EntityKind::Text,
                Entity::MText(_) => EntityKind::MText,
            }
        }

        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Ellipse(ellipse) => &ellipse.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Text(text) => &text.layer,
                Entity::MText(mtext) => &mtext.layer,
            }
        }

        fn layer_mut(&mut self) -> &mut String {
            match self {
                Entity::Line(line) => &mut line.layer,
                Entity::Circle(circle) => &mut circle.layer,
                Entity::Arc(arc) => &mut arc.layer,
                Entity::Ellipse(ellipse) => &mut ellipse.layer,
                Entity::Polyline(polyline) => &mut polyline.layer,
                Entity::Text(text) => &mut text.layer,
                Entity::MText(mtext) => &mut mtext.layer,
            }
        }

        /// 文字类实体的内容，其余实体返回 `None`。
        pub fn text_content(&self) -> Option<&str> {
            match self {
                Entity::Text(text) => Some(&text.content),
                Entity::MText(mtext) => Some(&mtext.content),
                _ => None,
            }
        }

        /// 替换文字内容，非文字实体返回 `false`。
        pub fn set_text_content(&mut self, content: impl Into<String>) -> bool {
            match self {
                Entity::Text(text) => {
                    text.content = content.into();
                    true
                }
                Entity::MText(mtext) => {
                    mtext.content = content.into();
                    true
                }
                _ => false,
            }
        }

        /// 设置文字高度，非文字实体返回 `false`。
        pub fn set_text_height(&mut self, height: f64) -> bool {
            match self {
                Entity::Text(text) => {
                    text.height = height;
                    true
                }
                Entity::MText(mtext) => {
                    mtext.height = height;
                    true
                }
                _ => false,
            }
        }

        pub fn translate(&mut self, offset: Vector2) {
            match self {
                Entity::Line(line) => {
                    line.start = line.start.translate(offset);
                    line.end = line.end.translate(offset);
                }
                Entity::Circle(circle) => circle.center = circle.center.translate(offset),
                Entity::Arc(arc) => arc.center = arc.center.translate(offset),
                Entity::Ellipse(ellipse) => ellipse.center = ellipse.center.translate(offset),
                Entity::Polyline(polyline) => {
                    for vertex in &mut polyline.vertices {
                        vertex.position = vertex.position.translate(offset);
                    }
                }
                Entity::Text(text) => text.insert = text.insert.translate(offset),
                Entity::MText(mtext) => mtext.insert = mtext.insert.translate(offset),
            }
        }

        /// 以 `origin` 为基点均匀缩放，长度类属性（半径、字高）同步缩放。
        pub fn scale(&mut self, origin: Point2, factor: f64) {
            match self {
                Entity::Line(line) => {
                    line.start = line.start.scale_about(origin, factor);
                    line.end = line.end.scale_about(origin, factor);
                }
                Entity::Circle(circle) => {
                    circle.center = circle.center.scale_about(origin, factor);
                    circle.radius *= factor;
                }
                Entity::Arc(arc) => {
                    arc.center = arc.center.scale_about(origin, factor);
                    arc.radius *= factor;
                }
                Entity::Ellipse(ellipse) => {
                    ellipse.center = ellipse.center.scale_about(origin, factor);
                    ellipse.major_axis = ellipse.major_axis.scale(factor);
                }
                Entity::Polyline(polyline) => {
                    for vertex in &mut polyline.vertices {
                        vertex.position = vertex.position.scale_about(origin, factor);
                    }
                }
                Entity::Text(text) => {
                    text.insert = text.insert.scale_about(origin, factor);
                    text.height *= factor;
                }
                Entity::MText(mtext) => {
                    mtext.insert = mtext.insert.scale_about(origin, factor);
                    mtext.height *= factor;
                    if let Some(width) = mtext.reference_width.as_mut() {
                        *width *= factor;
                    }
                }
            }
        }

        /// 计算实体的 2D 轴对齐范围，文字按字高粗略估算外框。
        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            match self {
                Entity::Line(line) => {
                    bounds.include_point(line.start);
                    bounds.include_point(line.end);
                }
                Entity::Circle(circle) => {
                    let radius = circle.radius.abs();
                    let center = circle.center;
                    bounds.include_point(Point2::new(center.x() - radius, center.y() - radius));
                    bounds.include_point(Point2::new(center.x() + radius, center.y() + radius));
                }
                Entity::Arc(arc) => {
                    arc_bounds(arc, &mut bounds);
                }
                Entity::Ellipse(ellipse) => {
                    ellipse_bounds(ellipse, &mut bounds);
                }
                Entity::Polyline(polyline) => {
                    let count = polyline.vertices.len();
                    for (index, vertex) in polyline.vertices.iter().enumerate() {
                        bounds.include_point(vertex.position);
                        let next = if index + 1 < count {
                            Some(&polyline.vertices[index + 1])
                        } else if polyline.is_closed && count > 1 {
                            Some(&polyline.vertices[0])
                        } else {
                            None
                        };
                        if let Some(next) = next {
                            polyline_segment_bounds(
                                vertex.position,
                                next.position,
                                vertex.bulge,
                                &mut bounds,
                            );
                        }
                    }
                }
                Entity::Text(text) => {
                    let width = text_width(&text.content, text.height);
                    include_text_box(&mut bounds, text.insert, width, text.height, text.rotation);
                }
                Entity::MText(mtext) => {
                    let lines = mtext.content.lines().count().max(1) as f64;
                    let width = mtext
                        .reference_width
                        .unwrap_or_else(|| text_width(&mtext.content, mtext.height));
                    let block_height = mtext.height * MTEXT_LINE_SPACING * lines;
                    // MTEXT 插入点默认位于左上角。
                    let top_left = mtext.insert;
                    let rotation = mtext.direction.angle();
                    let base = top_left.translate(rotate(Vector2::new(0.0, -block_height), rotation));
                    include_text_box(&mut bounds, base, width, block_height, rotation);
                }
            }
            if bounds.is_empty() {
                None
            } else {
                Some(bounds)
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    /// 椭圆实体，记录主轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub reference_width: Option<f64>,
        pub direction: Vector2,
        pub attachment_point: i16,
        pub style: Option<String>,
        pub layer: String,
    }

    /// 内存中的图纸文档：有序图层表加有序实体列表。
    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Document {
        layers: Vec<Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer(DEFAULT_LAYER);
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            if self.layer(key).is_none() {
                self.layers.push(Layer::new(key));
            }
        }

        /// 新增图层；同名图层已存在时返回 `false` 且不做修改。
        pub fn add_layer(&mut self, name: impl Into<String>, color: i16) -> bool {
            let name = name.into();
            if self.layer(&name).is_some() {
                return false;
            }
            self.layers.push(Layer::with_color(name, color));
            true
        }

        /// 写入完整图层记录，已存在时覆盖颜色与可见性（DXF 读取 LAYER 表时使用）。
        pub fn upsert_layer(&mut self, layer: Layer) {
            match self.layer_mut(&layer.name) {
                Some(existing) => {
                    existing.color = layer.color;
                    existing.is_visible = layer.is_visible;
                }
                None => self.layers.push(layer),
            }
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.iter().find(|layer| layer.name == name)
        }

        #[inline]
        pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
            self.layers.iter_mut().find(|layer| layer.name == name)
        }

        /// 图层不存在时视为可见。
        #[inline]
        pub fn is_layer_visible(&self, name: &str) -> bool {
            self.layer(name).is_none_or(|layer| layer.is_visible)
        }

        /// 重命名图层并迁移其上的实体。源图层缺失、目标已存在或源为 "0" 时返回 `false`。
        pub fn rename_layer(&mut self, from: &str, to: impl Into<String>) -> bool {
            let to = to.into();
            if from == DEFAULT_LAYER || self.layer(&to).is_some() {
                return false;
            }
            let Some(layer) = self.layer_mut(from) else {
                return false;
            };
            layer.name = to.clone();
            for (_, entity) in &mut self.entities {
                if entity.layer_name() == from {
                    *entity.layer_mut() = to.clone();
                }
            }
            true
        }

        /// 删除图层及其全部实体，返回被删除的实体数量。图层 "0" 不可删除。
        pub fn remove_layer(&mut self, name: &str) -> Option<usize> {
            if name == DEFAULT_LAYER {
                return None;
            }
            let index = self.layers.iter().position(|layer| layer.name == name)?;
            self.layers.remove(index);
            Some(self.retain_entities(|_, entity| entity.layer_name() != name))
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push_entity(Entity::Line(Line { start, end, layer }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push_entity(Entity::Circle(Circle {
                center,
                radius,
                layer,
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer,
            }))
        }

        pub fn add_ellipse(
            &mut self,
            center: Point2,
            major_axis: Vector2,
            ratio: f64,
            start_parameter: f64,
            end_parameter: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push_entity(Entity::Ellipse(Ellipse {
                center,
                major_axis,
                ratio,
                start_parameter,
                end_parameter,
                layer,
            }))
        }

        pub fn add_polyline<I>(
            &mut self,
            points: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = Point2>,
        {
            self.add_polyline_with_vertices(
                points.into_iter().map(PolylineVertex::new),
                is_closed,
                layer,
            )
        }

        pub fn add_polyline_with_vertices<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            let layer = layer.into();
            self.push_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer,
            }))
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push_entity(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                layer,
            }))
        }

        #[allow(clippy::too_many_arguments)]
        pub fn add_mtext(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            reference_width: Option<f64>,
            direction: Vector2,
            attachment_point: i16,
            style: Option<String>,
            layer: impl Into<String>,
        ) -> EntityId {
            let layer = layer.into();
            self.push_entity(Entity::MText(MText {
                insert,
                content: content.into(),
                height,
                reference_width,
                direction,
                attachment_point,
                style,
                layer,
            }))
        }

        #[inline]
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.push_entity(entity)
        }

        /// 将实体移动到指定图层（必要时创建图层）。实体不存在时返回 `false`。
        pub fn assign_layer(&mut self, id: EntityId, layer: &str) -> bool {
            let Some(entity) = self.entity_mut(id) else {
                return false;
            };
            *entity.layer_mut() = layer.to_string();
            self.ensure_layer(layer);
            true
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.iter()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entities_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut Entity)> {
            self.entities.iter_mut().map(|(id, entity)| (*id, entity))
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        pub fn count_on_layer(&self, name: &str) -> usize {
            self.entities
                .iter()
                .filter(|(_, entity)| entity.layer_name() == name)
                .count()
        }

        #[inline]
        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        #[inline]
        pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
            self.entities
                .iter_mut()
                .find_map(|(entity_id, entity)| (*entity_id == id).then_some(entity))
        }

        /// 仅保留满足条件的实体，返回删除数量。
        pub fn retain_entities<F>(&mut self, mut keep: F) -> usize
        where
            F: FnMut(EntityId, &Entity) -> bool,
        {
            let before = self.entities.len();
            self.entities.retain(|(id, entity)| keep(*id, entity));
            before - self.entities.len()
        }

        #[inline]
        pub fn entity_bounds(&self, id: EntityId) -> Option<Bounds2D> {
            self.entity(id).and_then(Entity::bounds)
        }

        pub fn bounds(&self) -> Option<Bounds2D> {
            let mut bounds = Bounds2D::empty();
            let mut has = false;
            for (_, entity) in &self.entities {
                if let Some(entity_bounds) = entity.bounds() {
                    bounds.include_bounds(&entity_bounds);
                    has = true;
                }
            }
            if has { Some(bounds) } else { None }
        }

        fn push_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    fn text_width(content: &str, height: f64) -> f64 {
        let longest = content
            .lines()
            .map(|line| line.chars().count())
            .max()
            .unwrap_or(0);
        longest as f64 * height.abs() * GLYPH_WIDTH_FACTOR
    }

    fn rotate(vector: Vector2, angle: f64) -> Vector2 {
        let (sin, cos) = angle.sin_cos();
        Vector2::new(
            vector.x() * cos - vector.y() * sin,
            vector.x() * sin + vector.y() * cos,
        )
    }

    fn include_text_box(bounds: &mut Bounds2D, base: Point2, width: f64, height: f64, angle: f64) {
        bounds.include_point(base);
        bounds.include_point(base.translate(rotate(Vector2::new(width, 0.0), angle)));
        bounds.include_point(base.translate(rotate(Vector2::new(width, height), angle)));
        bounds.include_point(base.translate(rotate(Vector2::new(0.0, height), angle)));
    }

    pub(crate) fn normalize_angle(angle: f64) -> f64 {
        let mut result = angle % TAU;
        if result < 0.0 {
            result += TAU;
        }
        result
    }

    /// 规范化圆弧角度区间，保证 `end > start` 且跨度不超过一整圈。
    pub fn canonical_interval(start: f64, end: f64) -> (f64, f64) {
        let start = normalize_angle(start);
        let mut end = normalize_angle(end);
        if (end - start).abs() < 1e-9 {
            end = start + TAU;
        } else if end < start {
            end += TAU;
        }
        (start, end)
    }

    /// 把 `angle` 平移到 `[start, start + TAU)` 后判断是否落在区间内。
    fn within_sweep(angle: f64, start: f64, end: f64) -> bool {
        let lifted = start + normalize_angle(angle - start);
        lifted <= end + 1e-12
    }

    /// 圆弧包围盒：端点加上区间内的四个象限点。
    fn arc_bounds(arc: &Arc, bounds: &mut Bounds2D) {
        let radius = arc.radius.abs();
        let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
        let on_circle = |angle: f64| {
            let (sin, cos) = angle.sin_cos();
            arc.center.translate(Vector2::new(radius * cos, radius * sin))
        };
        bounds.include_point(on_circle(start));
        bounds.include_point(on_circle(end));
        for quadrant in 0..4u8 {
            let angle = f64::from(quadrant) * FRAC_PI_2;
            if within_sweep(angle, start, end) {
                bounds.include_point(on_circle(angle));
            }
        }
    }

    /// 椭圆包围盒：对 x、y 分量分别求参数极值点。
    fn ellipse_bounds(ellipse: &Ellipse, bounds: &mut Bounds2D) {
        let major = ellipse.major_axis.as_vec2();
        let minor = major.perp() * ellipse.ratio.abs();
        let start = ellipse.start_parameter;
        let end = match ellipse.end_parameter - start {
            span if span.abs() < 1e-9 => start + TAU,
            span if span < 0.0 => start + normalize_angle(span),
            _ => ellipse.end_parameter,
        };
        let at = |t: f64| {
            let (sin, cos) = t.sin_cos();
            ellipse.center.translate(Vector2::from(major * cos + minor * sin))
        };
        bounds.include_point(at(start));
        bounds.include_point(at(end));
        let x_extreme = minor.x.atan2(major.x);
        let y_extreme = minor.y.atan2(major.y);
        for t in [x_extreme, x_extreme + PI, y_extreme, y_extreme + PI] {
            if within_sweep(t, start, end) {
                bounds.include_point(at(t));
            }
        }
    }

    fn polyline_segment_bounds(start: Point2, end: Point2, bulge: f64, bounds: &mut Bounds2D) {
        let Some(segment) = BulgeArc::from_segment(start, end, bulge) else {
            return;
        };
        let (start_angle, end_angle) = if segment.sweep >= 0.0 {
            (segment.start_angle, segment.start_angle + segment.sweep)
        } else {
            (segment.start_angle + segment.sweep, segment.start_angle)
        };
        let arc = Arc {
            center: segment.center,
            radius: segment.radius,
            start_angle,
            end_angle,
            layer: String::new(),
        };
        arc_bounds(&arc, bounds);
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::geometry::{Point2, Vector2};
        use std::f64::consts::{FRAC_PI_2, PI};

        #[test]
        fn document_stores_entities() {
            let mut doc = Document::new();
            let id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let circle_id = doc.add_circle(Point2::new(5.0, 5.0), 2.0, "ANNOT");
            let arc_id = doc.add_arc(Point2::new(5.0, 0.0), 3.5, 0.0, FRAC_PI_2, "GEOM");
            let ellipse_id = doc.add_ellipse(
                Point2::new(15.0, 5.0),
                Vector2::new(4.0, 0.0),
                0.5,
                0.0,
                PI,
                "GEOM",
            );
            let polyline_id = doc.add_polyline(
                [
                    Point2::new(0.0, 0.0),
                    Point2::new(2.0, 2.0),
                    Point2::new(4.0, 0.0),
                ],
                true,
                "SHAPE",
            );

            assert_eq!(id.get(), 0);
            assert_eq!(circle_id.get(), 1);
            assert_eq!(arc_id.get(), 2);
            assert_eq!(ellipse_id.get(), 3);
            assert_eq!(polyline_id.get(), 4);
            let layers: Vec<_> = doc.layers().map(|l| l.name.clone()).collect();
            assert_eq!(layers, vec!["0", "ANNOT", "GEOM", "SHAPE"]);
            assert_eq!(doc.entity_count(), 5);
            assert_eq!(doc.count_on_layer("GEOM"), 2);

            match doc.entity(arc_id) {
                Some(Entity::Arc(arc)) => {
                    assert_eq!(arc.layer, "GEOM");
                    assert!((arc.radius - 3.5).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }

            let bounds = doc.bounds().expect("document bounds should exist");
            assert!((bounds.min().x() - 0.0).abs() < 1e-9);
            assert!((bounds.min().y() - 0.0).abs() < 1e-9);
            assert!((bounds.max().x() - 19.0).abs() < 1e-9);
            assert!((bounds.max().y() - 7.0).abs() < 1e-9);
        }

        #[test]
        fn ids_are_not_reused_after_removal() {
            let mut doc = Document::new();
            let first = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
            let removed = doc.retain_entities(|id, _| id != first);
            assert_eq!(removed, 1);
            let second = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "0");
            assert_ne!(first, second);
            assert_eq!(second.get(), 1);
        }

        #[test]
        fn rename_layer_moves_entities() {
            let mut doc = Document::new();
            doc.add_layer("WALLS", 3);
            let id = doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "WALLS");

            assert!(doc.rename_layer("WALLS", "PARTITIONS"));
            assert!(doc.layer("WALLS").is_none());
            let renamed = doc.layer("PARTITIONS").expect("renamed layer");
            assert_eq!(renamed.color, 3);
            assert_eq!(doc.entity(id).map(Entity::layer_name), Some("PARTITIONS"));

            assert!(!doc.rename_layer("0", "ZERO"));
            assert!(!doc.rename_layer("MISSING", "OTHER"));
            assert!(!doc.rename_layer("PARTITIONS", "0"));
        }

        #[test]
        fn remove_layer_drops_its_entities() {
            let mut doc = Document::new();
            doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "DOORS");
            doc.add_circle(Point2::new(0.0, 0.0), 1.0, "DOORS");
            doc.add_circle(Point2::new(0.0, 0.0), 1.0, "0");

            assert_eq!(doc.remove_layer("DOORS"), Some(2));
            assert_eq!(doc.entity_count(), 1);
            assert!(doc.layer("DOORS").is_none());
            assert_eq!(doc.remove_layer("0"), None);
            assert_eq!(doc.remove_layer("DOORS"), None);
        }

        #[test]
        fn translate_and_scale_update_geometry() {
            let mut doc = Document::new();
            let id = doc.add_circle(Point2::new(1.0, 1.0), 2.0, "0");
            let text_id = doc.add_text(Point2::new(2.0, 0.0), "A", 1.0, 0.0, "0");

            for (_, entity) in doc.entities_mut() {
                entity.translate(Vector2::new(1.0, -1.0));
                entity.scale(Point2::new(0.0, 0.0), 2.0);
            }

            match doc.entity(id) {
                Some(Entity::Circle(circle)) => {
                    assert!((circle.center.x() - 4.0).abs() < 1e-9);
                    assert!(circle.center.y().abs() < 1e-9);
                    assert!((circle.radius - 4.0).abs() < 1e-9);
                }
                other => panic!("expected circle, got {other:?}"),
            }
            match doc.entity(text_id) {
                Some(Entity::Text(text)) => {
                    assert!((text.insert.x() - 6.0).abs() < 1e-9);
                    assert!((text.height - 2.0).abs() < 1e-9);
                }
                other => panic!("expected text, got {other:?}"),
            }
        }

        #[test]
        fn bulge_segment_bounds_cover_semicircle() {
            let mut doc = Document::new();
            doc.add_polyline_with_vertices(
                [
                    PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                    PolylineVertex::new(Point2::new(10.0, 0.0)),
                ],
                false,
                "0",
            );
            let bounds = doc.bounds().expect("bounds");
            // 逆时针半圆从 (0,0) 到 (10,0) 经过 (5,-5)。
            assert!((bounds.min().y() + 5.0).abs() < 1e-9);
            assert!(bounds.max().y().abs() < 1e-9);
        }

        #[test]
        fn rotated_ellipse_bounds_are_exact() {
            let mut doc = Document::new();
            // 主轴 (3,4) 长度为 5，比例 0.2 时短半轴为 1。
            doc.add_ellipse(Point2::new(0.0, 0.0), Vector2::new(3.0, 4.0), 0.2, 0.0, 0.0, "0");
            let bounds = doc.bounds().expect("bounds");
            // x 方向半宽 = sqrt(3² + (0.2·4)²)，y 方向 = sqrt(4² + (0.2·3)²)
            assert!((bounds.max().x() - (9.0_f64 + 0.64).sqrt()).abs() < 1e-9);
            assert!((bounds.min().y() + (16.0_f64 + 0.36).sqrt()).abs() < 1e-9);
        }

        #[test]
        fn arc_bounds_include_crossed_quadrants() {
            let mut doc = Document::new();
            doc.add_arc(Point2::new(0.0, 0.0), 2.0, -FRAC_PI_2 / 2.0, PI * 0.75, "0");
            let bounds = doc.bounds().expect("bounds");
            assert!((bounds.max().x() - 2.0).abs() < 1e-9);
            assert!((bounds.max().y() - 2.0).abs() < 1e-9);
            assert!(bounds.min().x() > -2.0);
        }

        #[test]
        fn entity_kind_parses_dxf_names() {
            assert_eq!(EntityKind::from_dxf_name("text"), Some(EntityKind::Text));
            assert_eq!(
                EntityKind::from_dxf_name("POLYLINE"),
                Some(EntityKind::LwPolyline)
            );
            assert_eq!(EntityKind::from_dxf_name("HATCH"), None);
            for kind in EntityKind::ALL {
                assert_eq!(EntityKind::from_dxf_name(kind.as_dxf_name()), Some(kind));
            }
        }
    }
}

pub mod tessellate {
    //! 将曲线实体离散为折线，供不支持原生曲线的输出后端（PDF）使用。

    use std::f64::consts::TAU;

    use crate::document::{Entity, canonical_interval};
    use crate::geometry::{BulgeArc, Point2, Vector2};

    const MIN_SEGMENTS: usize = 16;
    const SEGMENTS_PER_TURN: f64 = 64.0;

    /// 返回实体的折线表示；文字实体返回空集合。
    pub fn entity_polylines(entity: &Entity) -> Vec<Vec<Point2>> {
        match entity {
            Entity::Line(line) => vec![vec![line.start, line.end]],
            Entity::Circle(circle) => {
                non_empty(sample_arc(circle.center, circle.radius, 0.0, TAU))
            }
            Entity::Arc(arc) => {
                let (start, end) = canonical_interval(arc.start_angle, arc.end_angle);
                non_empty(sample_arc(arc.center, arc.radius, start, end - start))
            }
            Entity::Ellipse(ellipse) => {
                let mut end = ellipse.end_parameter;
                if (end - ellipse.start_parameter).abs() < 1e-9 {
                    end = ellipse.start_parameter + TAU;
                }
                while end < ellipse.start_parameter {
                    end += TAU;
                }
                non_empty(sample_ellipse(
                    ellipse.center,
                    ellipse.major_axis,
                    ellipse.ratio,
                    ellipse.start_parameter,
                    end,
                ))
            }
            Entity::Polyline(polyline) => {
                let count = polyline.vertices.len();
                let mut points: Vec<Point2> = Vec::with_capacity(count);
                for (index, vertex) in polyline.vertices.iter().enumerate() {
                    let next = if index + 1 < count {
                        Some(&polyline.vertices[index + 1])
                    } else if polyline.is_closed && count > 1 {
                        Some(&polyline.vertices[0])
                    } else {
                        None
                    };
                    points.push(vertex.position);
                    if let Some(next) = next {
                        if let Some(segment) =
                            BulgeArc::from_segment(vertex.position, next.position, vertex.bulge)
                        {
                            let steps = segment_count(segment.sweep);
                            for i in 1..steps {
                                points.push(segment.point_at(i as f64 / steps as f64));
                            }
                        }
                    }
                }
                if polyline.is_closed && count > 1 {
                    points.push(polyline.vertices[0].position);
                }
                non_empty(points)
            }
            Entity::Text(_) | Entity::MText(_) => Vec::new(),
        }
    }

    fn non_empty(points: Vec<Point2>) -> Vec<Vec<Point2>> {
        if points.len() < 2 {
            Vec::new()
        } else {
            vec![points]
        }
    }

    fn segment_count(span: f64) -> usize {
        ((span.abs() / (TAU / SEGMENTS_PER_TURN)).ceil() as usize).max(MIN_SEGMENTS)
    }

    /// 从 `start` 起按带符号跨度 `span` 采样圆弧。
    pub fn sample_arc(center: Point2, radius: f64, start: f64, span: f64) -> Vec<Point2> {
        if radius <= f64::EPSILON {
            return Vec::new();
        }
        let segments = segment_count(span);
        (0..=segments)
            .map(|i| {
                let angle = start + span * (i as f64 / segments as f64);
                Point2::new(
                    center.x() + radius * angle.cos(),
                    center.y() + radius * angle.sin(),
                )
            })
            .collect()
    }

    pub fn sample_ellipse(
        center: Point2,
        major_axis: Vector2,
        ratio: f64,
        start: f64,
        end: f64,
    ) -> Vec<Point2> {
        let major = major_axis.as_vec2();
        if major.length_squared() <= f64::EPSILON {
            return Vec::new();
        }
        let minor = glam::DVec2::new(-major.y, major.x) * ratio.abs();
        let span = end - start;
        let segments = segment_count(span);
        (0..=segments)
            .map(|i| {
                let t = start + span * (i as f64 / segments as f64);
                center.translate(Vector2::from(major * t.cos() + minor * t.sin()))
            })
            .collect()
    }

}
