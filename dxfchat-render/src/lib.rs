pub mod aci;
pub mod pdf;
pub mod svg;

pub use dxfchat_config::{BackgroundPolicy, ColorPolicy, RenderProfile};
pub use pdf::render_pdf;
pub use svg::render_svg;

use dxfchat_core::document::{DEFAULT_LAYER_COLOR, Document, Entity};
use dxfchat_core::geometry::{Bounds2D, Point2};

use crate::aci::{Rgb, aci_to_rgb};

/// 默认线宽 0.25 mm，再乘以 `lineweight_scaling`。
pub(crate) const BASE_LINEWEIGHT_MM: f64 = 0.25;
/// 页边距占图纸范围较大边的比例。
pub(crate) const MARGIN_RATIO: f64 = 0.03;
/// MTEXT 行距系数。
pub(crate) const LINE_SPACING: f64 = 1.4;

/// 绘图范围与页面尺寸的映射。
#[derive(Debug, Clone, Copy)]
pub(crate) struct Page {
    /// 含边距的图纸范围。
    pub extents: Bounds2D,
    pub width: f64,
    pub height: f64,
    /// 每个图纸单位对应的输出单位数。
    pub scale: f64,
}

impl Page {
    /// 以可见实体范围加边距确定页面，空文档返回单位大小的页面。
    pub fn fit(document: &Document, page_width: f64) -> Self {
        let extents = match visible_bounds(document) {
            Some(bounds) => {
                let span = bounds.width().max(bounds.height());
                let margin = if span > f64::EPSILON {
                    span * MARGIN_RATIO
                } else {
                    1.0
                };
                bounds.expanded(margin)
            }
            None => Bounds2D::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)),
        };
        let page_width = if page_width.is_finite() && page_width > 0.0 {
            page_width
        } else {
            1000.0
        };
        let scale = page_width / extents.width();
        Self {
            extents,
            width: page_width,
            height: extents.height() * scale,
            scale,
        }
    }
}

/// 可见图层上实体的范围。
pub(crate) fn visible_bounds(document: &Document) -> Option<Bounds2D> {
    let mut bounds = Bounds2D::empty();
    let mut has = false;
    for (_, entity) in visible_entities(document) {
        if let Some(entity_bounds) = entity.bounds() {
            bounds.include_bounds(&entity_bounds);
            has = true;
        }
    }
    has.then_some(bounds)
}

pub(crate) fn visible_entities(
    document: &Document,
) -> impl Iterator<Item = &(dxfchat_core::document::EntityId, Entity)> {
    document
        .entities()
        .filter(|(_, entity)| document.is_layer_visible(entity.layer_name()))
}

/// 按颜色策略解析实体的绘制颜色。
pub(crate) fn entity_color(document: &Document, entity: &Entity, profile: &RenderProfile) -> Rgb {
    match profile.color_policy {
        ColorPolicy::Black => Rgb::BLACK,
        ColorPolicy::Color => {
            let index = document
                .layer(entity.layer_name())
                .map(|layer| layer.color)
                .unwrap_or(DEFAULT_LAYER_COLOR);
            // 7 号色在浅色背景上显示为黑色
            match aci_to_rgb(index) {
                Rgb::WHITE => Rgb::BLACK,
                color => color,
            }
        }
    }
}

/// 数值格式化：最多保留 4 位小数并去掉末尾的 0。
pub(crate) fn num(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let text = format!("{value:.4}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}
