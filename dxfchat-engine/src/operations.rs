//! 内置编辑操作。选择类操作在未匹配到任何实体时报错，避免模型误以为修改已生效。

use dxfchat_core::document::{DEFAULT_LAYER, DEFAULT_LAYER_COLOR, Document, EntityId};
use dxfchat_core::geometry::{Bounds2D, Point2, Vector2};

use crate::command::{EditBus, EditContext, EditHandler, EditRequest, EditResponse};
use crate::errors::EngineError;
use crate::selector::Selector;

/// 新增文字未指定字高时的默认值。
pub const DEFAULT_TEXT_HEIGHT: f64 = 2.5;

pub(crate) fn register_builtin(bus: &mut EditBus) {
    bus.register(DeleteOp);
    bus.register(SetTextOp);
    bus.register(ReplaceTextOp);
    bus.register(SetLayerOp);
    bus.register(TranslateOp);
    bus.register(ScaleOp);
    bus.register(SetTextHeightOp);
    bus.register(AddLineOp);
    bus.register(AddCircleOp);
    bus.register(AddArcOp);
    bus.register(AddPolylineOp);
    bus.register(AddTextOp);
    bus.register(AddLayerOp);
    bus.register(RenameLayerOp);
    bus.register(SetLayerColorOp);
    bus.register(SetLayerVisibilityOp);
    bus.register(DeleteLayerOp);
}

fn failed(message: impl Into<String>) -> EngineError {
    EngineError::InvalidArguments(message.into())
}

/// 解析选择器并返回匹配实体，空结果视为错误。
fn select_required(
    request: &EditRequest,
    document: &Document,
) -> Result<(Selector, Vec<EntityId>), EngineError> {
    let selector = Selector::from_args(&request.args())?;
    let ids = selector.select(document);
    if ids.is_empty() {
        return Err(failed(format!(
            "no entities matched ({})",
            selector.describe()
        )));
    }
    Ok((selector, ids))
}

fn entities(count: usize) -> String {
    if count == 1 {
        "1 entity".to_string()
    } else {
        format!("{count} entities")
    }
}

struct DeleteOp;

impl EditHandler for DeleteOp {
    fn name(&self) -> &'static str {
        "delete"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "delete", "type": "TEXT", "layer": "DIMENSIONS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let (selector, _) = select_required(request, context.document)?;
        let removed = context
            .document
            .retain_entities(|_, entity| !selector.matches(entity));
        Ok(EditResponse::ok(format!(
            "deleted {}",
            entities(removed)
        )))
    }
}

struct SetTextOp;

impl EditHandler for SetTextOp {
    fn name(&self) -> &'static str {
        "set_text"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "set_text", "text": "KITCHEN", "value": "DINING ROOM"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let value = request.args().str_any(&["value", "new_text"])?.to_string();
        let (_, ids) = select_required(request, context.document)?;
        let mut changed = 0;
        for id in ids {
            if let Some(entity) = context.document.entity_mut(id) {
                if entity.set_text_content(value.clone()) {
                    changed += 1;
                }
            }
        }
        if changed == 0 {
            return Err(failed("selection contains no TEXT or MTEXT entities"));
        }
        Ok(EditResponse::ok(format!(
            "set text of {} to {value:?}",
            entities(changed)
        )))
    }
}

struct ReplaceTextOp;

impl EditHandler for ReplaceTextOp {
    fn name(&self) -> &'static str {
        "replace_text"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "replace_text", "find": "ROOM", "replace": "AREA", "layer": "TEXT"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let find = args.str("find")?;
        if find.is_empty() {
            return Err(failed("replace_text: `find` must not be empty"));
        }
        let replace = args.str("replace")?;
        let (_, ids) = select_required(request, context.document)?;
        let mut changed = 0;
        for id in ids {
            let Some(entity) = context.document.entity_mut(id) else {
                continue;
            };
            let Some(current) = entity.text_content() else {
                continue;
            };
            if current.contains(find) {
                let updated = current.replace(find, replace);
                entity.set_text_content(updated);
                changed += 1;
            }
        }
        if changed == 0 {
            return Err(failed(format!("no text contains {find:?}")));
        }
        Ok(EditResponse::ok(format!(
            "replaced {find:?} with {replace:?} in {}",
            entities(changed)
        )))
    }
}

struct SetLayerOp;

impl EditHandler for SetLayerOp {
    fn name(&self) -> &'static str {
        "set_layer"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "set_layer", "type": "CIRCLE", "to": "DOORS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let target = request.args().layer_name("to")?;
        let (_, ids) = select_required(request, context.document)?;
        let count = ids.len();
        for id in ids {
            context.document.assign_layer(id, target);
        }
        Ok(EditResponse::ok(format!(
            "moved {} to layer {target}",
            entities(count)
        )))
    }
}

struct TranslateOp;

impl EditHandler for TranslateOp {
    fn name(&self) -> &'static str {
        "translate"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "translate", "layer": "TEXT", "dx": 100, "dy": -50}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let offset = Vector2::new(
            args.opt_f64("dx")?.unwrap_or(0.0),
            args.opt_f64("dy")?.unwrap_or(0.0),
        );
        let (_, ids) = select_required(request, context.document)?;
        let count = ids.len();
        for id in ids {
            if let Some(entity) = context.document.entity_mut(id) {
                entity.translate(offset);
            }
        }
        Ok(EditResponse::ok(format!(
            "moved {} by ({}, {})",
            entities(count),
            offset.x(),
            offset.y()
        )))
    }
}

struct ScaleOp;

impl EditHandler for ScaleOp {
    fn name(&self) -> &'static str {
        "scale"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "scale", "type": "CIRCLE", "factor": 2, "origin": [0, 0]}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let factor = args.positive("factor")?;
        let explicit_origin = args.opt_point("origin")?;
        let (_, ids) = select_required(request, context.document)?;

        // 未指定基点时以选中实体的包围盒中心为基点
        let origin = match explicit_origin {
            Some(origin) => origin,
            None => selection_center(context.document, &ids),
        };
        let count = ids.len();
        for id in ids {
            if let Some(entity) = context.document.entity_mut(id) {
                entity.scale(origin, factor);
            }
        }
        Ok(EditResponse::ok(format!(
            "scaled {} by {factor} about ({}, {})",
            entities(count),
            origin.x(),
            origin.y()
        )))
    }
}

fn selection_center(document: &Document, ids: &[EntityId]) -> Point2 {
    let mut bounds = Bounds2D::empty();
    let mut has = false;
    for id in ids {
        if let Some(entity_bounds) = document.entity_bounds(*id) {
            bounds.include_bounds(&entity_bounds);
            has = true;
        }
    }
    if has {
        bounds.center()
    } else {
        Point2::new(0.0, 0.0)
    }
}

struct SetTextHeightOp;

impl EditHandler for SetTextHeightOp {
    fn name(&self) -> &'static str {
        "set_text_height"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "set_text_height", "layer": "TEXT", "height": 350}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let height = request.args().positive("height")?;
        let (_, ids) = select_required(request, context.document)?;
        let mut changed = 0;
        for id in ids {
            if let Some(entity) = context.document.entity_mut(id) {
                if entity.set_text_height(height) {
                    changed += 1;
                }
            }
        }
        if changed == 0 {
            return Err(failed("selection contains no TEXT or MTEXT entities"));
        }
        Ok(EditResponse::ok(format!(
            "set text height of {} to {height}",
            entities(changed)
        )))
    }
}

/// 新增实体的目标图层，缺省为 "0"。
fn target_layer(request: &EditRequest) -> Result<String, EngineError> {
    Ok(request
        .args()
        .opt_layer_name("layer")?
        .unwrap_or(DEFAULT_LAYER)
        .to_string())
}

struct AddLineOp;

impl EditHandler for AddLineOp {
    fn name(&self) -> &'static str {
        "add_line"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "add_line", "start": [0, 0], "end": [1000, 0], "layer": "WALLS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let start = args.point("start")?;
        let end = args.point("end")?;
        let layer = target_layer(request)?;
        context.document.add_line(start, end, layer.clone());
        Ok(EditResponse::ok(format!("added LINE on layer {layer}")))
    }
}

struct AddCircleOp;

impl EditHandler for AddCircleOp {
    fn name(&self) -> &'static str {
        "add_circle"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "add_circle", "center": [500, 500], "radius": 250, "layer": "0"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let center = args.point("center")?;
        let radius = args.positive("radius")?;
        let layer = target_layer(request)?;
        context.document.add_circle(center, radius, layer.clone());
        Ok(EditResponse::ok(format!("added CIRCLE on layer {layer}")))
    }
}

struct AddArcOp;

impl EditHandler for AddArcOp {
    fn name(&self) -> &'static str {
        "add_arc"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "add_arc", "center": [0, 0], "radius": 800, "start_angle": 0, "end_angle": 90, "layer": "DOORS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let center = args.point("center")?;
        let radius = args.positive("radius")?;
        // 角度以度为单位，逆时针
        let start = args.f64("start_angle")?.to_radians();
        let end = args.f64("end_angle")?.to_radians();
        let layer = target_layer(request)?;
        context
            .document
            .add_arc(center, radius, start, end, layer.clone());
        Ok(EditResponse::ok(format!("added ARC on layer {layer}")))
    }
}

struct AddPolylineOp;

impl EditHandler for AddPolylineOp {
    fn name(&self) -> &'static str {
        "add_polyline"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "add_polyline", "points": [[0, 0], [100, 0], [100, 100]], "closed": true, "layer": "WALLS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let points = args.points("points", 2)?;
        let closed = args.opt_bool("closed")?.unwrap_or(false);
        let layer = target_layer(request)?;
        let count = points.len();
        context
            .document
            .add_polyline(points, closed, layer.clone());
        Ok(EditResponse::ok(format!(
            "added LWPOLYLINE with {count} vertices on layer {layer}"
        )))
    }
}

struct AddTextOp;

impl EditHandler for AddTextOp {
    fn name(&self) -> &'static str {
        "add_text"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "add_text", "content": "STORAGE", "insert": [7500, 2000], "height": 300, "rotation": 0, "layer": "TEXT"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let content = args.str_any(&["content", "text", "value"])?;
        if content.is_empty() {
            return Err(failed("add_text: text content must not be empty"));
        }
        let insert = args.point_any(&["insert", "position"])?;
        let height = args
            .opt_positive("height")?
            .unwrap_or(DEFAULT_TEXT_HEIGHT);
        let rotation = args.opt_f64("rotation")?.unwrap_or(0.0).to_radians();
        let layer = target_layer(request)?;
        context
            .document
            .add_text(insert, content, height, rotation, layer.clone());
        Ok(EditResponse::ok(format!(
            "added TEXT {content:?} on layer {layer}"
        )))
    }
}

struct AddLayerOp;

impl EditHandler for AddLayerOp {
    fn name(&self) -> &'static str {
        "add_layer"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "add_layer", "name": "FURNITURE", "color": 2}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let name = args.layer_name("name")?;
        let color = args.opt_color("color")?.unwrap_or(DEFAULT_LAYER_COLOR);
        if !context.document.add_layer(name, color) {
            return Err(failed(format!("layer {name} already exists")));
        }
        Ok(EditResponse::ok(format!(
            "added layer {name} with color {color}"
        )))
    }
}

struct RenameLayerOp;

impl EditHandler for RenameLayerOp {
    fn name(&self) -> &'static str {
        "rename_layer"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "rename_layer", "from": "TEXT", "to": "LABELS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let from = args.str("from")?;
        let to = args.layer_name("to")?;
        if from == DEFAULT_LAYER {
            return Err(failed("layer 0 cannot be renamed"));
        }
        if context.document.layer(from).is_none() {
            return Err(failed(format!("layer {from} does not exist")));
        }
        if context.document.layer(to).is_some() {
            return Err(failed(format!("layer {to} already exists")));
        }
        if !context.document.rename_layer(from, to) {
            return Err(failed(format!("layer {from} could not be renamed")));
        }
        Ok(EditResponse::ok(format!("renamed layer {from} to {to}")))
    }
}

struct SetLayerColorOp;

impl EditHandler for SetLayerColorOp {
    fn name(&self) -> &'static str {
        "set_layer_color"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "set_layer_color", "name": "WALLS", "color": 1}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let name = args.str("name")?;
        let color = args.color("color")?;
        let layer = context
            .document
            .layer_mut(name)
            .ok_or_else(|| failed(format!("layer {name} does not exist")))?;
        layer.color = color;
        Ok(EditResponse::ok(format!(
            "set color of layer {name} to {color}"
        )))
    }
}

struct SetLayerVisibilityOp;

impl EditHandler for SetLayerVisibilityOp {
    fn name(&self) -> &'static str {
        "set_layer_visibility"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "set_layer_visibility", "name": "DIMENSIONS", "visible": false}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let args = request.args();
        let name = args.str("name")?;
        let visible = args.bool("visible")?;
        let layer = context
            .document
            .layer_mut(name)
            .ok_or_else(|| failed(format!("layer {name} does not exist")))?;
        layer.is_visible = visible;
        let state = if visible { "shown" } else { "hidden" };
        Ok(EditResponse::ok(format!("layer {name} is now {state}")))
    }
}

struct DeleteLayerOp;

impl EditHandler for DeleteLayerOp {
    fn name(&self) -> &'static str {
        "delete_layer"
    }

    fn usage(&self) -> &'static str {
        r#"{"op": "delete_layer", "name": "DIMENSIONS"}"#
    }

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        let name = request.args().str("name")?;
        if name == DEFAULT_LAYER {
            return Err(failed("layer 0 cannot be deleted"));
        }
        let removed = context
            .document
            .remove_layer(name)
            .ok_or_else(|| failed(format!("layer {name} does not exist")))?;
        Ok(EditResponse::ok(format!(
            "deleted layer {name} and {}",
            entities(removed)
        )))
    }
}
