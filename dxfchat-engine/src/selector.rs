use serde_json::Value;
use dxfchat_core::document::{Document, Entity, EntityId, EntityKind};

use crate::args::Args;
use crate::errors::EngineError;

/// 实体过滤条件，各字段之间为“与”关系；全部为空时匹配所有实体。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    pub kinds: Vec<EntityKind>,
    pub layer: Option<String>,
    /// 文字内容完全相等（区分大小写）。
    pub text: Option<String>,
    /// 文字内容包含该片段（不区分大小写）。
    pub text_contains: Option<String>,
}

impl Selector {
    /// 从操作参数中读取 `type`、`layer`、`text`、`text_contains`。
    pub fn from_args(args: &Args<'_>) -> Result<Self, EngineError> {
        let kinds = match args.value("type") {
            None => Vec::new(),
            Some(Value::String(name)) => vec![parse_kind(name)?],
            Some(Value::Array(names)) => names
                .iter()
                .map(|name| match name {
                    Value::String(name) => parse_kind(name),
                    other => Err(EngineError::InvalidArguments(format!(
                        "`type` entries must be strings, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(EngineError::InvalidArguments(format!(
                    "`type` must be an entity type name or a list of names, got {other}"
                )));
            }
        };
        Ok(Self {
            kinds,
            layer: args.opt_str("layer")?.map(str::to_string),
            text: args.opt_str("text")?.map(str::to_string),
            text_contains: args
                .opt_str("text_contains")?
                .map(|fragment| fragment.to_lowercase()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
            && self.layer.is_none()
            && self.text.is_none()
            && self.text_contains.is_none()
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&entity.kind()) {
            return false;
        }
        if let Some(layer) = &self.layer {
            if entity.layer_name() != layer {
                return false;
            }
        }
        if let Some(text) = &self.text {
            if entity.text_content() != Some(text.as_str()) {
                return false;
            }
        }
        if let Some(fragment) = &self.text_contains {
            match entity.text_content() {
                Some(content) if content.to_lowercase().contains(fragment.as_str()) => {}
                _ => return false,
            }
        }
        true
    }

    /// 按文档顺序返回匹配的实体 ID。
    pub fn select(&self, document: &Document) -> Vec<EntityId> {
        document
            .entities()
            .filter(|(_, entity)| self.matches(entity))
            .map(|(id, _)| *id)
            .collect()
    }

    /// 供错误信息使用的简短描述。
    pub fn describe(&self) -> String {
        if self.is_empty() {
            return "all entities".to_string();
        }
        let mut parts = Vec::new();
        if !self.kinds.is_empty() {
            let names: Vec<&str> = self.kinds.iter().map(|kind| kind.as_dxf_name()).collect();
            parts.push(format!("type={}", names.join("|")));
        }
        if let Some(layer) = &self.layer {
            parts.push(format!("layer={layer}"));
        }
        if let Some(text) = &self.text {
            parts.push(format!("text={text:?}"));
        }
        if let Some(fragment) = &self.text_contains {
            parts.push(format!("text_contains={fragment:?}"));
        }
        parts.join(", ")
    }
}

fn parse_kind(name: &str) -> Result<EntityKind, EngineError> {
    EntityKind::from_dxf_name(name).ok_or_else(|| {
        let known: Vec<&str> = EntityKind::ALL.iter().map(|kind| kind.as_dxf_name()).collect();
        EngineError::InvalidArguments(format!(
            "unknown entity type `{name}`, expected one of {}",
            known.join(", ")
        ))
    })
}
