//! 编辑操作参数的读取与校验。

use serde_json::{Map, Value};
use dxfchat_core::geometry::Point2;

use crate::errors::EngineError;

/// 图层名中不允许出现的字符（与 DXF 符号表命名规则一致）。
pub const FORBIDDEN_LAYER_CHARS: &[char] = &['<', '>', '/', '\\', '"', ':', ';', '?', '*', '|', '=', '`'];

/// 对单个操作参数对象的只读视图，错误信息带上操作名。
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    op: &'a str,
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub fn new(op: &'a str, map: &'a Map<String, Value>) -> Self {
        Self { op, map }
    }

    fn invalid(&self, message: impl AsRef<str>) -> EngineError {
        EngineError::InvalidArguments(format!("{}: {}", self.op, message.as_ref()))
    }

    pub fn has(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(|value| !value.is_null())
    }

    /// 原始参数值，`null` 视为缺失。
    pub fn value(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|value| !value.is_null())
    }

    /// 依次尝试多个别名，返回第一个存在的键。
    fn first_key(&self, keys: &[&'static str]) -> Option<&'static str> {
        keys.iter().copied().find(|key| self.has(key))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>, EngineError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(self.invalid(format!("`{key}` must be a string, got {other}"))),
        }
    }

    pub fn str(&self, key: &str) -> Result<&'a str, EngineError> {
        self.opt_str(key)?
            .ok_or_else(|| self.invalid(format!("missing string `{key}`")))
    }

    /// 接受任一别名的必填字符串。
    pub fn str_any(&self, keys: &[&'static str]) -> Result<&'a str, EngineError> {
        match self.first_key(keys) {
            Some(key) => self.str(key),
            None => Err(self.invalid(format!("missing string `{}`", keys.join("` or `")))),
        }
    }

    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, EngineError> {
        match self.value(key) {
            None => Ok(None),
            Some(value) => {
                let number = value
                    .as_f64()
                    .ok_or_else(|| self.invalid(format!("`{key}` must be a number, got {value}")))?;
                if !number.is_finite() {
                    return Err(self.invalid(format!("`{key}` must be finite")));
                }
                Ok(Some(number))
            }
        }
    }

    pub fn f64(&self, key: &str) -> Result<f64, EngineError> {
        self.opt_f64(key)?
            .ok_or_else(|| self.invalid(format!("missing number `{key}`")))
    }

    /// 必须为正数的数值（半径、字高、缩放系数）。
    pub fn positive(&self, key: &str) -> Result<f64, EngineError> {
        let value = self.f64(key)?;
        self.check_positive(key, value)
    }

    pub fn opt_positive(&self, key: &str) -> Result<Option<f64>, EngineError> {
        self.opt_f64(key)?
            .map(|value| self.check_positive(key, value))
            .transpose()
    }

    fn check_positive(&self, key: &str, value: f64) -> Result<f64, EngineError> {
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(format!("`{key}` must be positive, got {value}")))
        }
    }

    pub fn opt_bool(&self, key: &str) -> Result<Option<bool>, EngineError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::Bool(value)) => Ok(Some(*value)),
            Some(other) => Err(self.invalid(format!("`{key}` must be true or false, got {other}"))),
        }
    }

    pub fn bool(&self, key: &str) -> Result<bool, EngineError> {
        self.opt_bool(key)?
            .ok_or_else(|| self.invalid(format!("missing boolean `{key}`")))
    }

    pub fn opt_point(&self, key: &str) -> Result<Option<Point2>, EngineError> {
        self.value(key)
            .map(|value| self.point_value(key, value))
            .transpose()
    }

    pub fn point(&self, key: &str) -> Result<Point2, EngineError> {
        self.opt_point(key)?
            .ok_or_else(|| self.invalid(format!("missing point `{key}`")))
    }

    pub fn point_any(&self, keys: &[&'static str]) -> Result<Point2, EngineError> {
        match self.first_key(keys) {
            Some(key) => self.point(key),
            None => Err(self.invalid(format!("missing point `{}`", keys.join("` or `")))),
        }
    }

    /// 点列表，至少 `min` 个。
    pub fn points(&self, key: &str, min: usize) -> Result<Vec<Point2>, EngineError> {
        let value = self
            .value(key)
            .ok_or_else(|| self.invalid(format!("missing point list `{key}`")))?;
        let items = value
            .as_array()
            .ok_or_else(|| self.invalid(format!("`{key}` must be a list of [x, y] points")))?;
        if items.len() < min {
            return Err(self.invalid(format!(
                "`{key}` needs at least {min} points, got {}",
                items.len()
            )));
        }
        items
            .iter()
            .map(|item| self.point_value(key, item))
            .collect()
    }

    /// 点既可写作 `[x, y]`，也可写作 `{"x": .., "y": ..}`。
    fn point_value(&self, key: &str, value: &Value) -> Result<Point2, EngineError> {
        let coords = match value {
            Value::Array(items) if items.len() == 2 || items.len() == 3 => {
                (items[0].as_f64(), items[1].as_f64())
            }
            Value::Object(map) => (
                map.get("x").and_then(Value::as_f64),
                map.get("y").and_then(Value::as_f64),
            ),
            _ => (None, None),
        };
        match coords {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Point2::new(x, y)),
            _ => Err(self.invalid(format!("`{key}` must be a point [x, y], got {value}"))),
        }
    }

    /// AutoCAD 颜色索引，范围 1..=255。
    pub fn color(&self, key: &str) -> Result<i16, EngineError> {
        let value = self
            .value(key)
            .ok_or_else(|| self.invalid(format!("missing color `{key}`")))?;
        self.color_value(key, value)
    }

    pub fn opt_color(&self, key: &str) -> Result<Option<i16>, EngineError> {
        self.value(key)
            .map(|value| self.color_value(key, value))
            .transpose()
    }

    fn color_value(&self, key: &str, value: &Value) -> Result<i16, EngineError> {
        match value.as_i64() {
            Some(index @ 1..=255) => Ok(index as i16),
            _ => Err(self.invalid(format!(
                "`{key}` must be an AutoCAD color index between 1 and 255, got {value}"
            ))),
        }
    }

    /// 校验过的图层名。
    pub fn layer_name(&self, key: &str) -> Result<&'a str, EngineError> {
        let name = self.str(key)?;
        validate_layer_name(name).map_err(|message| self.invalid(message))?;
        Ok(name)
    }

    pub fn opt_layer_name(&self, key: &str) -> Result<Option<&'a str>, EngineError> {
        match self.opt_str(key)? {
            Some(name) => {
                validate_layer_name(name).map_err(|message| self.invalid(message))?;
                Ok(Some(name))
            }
            None => Ok(None),
        }
    }
}

pub fn validate_layer_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("layer name must not be empty".to_string());
    }
    if let Some(ch) = name.chars().find(|ch| FORBIDDEN_LAYER_CHARS.contains(ch)) {
        return Err(format!("layer name `{name}` contains forbidden character `{ch}`"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn with_args<T>(value: Value, f: impl FnOnce(Args<'_>) -> T) -> T {
        let map = match value {
            Value::Object(map) => map,
            other => panic!("测试参数必须是对象: {other}"),
        };
        f(Args::new("test_op", &map))
    }

    #[test]
    fn points_accept_arrays_and_objects() {
        with_args(json!({"a": [1, 2.5], "b": {"x": -3, "y": 4}}), |args| {
            assert_eq!(args.point("a").unwrap(), Point2::new(1.0, 2.5));
            assert_eq!(args.point("b").unwrap(), Point2::new(-3.0, 4.0));
        });
    }

    #[test]
    fn malformed_point_is_rejected() {
        with_args(json!({"a": [1], "b": "1,2"}), |args| {
            assert!(args.point("a").is_err());
            assert!(args.point("b").is_err());
            assert!(args.point("missing").is_err());
        });
    }

    #[test]
    fn colors_must_be_valid_aci() {
        with_args(json!({"ok": 255, "zero": 0, "big": 256, "text": "red"}), |args| {
            assert_eq!(args.color("ok").unwrap(), 255);
            assert!(args.color("zero").is_err());
            assert!(args.color("big").is_err());
            assert!(args.color("text").is_err());
        });
    }

    #[test]
    fn positive_values_reject_zero_and_negative() {
        with_args(json!({"r": 0, "h": -1.5, "f": 2}), |args| {
            assert!(args.positive("r").is_err());
            assert!(args.positive("h").is_err());
            assert_eq!(args.positive("f").unwrap(), 2.0);
        });
    }

    #[test]
    fn layer_names_are_validated() {
        assert!(validate_layer_name("WALLS").is_ok());
        assert!(validate_layer_name("A-ANNO-TEXT 2").is_ok());
        assert!(validate_layer_name("").is_err());
        assert!(validate_layer_name("   ").is_err());
        assert!(validate_layer_name("bad/name").is_err());
        assert!(validate_layer_name("a=b").is_err());
    }

    #[test]
    fn errors_name_the_operation() {
        with_args(json!({}), |args| {
            let err = args.str("value").unwrap_err();
            assert!(err.to_string().contains("test_op"), "{err}");
        });
    }

    #[test]
    fn null_counts_as_missing() {
        with_args(json!({"layer": null}), |args| {
            assert!(!args.has("layer"));
            assert_eq!(args.opt_str("layer").unwrap(), None);
        });
    }
}
