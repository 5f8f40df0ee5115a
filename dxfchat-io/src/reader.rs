//! ASCII DXF 组码流与记录。

use std::convert::TryFrom;

use dxfchat_core::{document::DEFAULT_LAYER, geometry::Point2};

use crate::DxfError;

const COMMENT_CODE: i32 = 999;
/// R2018 起 MTEXT 末尾的嵌入对象子段，会重复 10/20/40/46/70 等组码。
const EMBEDDED_OBJECT_CODE: i32 = 101;
/// 扩展数据起点，其后的 1010/1040 等组码不属于实体本身。
const XDATA_CODE: i32 = 1001;

pub(crate) type GroupPair = (i32, String);

/// 按“组码行 + 值行”读取，支持回退一个组码对。
pub(crate) struct GroupReader<'a> {
    lines: std::str::Lines<'a>,
    pending: Option<GroupPair>,
    line: usize,
}

impl<'a> GroupReader<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines(),
            pending: None,
            line: 0,
        }
    }

    pub(crate) fn next_pair(&mut self) -> Result<Option<GroupPair>, DxfError> {
        if let Some(pair) = self.pending.take() {
            return Ok(Some(pair));
        }
        while let Some(code_line) = self.advance() {
            let code_text = code_line.trim();
            if code_text.is_empty() {
                continue;
            }
            let code_line_no = self.line;
            let Some(value_line) = self.advance() else {
                return Err(DxfError::invalid(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line
                )));
            };
            let code = code_text.parse::<i32>().map_err(|_| {
                DxfError::invalid(format!(
                    "第 {code_line_no} 行的组码 \"{code_text}\" 无法解析为整数"
                ))
            })?;
            if code == COMMENT_CODE {
                continue;
            }
            return Ok(Some((code, value_line.trim_end_matches('\r').to_string())));
        }
        Ok(None)
    }

    pub(crate) fn push_back(&mut self, pair: GroupPair) {
        debug_assert!(self.pending.is_none(), "组码对只允许回退一次");
        self.pending = Some(pair);
    }

    /// 读取到下一个 0 组码为止，该组码留给调用方。
    /// 嵌入对象与扩展数据部分整体丢弃。
    pub(crate) fn record(&mut self, kind: &str) -> Result<GroupRecord, DxfError> {
        let mut pairs = Vec::new();
        loop {
            match self.next_pair()? {
                Some(pair) if pair.0 == 0 => {
                    self.push_back(pair);
                    break;
                }
                Some((EMBEDDED_OBJECT_CODE | XDATA_CODE, _)) => {
                    self.skip_record()?;
                    break;
                }
                Some(pair) => pairs.push(pair),
                None => return Err(DxfError::invalid(format!("{kind} 未正确结束"))),
            }
        }
        Ok(GroupRecord {
            kind: kind.to_string(),
            pairs,
        })
    }

    /// 丢弃当前记录余下的组码，文件结束也视为记录结束。
    pub(crate) fn skip_record(&mut self) -> Result<(), DxfError> {
        while let Some(pair) = self.next_pair()? {
            if pair.0 == 0 {
                self.push_back(pair);
                break;
            }
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<&'a str> {
        let line = self.lines.next()?;
        self.line += 1;
        Some(line)
    }
}

/// 单个实体、顶点或表项的全部组码，不含起始的 0 组码。
#[derive(Debug)]
pub(crate) struct GroupRecord {
    kind: String,
    pairs: Vec<GroupPair>,
}

impl GroupRecord {
    pub(crate) fn kind(&self) -> &str {
        &self.kind
    }

    /// 按出现顺序遍历。
    pub(crate) fn pairs(&self) -> impl Iterator<Item = (i32, &str)> + '_ {
        self.pairs.iter().map(|(code, value)| (*code, value.as_str()))
    }

    pub(crate) fn values(&self, code: i32) -> impl Iterator<Item = &str> + '_ {
        self.pairs()
            .filter(move |(candidate, _)| *candidate == code)
            .map(|(_, value)| value)
    }

    /// 同一组码出现多次时取最后一个。
    pub(crate) fn last(&self, code: i32) -> Option<&str> {
        self.values(code).last()
    }

    pub(crate) fn layer(&self) -> String {
        self.last(8)
            .map(|value| value.trim().to_string())
            .unwrap_or_else(|| DEFAULT_LAYER.to_string())
    }

    pub(crate) fn label(&self, code: i32, what: &str) -> String {
        format!("{} {what}（组码 {code}）", self.kind)
    }

    /// 至多出现一次的实数组码。
    pub(crate) fn unique_real(&self, code: i32, what: &str) -> Result<Option<f64>, DxfError> {
        let context = self.label(code, what);
        let mut values = self.values(code);
        let Some(raw) = values.next() else {
            return Ok(None);
        };
        if values.next().is_some() {
            return Err(DxfError::invalid(format!("{context} 出现重复值")));
        }
        parse_real(raw, &context).map(Some)
    }

    pub(crate) fn required_real(&self, code: i32, what: &str) -> Result<f64, DxfError> {
        self.unique_real(code, what)?.ok_or_else(|| {
            DxfError::invalid(format!("{} 缺少{what}（组码 {code}）", self.kind))
        })
    }

    /// 组码 `code` 与 `code + 10` 组成的二维点。
    pub(crate) fn required_point(&self, code: i32, what: &str) -> Result<Point2, DxfError> {
        let x = self.required_real(code, &format!("{what} X"))?;
        let y = self.required_real(code + 10, &format!("{what} Y"))?;
        Ok(Point2::new(x, y))
    }

    pub(crate) fn optional_real(&self, code: i32, what: &str) -> Result<Option<f64>, DxfError> {
        self.last(code)
            .map(|raw| parse_real(raw, &self.label(code, what)))
            .transpose()
    }

    pub(crate) fn real_or(&self, code: i32, what: &str, default: f64) -> Result<f64, DxfError> {
        Ok(self.optional_real(code, what)?.unwrap_or(default))
    }

    pub(crate) fn int_or(&self, code: i32, what: &str, default: i32) -> Result<i32, DxfError> {
        match self.last(code) {
            Some(raw) => parse_int(raw, &self.label(code, what)),
            None => Ok(default),
        }
    }

    pub(crate) fn short_or(&self, code: i32, what: &str, default: i16) -> Result<i16, DxfError> {
        let context = self.label(code, what);
        let value = self.int_or(code, what, i32::from(default))?;
        i16::try_from(value)
            .map_err(|_| DxfError::invalid(format!("{context} 超出 i16 范围（值：{value}）")))
    }
}

pub(crate) fn parse_real(raw: &str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}

pub(crate) fn parse_int(raw: &str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::invalid(format!("{context} 解析失败（值：\"{raw}\"）")))
}
