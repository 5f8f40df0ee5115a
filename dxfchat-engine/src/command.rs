use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use dxfchat_core::document::Document;

use crate::args::Args;
use crate::errors::EngineError;
use crate::operations;

/// 单个脚本允许的最大操作数。
pub const MAX_OPERATIONS: usize = 64;

/// 一条编辑请求：操作名加参数对象。
#[derive(Debug, Clone, PartialEq)]
pub struct EditRequest {
    pub op: String,
    pub args: Map<String, Value>,
}

impl EditRequest {
    pub fn new(op: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            op: op.into(),
            args,
        }
    }

    #[inline]
    pub fn args(&self) -> Args<'_> {
        Args::new(&self.op, &self.args)
    }

    /// 接受 `{"op": "...", ...参数}`，或参数嵌套在 `args` 中的写法。
    fn from_value(index: usize, value: Value) -> Result<Self, EngineError> {
        let Value::Object(mut map) = value else {
            return Err(EngineError::InvalidScript(format!(
                "operation #{} must be a JSON object",
                index + 1
            )));
        };
        let op = match map.remove("op") {
            Some(Value::String(op)) if !op.trim().is_empty() => op.trim().to_string(),
            _ => {
                return Err(EngineError::InvalidScript(format!(
                    "operation #{} is missing a string `op` field",
                    index + 1
                )));
            }
        };
        // 嵌套的 `args` 与同级参数合并，同名参数视为冲突
        let args = match map.remove("args") {
            None => map,
            Some(Value::Object(nested)) => {
                for (key, value) in nested {
                    if map.contains_key(&key) {
                        return Err(EngineError::InvalidArguments(format!(
                            "{op}: `{key}` is given both inline and inside `args` (operation #{})",
                            index + 1
                        )));
                    }
                    map.insert(key, value);
                }
                map
            }
            Some(_) => {
                return Err(EngineError::InvalidArguments(format!(
                    "{op}: `args` must be a JSON object (operation #{})",
                    index + 1
                )));
            }
        };
        Ok(Self { op, args })
    }
}

/// 单个操作执行成功后的说明。
#[derive(Debug, Clone)]
pub struct EditResponse {
    pub message: String,
}

impl EditResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub struct EditContext<'a> {
    pub document: &'a mut Document,
}

pub trait EditHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// 提示词中展示的调用示例。
    fn usage(&self) -> &'static str;

    fn execute(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError>;
}

/// 解析后的编辑脚本。
#[derive(Debug, Clone, PartialEq)]
pub struct EditScript {
    operations: Vec<EditRequest>,
}

impl EditScript {
    /// 解析 JSON 数组，或 `{"operations": [...]}` 形式的对象。
    pub fn parse(source: &str) -> Result<Self, EngineError> {
        let value: Value = serde_json::from_str(source.trim())
            .map_err(|err| EngineError::InvalidScript(format!("not valid JSON: {err}")))?;
        let items = match value {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("operations") {
                Some(Value::Array(items)) => items,
                _ if map.contains_key("op") => vec![Value::Object(map)],
                _ => {
                    return Err(EngineError::InvalidScript(
                        "expected a JSON array of operations or an object with an `operations` array"
                            .to_string(),
                    ));
                }
            },
            _ => {
                return Err(EngineError::InvalidScript(
                    "expected a JSON array of operations".to_string(),
                ));
            }
        };
        if items.is_empty() {
            return Err(EngineError::InvalidScript(
                "script contains no operations".to_string(),
            ));
        }
        if items.len() > MAX_OPERATIONS {
            return Err(EngineError::InvalidScript(format!(
                "script has {} operations, the limit is {MAX_OPERATIONS}",
                items.len()
            )));
        }
        let operations = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| EditRequest::from_value(index, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { operations })
    }

    pub fn from_requests(operations: Vec<EditRequest>) -> Self {
        Self { operations }
    }

    #[inline]
    pub fn operations(&self) -> &[EditRequest] {
        &self.operations
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// 脚本执行结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub entities_before: usize,
    pub entities_after: usize,
    pub messages: Vec<String>,
}

impl ExecutionReport {
    /// 根据实体数量变化生成面向用户的结果描述。
    pub fn summary(&self) -> String {
        if self.entities_after < self.entities_before {
            format!(
                "{} element(s) removed",
                self.entities_before - self.entities_after
            )
        } else if self.entities_after > self.entities_before {
            format!(
                "{} element(s) added",
                self.entities_after - self.entities_before
            )
        } else {
            "Changes applied successfully".to_string()
        }
    }
}

pub struct EditBus {
    handlers: HashMap<&'static str, Box<dyn EditHandler>>,
}

impl EditBus {
    /// 注册全部内置编辑操作。
    pub fn new() -> Self {
        let mut bus = Self::empty();
        operations::register_builtin(&mut bus);
        bus
    }

    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<H: EditHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &EditRequest,
        context: &mut EditContext<'_>,
    ) -> Result<EditResponse, EngineError> {
        match self.handlers.get(request.op.as_str()) {
            Some(handler) => handler.execute(request, context),
            None => Err(EngineError::UnknownOperation(request.op.clone())),
        }
    }

    /// 已注册操作名，按字母序。
    pub fn available_operations(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// `(操作名, 调用示例)`，按字母序。
    pub fn operation_usages(&self) -> Vec<(&'static str, &'static str)> {
        self.available_operations()
            .into_iter()
            .filter_map(|name| {
                self.handlers
                    .get(name)
                    .map(|handler| (name, handler.usage()))
            })
            .collect()
    }

    /// 在文档副本上依次执行脚本，全部成功后才替换原文档。
    pub fn execute(
        &self,
        script: &EditScript,
        document: &mut Document,
    ) -> Result<ExecutionReport, EngineError> {
        let mut working = document.clone();
        let entities_before = working.entity_count();
        let mut messages = Vec::with_capacity(script.len());
        {
            let mut context = EditContext {
                document: &mut working,
            };
            for (index, request) in script.operations().iter().enumerate() {
                match self.dispatch(request, &mut context) {
                    Ok(response) => {
                        debug!(index, op = %request.op, message = %response.message, "编辑操作完成");
                        messages.push(response.message);
                    }
                    Err(err) => {
                        warn!(index, op = %request.op, error = %err, "编辑操作失败，放弃整个脚本");
                        return Err(EngineError::Operation {
                            index,
                            op: request.op.clone(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }
        let report = ExecutionReport {
            entities_before,
            entities_after: working.entity_count(),
            messages,
        };
        *document = working;
        info!(
            operations = script.len(),
            before = report.entities_before,
            after = report.entities_after,
            "编辑脚本已提交"
        );
        Ok(report)
    }

    /// 解析并执行脚本文本。
    pub fn run(&self, source: &str, document: &mut Document) -> Result<ExecutionReport, EngineError> {
        let script = EditScript::parse(source)?;
        self.execute(&script, document)
    }
}

impl Default for EditBus {
    fn default() -> Self {
        Self::new()
    }
}
