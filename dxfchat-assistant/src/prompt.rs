//! 系统提示词：描述当前图纸、可用编辑操作以及回复格式。

use std::fmt::Write;

/// 生成提示词所需的图纸概况。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptContext {
    /// `(图层名, 实体数量)`，按图层表顺序。
    pub layers: Vec<(String, usize)>,
    /// `(实体类型, 数量)`，只包含出现过的类型。
    pub entity_kinds: Vec<(String, usize)>,
    /// `(操作名, 示例)`。
    pub operations: Vec<(String, String)>,
}

pub fn build_system_prompt(context: &PromptContext) -> String {
    let mut prompt = String::from(
        "You are an expert CAD assistant that edits DXF drawings by writing JSON edit scripts.\n\n",
    );

    prompt.push_str("The current DXF document has these layers:\n");
    if context.layers.is_empty() {
        prompt.push_str("- (no layers)\n");
    }
    for (name, count) in &context.layers {
        let _ = writeln!(prompt, "- {name}: {count} entities");
    }

    if !context.entity_kinds.is_empty() {
        prompt.push_str("\nEntity types in the drawing:\n");
        for (kind, count) in &context.entity_kinds {
            let _ = writeln!(prompt, "- {kind}: {count}");
        }
    }

    prompt.push_str(
        "\nThe user will describe changes they want to make. Generate an edit script that:\n\
         1. Is a JSON array of operation objects, executed in order\n\
         2. Selects entities with the optional keys `type` (a type name or a list of them), \
         `layer`, `text` (exact text) and `text_contains` (case-insensitive substring)\n\
         3. Uses coordinates as [x, y] and angles in degrees\n\
         4. Only uses the operations listed below\n\
         If any operation fails, none of the changes are applied.\n\n",
    );

    prompt.push_str("Available operations:\n");
    for (name, usage) in &context.operations {
        let _ = writeln!(prompt, "- {name}: `{usage}`");
    }

    prompt.push_str(
        "\nRespond with:\n\
         1. A brief explanation of what you'll do (1-2 sentences)\n\
         2. The JSON edit script\n\n\
         Format your response as:\n\
         EXPLANATION: <your explanation>\n\
         CODE:\n\
         ```json\n\
         [ ... ]\n\
         ```",
    );
    prompt
}
