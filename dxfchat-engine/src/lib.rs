pub mod args;
pub mod command;
pub mod operations;
pub mod sample;
pub mod selector;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("no DXF document is loaded")]
        NoDocument,
        #[error("invalid edit script: {0}")]
        InvalidScript(String),
        #[error("unknown operation `{0}`")]
        UnknownOperation(String),
        #[error("invalid arguments: {0}")]
        InvalidArguments(String),
        /// `index` 从 0 开始计数，显示时从 1 开始。
        #[error("operation #{} ({op}) failed: {message}", .index + 1)]
        Operation {
            index: usize,
            op: String,
            message: String,
        },
    }
}

pub mod workspace {
    use std::path::Path;

    use serde::Serialize;
    use tracing::{debug, info};
    use dxfchat_core::document::{Document, EntityKind};

    use crate::errors::EngineError;

    /// 导出格式，决定下载文件名的后缀。
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ExportFormat {
        Dxf,
        Pdf,
    }

    /// 图层概要，用于上传响应与 `/api/layers`。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct LayerSummary {
        pub name: String,
        pub color: i16,
        pub entity_count: usize,
    }

    #[derive(Debug, Clone)]
    struct LoadedDrawing {
        document: Document,
        filename: String,
    }

    /// 当前会话持有的图纸句柄：最多一份文档，新上传覆盖旧文档。
    #[derive(Debug, Default)]
    pub struct Workspace {
        loaded: Option<LoadedDrawing>,
    }

    impl Workspace {
        pub fn new() -> Self {
            Self::default()
        }

        /// 替换当前文档。
        pub fn load(&mut self, document: Document, filename: impl Into<String>) {
            let filename = filename.into();
            info!(
                filename = %filename,
                entities = document.entity_count(),
                replaced = self.loaded.is_some(),
                "载入图纸"
            );
            self.loaded = Some(LoadedDrawing { document, filename });
        }

        #[inline]
        pub fn is_loaded(&self) -> bool {
            self.loaded.is_some()
        }

        #[inline]
        pub fn document(&self) -> Option<&Document> {
            self.loaded.as_ref().map(|drawing| &drawing.document)
        }

        #[inline]
        pub fn document_mut(&mut self) -> Option<&mut Document> {
            self.loaded.as_mut().map(|drawing| &mut drawing.document)
        }

        pub fn require_document(&self) -> Result<&Document, EngineError> {
            self.document().ok_or(EngineError::NoDocument)
        }

        pub fn require_document_mut(&mut self) -> Result<&mut Document, EngineError> {
            self.document_mut().ok_or(EngineError::NoDocument)
        }

        #[inline]
        pub fn filename(&self) -> Option<&str> {
            self.loaded.as_ref().map(|drawing| drawing.filename.as_str())
        }

        pub fn clear(&mut self) {
            if let Some(drawing) = self.loaded.take() {
                debug!(filename = %drawing.filename, "清空工作区");
            }
        }

        /// 按图层表顺序返回每个图层的颜色与实体数量。
        pub fn layer_summaries(&self) -> Vec<LayerSummary> {
            let Some(document) = self.document() else {
                return Vec::new();
            };
            document
                .layers()
                .map(|layer| LayerSummary {
                    name: layer.name.clone(),
                    color: layer.color,
                    entity_count: document.count_on_layer(&layer.name),
                })
                .collect()
        }

        /// 各实体类型的数量，只包含出现过的类型。
        pub fn entity_kind_counts(&self) -> Vec<(EntityKind, usize)> {
            let Some(document) = self.document() else {
                return Vec::new();
            };
            EntityKind::ALL
                .iter()
                .filter_map(|kind| {
                    let count = document
                        .entities()
                        .filter(|(_, entity)| entity.kind() == *kind)
                        .count();
                    (count > 0).then_some((*kind, count))
                })
                .collect()
        }

        /// `plan.dxf` 导出为 `plan_edited.dxf`（DXF）或 `plan.pdf`（PDF）。
        pub fn export_filename(&self, format: ExportFormat) -> Option<String> {
            let filename = self.filename()?;
            let stem = Path::new(filename)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .filter(|stem| !stem.is_empty())
                .unwrap_or("drawing");
            Some(match format {
                ExportFormat::Dxf => format!("{stem}_edited.dxf"),
                ExportFormat::Pdf => format!("{stem}.pdf"),
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use dxfchat_core::geometry::Point2;

        use super::*;

        fn floorplan() -> Document {
            let mut document = Document::new();
            document.add_layer("WALLS", 7);
            document.add_layer("DOORS", 4);
            document.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "WALLS");
            document.add_line(Point2::new(10.0, 0.0), Point2::new(10.0, 8.0), "WALLS");
            document.add_text(Point2::new(2.0, 6.0), "KITCHEN", 0.3, 0.0, "TEXT");
            document
        }

        #[test]
        fn empty_workspace_has_no_document() {
            let workspace = Workspace::new();
            assert!(!workspace.is_loaded());
            assert!(workspace.layer_summaries().is_empty());
            assert!(workspace.export_filename(ExportFormat::Dxf).is_none());
            assert!(matches!(
                workspace.require_document(),
                Err(EngineError::NoDocument)
            ));
        }

        #[test]
        fn layer_summaries_follow_table_order() {
            let mut workspace = Workspace::new();
            workspace.load(floorplan(), "plan.dxf");

            let summaries = workspace.layer_summaries();
            let names: Vec<&str> = summaries.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, ["0", "WALLS", "DOORS", "TEXT"]);
            assert_eq!(summaries[1].entity_count, 2);
            assert_eq!(summaries[2].color, 4);
            assert_eq!(summaries[2].entity_count, 0);
        }

        #[test]
        fn kind_counts_skip_absent_kinds() {
            let mut workspace = Workspace::new();
            workspace.load(floorplan(), "plan.dxf");
            assert_eq!(
                workspace.entity_kind_counts(),
                vec![(EntityKind::Line, 2), (EntityKind::Text, 1)]
            );
        }

        #[test]
        fn export_names_derive_from_upload() {
            let mut workspace = Workspace::new();
            workspace.load(floorplan(), "plan.dxf");
            assert_eq!(
                workspace.export_filename(ExportFormat::Dxf).as_deref(),
                Some("plan_edited.dxf")
            );
            assert_eq!(
                workspace.export_filename(ExportFormat::Pdf).as_deref(),
                Some("plan.pdf")
            );

            workspace.load(Document::new(), "Office.Level2.DXF");
            assert_eq!(
                workspace.export_filename(ExportFormat::Pdf).as_deref(),
                Some("Office.Level2.pdf")
            );
        }

        #[test]
        fn second_load_replaces_first() {
            let mut workspace = Workspace::new();
            workspace.load(floorplan(), "a.dxf");
            workspace.load(Document::new(), "b.dxf");
            assert_eq!(workspace.filename(), Some("b.dxf"));
            assert_eq!(workspace.document().map(Document::entity_count), Some(0));

            workspace.clear();
            assert!(!workspace.is_loaded());
        }
    }
}
