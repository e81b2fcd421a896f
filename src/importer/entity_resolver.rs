// ==========================================
// 包装 ERP - 引用解析器
// ==========================================
// 职责: 按自然键把导入行关联到会话快照中的已有实体
// 规则: 解析失败不阻断（warning 或 info），提示"将新建"
// ==========================================

use crate::domain::reference::{columns as col, normalize_key};
use crate::domain::{ImportRow, ImportVariant, MessageStage, ReferenceSnapshot, RowMessage, Severity};

pub struct EntityResolver<'a> {
    snapshot: &'a ReferenceSnapshot,
}

impl<'a> EntityResolver<'a> {
    pub fn new(snapshot: &'a ReferenceSnapshot) -> Self {
        Self { snapshot }
    }

    /// 解析行引用（替换此前的解析消息；不触碰匹配结果）
    pub fn resolve(&self, variant: ImportVariant, row: &mut ImportRow) {
        row.clear_stage(MessageStage::Resolution);
        row.resolved.client_id = None;
        row.resolved.client_to_create = None;
        row.resolved.existing_entity_id = None;

        match variant {
            ImportVariant::Clients => self.resolve_client_row(row),
            ImportVariant::Dielines => self.resolve_dieline_row(row),
            ImportVariant::Quotations => self.resolve_quotation_row(row),
        }
    }

    fn resolve_client_row(&self, row: &mut ImportRow) {
        let Some(name) = row.display(col::NAME) else {
            return;
        };
        let rfc = row.display(col::RFC);

        match self.snapshot.find_client(Some(&name), rfc.as_deref()) {
            Some(existing) => {
                row.resolved.client_id = Some(existing.client_id);
                row.resolved.existing_entity_id = Some(existing.client_id);
                let text = format!(
                    "existing client '{}' ({}) will be updated",
                    existing.name, existing.client_code
                );
                row.push_message(info(col::NAME, text));
            }
            None => {
                row.push_message(info(col::NAME, format!("new client '{}' will be created", name)));
            }
        }
    }

    fn resolve_dieline_row(&self, row: &mut ImportRow) {
        if let Some(sku) = row.display(col::SKU) {
            match self.snapshot.find_dieline_by_sku(&sku) {
                Some(existing) => {
                    row.resolved.existing_entity_id = Some(existing.dieline_id);
                    row.push_message(info(
                        col::SKU,
                        format!("existing dieline '{}' will be updated", sku),
                    ));
                }
                None => {
                    row.push_message(info(col::SKU, format!("new dieline '{}' will be created", sku)));
                }
            }
        }

        // 客户引用可选
        if let Some(client_name) = row.display(col::CLIENT_NAME) {
            self.resolve_client_reference(row, &client_name, None);
        }
    }

    fn resolve_quotation_row(&self, row: &mut ImportRow) {
        let Some(client_name) = row.display(col::CLIENT_NAME) else {
            return;
        };
        let rfc = row.display(col::CLIENT_RFC);
        self.resolve_client_reference(row, &client_name, rfc.as_deref());
    }

    fn resolve_client_reference(&self, row: &mut ImportRow, name: &str, rfc: Option<&str>) {
        match self.snapshot.find_client(Some(name), rfc) {
            Some(existing) => row.resolved.client_id = Some(existing.client_id),
            None => {
                row.resolved.client_to_create = Some(normalize_key(name));
                row.push_message(RowMessage::new(
                    Severity::Warning,
                    MessageStage::Resolution,
                    Some(col::CLIENT_NAME),
                    format!("client '{}' not found; a new client will be created", name),
                ));
            }
        }
    }
}

fn info(field: &str, text: String) -> RowMessage {
    RowMessage::new(Severity::Info, MessageStage::Resolution, Some(field), text)
}
