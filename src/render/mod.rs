// ==========================================
// 包装 ERP - 文档渲染边界
// ==========================================
// 输入: 完全解析后的 InvoiceDocument（渲染器不做任何查询）
// 输出: 以文档标识为键的自包含 HTML
// ==========================================

pub mod invoice_renderer;

pub use invoice_renderer::{DocumentRenderer, RenderError, RenderedDocument, TeraInvoiceRenderer};
