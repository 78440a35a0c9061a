//! On-demand report rendering: visualization overlay, structured document, PDF.
//!
//! Nothing here touches the database or caches output. Every call rebuilds
//! from the stored test and its backing image.

pub mod document;
pub mod pdf;
pub mod visualize;

pub use document::ReportDocument;
pub use pdf::render_pdf;
pub use visualize::render_visualization;
