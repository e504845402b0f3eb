//! TSL Diagnostics
//!
//! 编译器诊断系统：诊断级别、源码位置和诊断收集器。
//! 编译期间所有的语义错误先进入 `DiagnosticSink`，
//! 最终在 driver 层折叠为单个顶层错误状态。

pub mod diagnostic;
pub mod level;
pub mod sink;
pub mod span;

pub use diagnostic::Diagnostic;
pub use level::DiagnosticLevel;
pub use sink::DiagnosticSink;
pub use span::Span;
