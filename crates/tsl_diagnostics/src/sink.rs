//! DiagnosticSink - 诊断收集器
//!
//! 收集一次编译过程中的所有诊断。codegen 内部的语义错误全部进入 sink，
//! 由 driver 折叠为单个顶层错误

use crate::diagnostic::Diagnostic;

/// 诊断收集器
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    /// 收集的诊断列表
    diagnostics: Vec<Diagnostic>,
    /// 是否有错误
    has_errors: bool,
}

impl DiagnosticSink {
    /// 创建新的诊断收集器
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加诊断
    pub fn add(&mut self, diagnostic: Diagnostic) {
        if diagnostic.level.is_error() {
            self.has_errors = true;
        }
        self.diagnostics.push(diagnostic);
    }

    /// 添加错误
    pub fn error(&mut self, message: impl Into<String>) {
        self.add(Diagnostic::error(message));
    }

    /// 添加警告
    pub fn warning(&mut self, message: impl Into<String>) {
        self.add(Diagnostic::warning(message));
    }

    /// 是否有错误
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    /// 获取所有诊断
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// 折叠为单条消息，driver 层用它生成顶层错误状态
    pub fn summary(&self) -> String {
        self.diagnostics
            .iter()
            .filter(|d| d.level.is_error())
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// 清空所有诊断
    pub fn clear(&mut self) {
        self.diagnostics.clear();
        self.has_errors = false;
    }

    /// 获取诊断数量
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_collects() {
        let mut sink = DiagnosticSink::new();
        assert!(sink.is_empty());

        sink.error("first");
        sink.warning("second");

        assert!(sink.has_errors());
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_summary_only_errors() {
        let mut sink = DiagnosticSink::new();
        sink.error("bad type");
        sink.warning("unused");
        sink.error("bad call");

        let summary = sink.summary();
        assert!(summary.contains("bad type"));
        assert!(summary.contains("bad call"));
        assert!(!summary.contains("unused"));
    }

    #[test]
    fn test_clear() {
        let mut sink = DiagnosticSink::new();
        sink.error("e");
        sink.clear();
        assert!(!sink.has_errors());
        assert!(sink.is_empty());
    }
}
