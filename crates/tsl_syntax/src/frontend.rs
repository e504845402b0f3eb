//! Frontend Driver Interface
//!
//! 语法前端与编译 driver 之间的回调契约。parser 每识别出一个顶层
//! 构造就把节点放进 AST arena 并回调 driver 一次；shader 体内引用
//! 的 closure 名称也在这里上报。

use crate::arena::{self, DeclHandle};
use crate::ast::{DataType, Decl, Expr, ExprKind, Program, Stmt};
use std::sync::Arc;

/// 编译 driver 必须实现的回调集合
///
/// `cache_data_type` / `data_type_cache` 是 driver 的单槽类型缓存，
/// `claim_permanent_address` 返回 driver 字符串池中的稳定地址
pub trait ParserCallbacks {
    /// 收到一个函数定义；shader 入口以 `is_shader = true` 上报
    fn push_function(&mut self, handle: DeclHandle, is_shader: bool);

    /// 收到一个 struct 声明
    fn push_structure(&mut self, handle: DeclHandle);

    /// 收到一个全局参数，声明类型已先通过 `cache_data_type` 缓存
    fn push_global_parameter(&mut self, handle: DeclHandle);

    /// shader 体内引用了一个 closure 类型
    fn closure_touched(&mut self, name: &str);

    /// 缓存当前正在解析的声明类型
    fn cache_data_type(&mut self, ty: DataType);

    /// 读取类型缓存
    fn data_type_cache(&self) -> DataType;

    /// 字符串驻留：同一内容恒返回同一个共享地址
    fn claim_permanent_address(&mut self, s: &str) -> Arc<str>;
}

enum DeliveredKind {
    Function { is_shader: bool, closures: Vec<String> },
    Structure,
    GlobalParam(DataType),
}

/// 把解析好的程序逐个节点交付给 driver
///
/// 节点移入当前线程的 arena region，调用方必须持有 `AstRegionGuard`
pub fn deliver_program(program: Program, callbacks: &mut dyn ParserCallbacks) {
    for decl in program.decls {
        let kind = match &decl {
            Decl::Function { body, is_shader, .. } => {
                let mut closures = Vec::new();
                collect_closures_in_stmts(body, &mut closures);
                DeliveredKind::Function {
                    is_shader: *is_shader,
                    closures,
                }
            }
            Decl::Structure { .. } => DeliveredKind::Structure,
            Decl::GlobalParam { ty, .. } => DeliveredKind::GlobalParam(ty.clone()),
        };

        let handle = arena::alloc_decl(decl);
        match kind {
            DeliveredKind::Function { is_shader, closures } => {
                for name in &closures {
                    callbacks.closure_touched(name);
                }
                callbacks.push_function(handle, is_shader);
            }
            DeliveredKind::Structure => callbacks.push_structure(handle),
            DeliveredKind::GlobalParam(ty) => {
                callbacks.cache_data_type(ty);
                callbacks.push_global_parameter(handle);
            }
        }
    }
}

fn collect_closures_in_stmts(stmts: &[Stmt], out: &mut Vec<String>) {
    for stmt in stmts {
        match stmt {
            Stmt::VarDecl { init, .. } => {
                if let Some(init) = init {
                    collect_closures_in_expr(init, out);
                }
            }
            Stmt::Assign { value, .. } => collect_closures_in_expr(value, out),
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => {
                collect_closures_in_expr(condition, out);
                collect_closures_in_stmts(then_block, out);
                if let Some(else_block) = else_block {
                    collect_closures_in_stmts(else_block, out);
                }
            }
            Stmt::While {
                condition, body, ..
            } => {
                collect_closures_in_expr(condition, out);
                collect_closures_in_stmts(body, out);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    collect_closures_in_expr(value, out);
                }
            }
            Stmt::Expression { expr, .. } => collect_closures_in_expr(expr, out),
            Stmt::Block { body, .. } => collect_closures_in_stmts(body, out),
            Stmt::Break { .. } | Stmt::Continue { .. } => {}
        }
    }
}

fn collect_closures_in_expr(expr: &Expr, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::MakeClosure { name, args } => {
            if !out.iter().any(|n| n == name) {
                out.push(name.clone());
            }
            for arg in args {
                collect_closures_in_expr(arg, out);
            }
        }
        ExprKind::Binary(lhs, _, rhs) => {
            collect_closures_in_expr(lhs, out);
            collect_closures_in_expr(rhs, out);
        }
        ExprKind::Unary(_, operand) => collect_closures_in_expr(operand, out),
        ExprKind::Call { args, .. } | ExprKind::VecCtor { args, .. } => {
            for arg in args {
                collect_closures_in_expr(arg, out);
            }
        }
        ExprKind::Member { base, .. } => collect_closures_in_expr(base, out),
        ExprKind::Literal(_) | ExprKind::Variable(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::AstRegionGuard;
    use crate::parser::parse_program;

    #[derive(Default)]
    struct RecordingCallbacks {
        functions: Vec<(DeclHandle, bool)>,
        structures: Vec<DeclHandle>,
        globals: Vec<DeclHandle>,
        closures: Vec<String>,
        type_cache: Option<DataType>,
        pool: Vec<Arc<str>>,
    }

    impl ParserCallbacks for RecordingCallbacks {
        fn push_function(&mut self, handle: DeclHandle, is_shader: bool) {
            self.functions.push((handle, is_shader));
        }
        fn push_structure(&mut self, handle: DeclHandle) {
            self.structures.push(handle);
        }
        fn push_global_parameter(&mut self, handle: DeclHandle) {
            self.globals.push(handle);
        }
        fn closure_touched(&mut self, name: &str) {
            self.closures.push(name.to_string());
        }
        fn cache_data_type(&mut self, ty: DataType) {
            self.type_cache = Some(ty);
        }
        fn data_type_cache(&self) -> DataType {
            self.type_cache.clone().unwrap_or(DataType::Void)
        }
        fn claim_permanent_address(&mut self, s: &str) -> Arc<str> {
            if let Some(existing) = self.pool.iter().find(|p| p.as_ref() == s) {
                return existing.clone();
            }
            let interned: Arc<str> = Arc::from(s);
            self.pool.push(interned.clone());
            interned
        }
    }

    #[test]
    fn test_deliver_pushes_each_construct() {
        let program = parse_program(
            r#"
            struct M { float a; };
            float scale = 2.0;
            float twice(float x){ return x * 2.0; }
            shader entry(out closure c){ c = make_closure<Lambert>(); }
            "#,
        )
        .unwrap();

        let _guard = AstRegionGuard::enter();
        let mut callbacks = RecordingCallbacks::default();
        deliver_program(program, &mut callbacks);

        assert_eq!(callbacks.structures.len(), 1);
        assert_eq!(callbacks.globals.len(), 1);
        assert_eq!(callbacks.functions.len(), 2);
        assert_eq!(callbacks.functions[0].1, false);
        assert_eq!(callbacks.functions[1].1, true);
        assert_eq!(callbacks.closures, vec!["Lambert".to_string()]);
        // 全局参数交付前类型已缓存
        assert_eq!(callbacks.type_cache, Some(DataType::Float));
    }

    #[test]
    fn test_closure_touched_once_per_name() {
        let program = parse_program(
            "shader entry(out closure c){ c = make_closure<A>() + make_closure<A>(); }",
        )
        .unwrap();

        let _guard = AstRegionGuard::enter();
        let mut callbacks = RecordingCallbacks::default();
        deliver_program(program, &mut callbacks);
        assert_eq!(callbacks.closures, vec!["A".to_string()]);
    }
}
