//! TSL Code Generation
//!
//! LLVM 代码生成层，把 TSL AST 降级为 IR：
//! - `context.rs` - LLVM 上下文与符号层管理
//! - `error.rs` - 错误类型定义
//! - `types.rs` - 类型映射
//! - `global_module.rs` - 共享的全局声明（closure 节点、内置结构、运行时原型）
//! - `module_buffer.rs` - 跨 context 的模块快照
//! - `expr` / `stmt` / `function.rs` / `module.rs` - 各级生成器

pub mod context;
pub mod error;
pub mod expr;
pub mod function;
pub mod global_module;
pub mod module;
pub mod module_buffer;
pub mod stmt;
pub mod types;

// 重新导出核心类型
pub use context::{CompileContext, VarSlot};
pub use error::{CodegenError, CodegenResult};
pub use expr::{ExprGenerator, TypedValue};
pub use function::FunctionGenerator;
pub use module_buffer::ModuleBuffer;
pub use types::ToLLVMType;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_module::declare_global_module;
    use inkwell::context::Context;
    use tsl_syntax::parse_program;
    use tsl_syntax::ast::Decl;

    /// 解析一段源码并降级第一个 shader，返回生成的 IR
    fn compile_shader_ir(source: &str) -> String {
        let program = parse_program(source).unwrap();
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        for decl in &program.decls {
            match decl {
                Decl::Function { is_shader, .. } => {
                    let mut gen = FunctionGenerator::new(&mut ctx);
                    if *is_shader {
                        gen.define_shader(decl).unwrap();
                    } else {
                        gen.declare_function(decl).unwrap();
                        gen.define_function(decl).unwrap();
                    }
                }
                Decl::Structure { name, fields, .. } => {
                    let fields: Vec<_> = fields
                        .iter()
                        .map(|f| (f.name.clone(), f.ty.clone()))
                        .collect();
                    module::register_structure(&mut ctx, name, &fields).unwrap();
                }
                Decl::GlobalParam { name, ty, init, .. } => {
                    module::define_global_parameter(&mut ctx, name, ty, init).unwrap();
                }
            }
        }

        ctx.verify().unwrap();
        ctx.print_to_string()
    }

    #[test]
    fn test_constant_shader_ir() {
        let ir = compile_shader_ir("shader entry(out float o){ o = 3.5; }");
        // shader 根是外部链接的 void 函数，常量直接写进 out 指针
        assert!(ir.contains("define void @entry("));
        assert!(ir.contains("%tsl_global = type opaque"));
        assert!(ir.contains("store float 3.500000e+00"));
    }

    #[test]
    fn test_in_scalar_by_value() {
        let ir = compile_shader_ir("shader f(in float x, out float y){ y = x * 2.0; }");
        // 标量 in 按值进来，out 是指针参数
        assert!(ir.contains("define void @f(float %x,"));
        assert!(ir.contains("fmul float"));
    }

    #[test]
    fn test_int_promotion() {
        let ir = compile_shader_ir("shader f(in int n, out float y){ y = n + 0.5; }");
        assert!(ir.contains("sitofp i32"));
        assert!(ir.contains("fadd float"));
    }

    #[test]
    fn test_plain_function_internal_linkage() {
        let ir = compile_shader_ir(
            "float twice(float x){ return x * 2.0; } shader f(out float y){ y = twice(1.5); }",
        );
        assert!(ir.contains("define internal float @twice(float %x)"));
        assert!(ir.contains("call float @twice"));
    }

    #[test]
    fn test_while_loop_blocks() {
        let ir = compile_shader_ir(
            r#"
            shader f(in int n, out float y){
                float acc = 0.0;
                int i = 0;
                while (i < n) {
                    acc = acc + 1.0;
                    i = i + 1;
                }
                y = acc;
            }
            "#,
        );
        assert!(ir.contains("while.cond"));
        assert!(ir.contains("while.body"));
        assert!(ir.contains("while.end"));
    }

    #[test]
    fn test_closure_add_mul_nodes() {
        let program = parse_program(
            "shader f(out closure c){ c = make_closure<A>() * 0.5 + make_closure<B>(); }",
        )
        .unwrap();
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();
        global_module::declare_closure_function(&mut ctx, "A", &[]).unwrap();
        global_module::declare_closure_function(&mut ctx, "B", &[]).unwrap();

        let mut gen = FunctionGenerator::new(&mut ctx);
        gen.define_shader(&program.decls[0]).unwrap();
        ctx.verify().unwrap();

        let ir = ctx.print_to_string();
        assert!(ir.contains("@allocate_closure(i32 16)"));
        assert!(ir.contains("@allocate_closure(i32 24)"));
        assert!(ir.contains("@make_closure_A()"));
        // MUL 节点 id = -2, ADD 节点 id = -1
        assert!(ir.contains("store i32 -2"));
        assert!(ir.contains("store i32 -1"));
    }

    #[test]
    fn test_struct_member_access() {
        let ir = compile_shader_ir(
            r#"
            struct Material { float3 albedo; float roughness; };
            shader f(out float o){
                Material m;
                m.roughness = 0.25;
                o = m.roughness;
            }
            "#,
        );
        assert!(ir.contains("%Material = type { %float3, float }"));
        assert!(ir.contains("getelementptr inbounds %Material"));
    }

    #[test]
    fn test_vector_ctor_and_swizzle() {
        let ir = compile_shader_ir(
            "shader f(out float o){ float3 v = float3(1.0, 2.0, 3.0); o = v.y; }",
        );
        assert!(ir.contains("%float3 = type { float, float, float }"));
        assert!(ir.contains("extractvalue %float3"));
    }

    #[test]
    fn test_semantic_errors() {
        let program = parse_program("shader f(out float o){ o = missing; }").unwrap();
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        let mut gen = FunctionGenerator::new(&mut ctx);
        let err = gen.define_shader(&program.decls[0]).unwrap_err();
        assert!(matches!(err, CodegenError::UndefinedVariable(_)));
    }

    #[test]
    fn test_math_call() {
        let ir = compile_shader_ir("shader f(in float x, out float y){ y = sqrt(x); }");
        assert!(ir.contains("declare float @tsl_sqrt(float)"));
        assert!(ir.contains("call float @tsl_sqrt"));
    }
}
