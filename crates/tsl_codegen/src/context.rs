//! LLVM Compile Context
//!
//! 封装一次编译用到的 LLVM Context、Module、Builder，以及类型表、
//! closure 构造函数表和嵌套的变量符号层。各个生成器之间通过它共享
//! 状态，避免传递一长串参数

use crate::error::{CodegenError, CodegenResult};
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::StructType;
use inkwell::values::{FunctionValue, GlobalValue, PointerValue};
use std::collections::HashMap;
use tsl_diagnostics::DiagnosticSink;
use tsl_syntax::ast::DataType;

/// 一个局部变量（或 shader 参数）的栈槽
#[derive(Debug, Clone)]
pub struct VarSlot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: DataType,
}

/// LLVM 代码生成上下文
pub struct CompileContext<'ctx> {
    /// LLVM Context
    pub context: &'ctx Context,
    /// LLVM Module
    pub module: Module<'ctx>,
    /// LLVM IR Builder
    pub builder: Builder<'ctx>,
    /// 命名结构类型：内置的 float3/float4/matrix/closure 节点
    /// 加上 shader 源码声明的 struct
    pub struct_types: HashMap<String, StructType<'ctx>>,
    /// shader struct 的字段（有序，name + type）
    pub struct_fields: HashMap<String, Vec<(String, DataType)>>,
    /// 已声明的 closure 构造函数及字段布局
    pub closure_functions: HashMap<String, FunctionValue<'ctx>>,
    pub closure_signatures: HashMap<String, Vec<(String, DataType)>>,
    /// 可调用的 math 运行时函数（shader 可见名 → 声明）
    pub math_functions: HashMap<String, FunctionValue<'ctx>>,
    /// 普通函数签名：name → (参数类型, 返回类型)
    pub function_signatures: HashMap<String, (Vec<DataType>, DataType)>,
    /// 全局 shader 参数
    pub global_values: HashMap<String, (GlobalValue<'ctx>, DataType)>,
    /// 嵌套变量符号层，内层优先
    scopes: Vec<HashMap<String, VarSlot<'ctx>>>,
    /// 语义错误收集
    pub diagnostics: DiagnosticSink,
}

impl<'ctx> CompileContext<'ctx> {
    /// 创建新的代码生成上下文
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        Self {
            context,
            module: context.create_module(module_name),
            builder: context.create_builder(),
            struct_types: HashMap::new(),
            struct_fields: HashMap::new(),
            closure_functions: HashMap::new(),
            closure_signatures: HashMap::new(),
            math_functions: HashMap::new(),
            function_signatures: HashMap::new(),
            global_values: HashMap::new(),
            scopes: Vec::new(),
            diagnostics: DiagnosticSink::new(),
        }
    }

    /// 压入一层变量符号
    pub fn push_var_symbol_layer(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// 弹出最内层变量符号
    pub fn pop_var_symbol_layer(&mut self) {
        self.scopes.pop();
    }

    /// 在当前层定义变量，同层重名报错
    pub fn declare_var(&mut self, name: &str, slot: VarSlot<'ctx>) -> CodegenResult<()> {
        let layer = self
            .scopes
            .last_mut()
            .ok_or_else(|| CodegenError::LLVMBuildError("no active symbol layer".to_string()))?;
        if layer.contains_key(name) {
            return Err(CodegenError::DuplicateDefinition(name.to_string()));
        }
        layer.insert(name.to_string(), slot);
        Ok(())
    }

    /// 从内层向外层查找变量
    pub fn lookup_var(&self, name: &str) -> Option<&VarSlot<'ctx>> {
        self.scopes.iter().rev().find_map(|layer| layer.get(name))
    }

    /// 获取模块的 LLVM IR 字符串表示
    pub fn print_to_string(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// 验证模块的正确性
    pub fn verify(&self) -> Result<(), CodegenError> {
        self.module
            .verify()
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_layers_shadowing() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");

        let ptr = ctx
            .module
            .add_global(ctx.context.f32_type(), None, "g")
            .as_pointer_value();

        ctx.push_var_symbol_layer();
        ctx.declare_var(
            "x",
            VarSlot {
                ptr,
                ty: DataType::Float,
            },
        )
        .unwrap();

        ctx.push_var_symbol_layer();
        ctx.declare_var(
            "x",
            VarSlot {
                ptr,
                ty: DataType::Int,
            },
        )
        .unwrap();

        // 内层遮蔽外层
        assert_eq!(ctx.lookup_var("x").unwrap().ty, DataType::Int);

        ctx.pop_var_symbol_layer();
        assert_eq!(ctx.lookup_var("x").unwrap().ty, DataType::Float);

        ctx.pop_var_symbol_layer();
        assert!(ctx.lookup_var("x").is_none());
    }

    #[test]
    fn test_duplicate_in_same_layer() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        let ptr = ctx
            .module
            .add_global(ctx.context.f32_type(), None, "g")
            .as_pointer_value();

        ctx.push_var_symbol_layer();
        ctx.declare_var(
            "x",
            VarSlot {
                ptr,
                ty: DataType::Float,
            },
        )
        .unwrap();
        let result = ctx.declare_var(
            "x",
            VarSlot {
                ptr,
                ty: DataType::Float,
            },
        );
        assert!(matches!(result, Err(CodegenError::DuplicateDefinition(_))));
    }
}
