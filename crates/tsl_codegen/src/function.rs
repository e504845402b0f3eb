//! Function Code Generation
//!
//! 普通函数与 shader 入口的声明和函数体生成。shader ABI：out 参数按
//! 指针传递，标量 in 按值，聚合与 closure 的 in 按指针语义处理，
//! 末尾附加隐式的 tsl_global* 参数，返回 void，外部链接。
//! 普通函数只在模块内可见（内部链接），参数全部按值

use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, FunctionType};
use inkwell::values::FunctionValue;
use tsl_syntax::ast::{DataType, Decl, Param};

use crate::context::{CompileContext, VarSlot};
use crate::error::{CodegenError, CodegenResult};
use crate::global_module::tsl_global_ptr_type;
use crate::stmt::StmtGenerator;
use crate::types::ToLLVMType;
use inkwell::AddressSpace;

/// shader 入口的 LLVM 函数类型
///
/// args 为 (类型, 是否输出) 对；shader group 的 wrapper 也用同一套
/// 降级规则声明成员 shader 的原型
pub fn shader_fn_type<'ctx>(
    ctx: &CompileContext<'ctx>,
    args: &[(DataType, bool)],
) -> CodegenResult<FunctionType<'ctx>> {
    let mut params: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(args.len() + 1);
    for (ty, is_output) in args {
        let llvm_ty = ty.to_llvm_type(ctx)?;
        if *is_output || ty.is_aggregate() {
            params.push(llvm_ty.ptr_type(AddressSpace::default()).into());
        } else {
            params.push(llvm_ty.into());
        }
    }
    params.push(tsl_global_ptr_type(ctx)?.into());
    Ok(ctx.context.void_type().fn_type(&params, false))
}

/// 声明一个 shader 函数（外部链接），已存在时直接复用
pub fn declare_shader_function<'ctx>(
    ctx: &CompileContext<'ctx>,
    name: &str,
    args: &[(DataType, bool)],
) -> CodegenResult<FunctionValue<'ctx>> {
    if let Some(existing) = ctx.module.get_function(name) {
        return Ok(existing);
    }
    let fn_ty = shader_fn_type(ctx, args)?;
    Ok(ctx.module.add_function(name, fn_ty, None))
}

/// 函数代码生成器
pub struct FunctionGenerator<'ctx, 'a> {
    ctx: &'a mut CompileContext<'ctx>,
}

impl<'ctx, 'a> FunctionGenerator<'ctx, 'a> {
    /// 创建函数生成器
    pub fn new(ctx: &'a mut CompileContext<'ctx>) -> Self {
        Self { ctx }
    }

    /// 声明普通函数（不生成函数体），登记签名供调用点查询
    pub fn declare_function(&mut self, decl: &Decl) -> CodegenResult<FunctionValue<'ctx>> {
        let Decl::Function {
            name,
            params,
            return_type,
            ..
        } = decl
        else {
            return Err(CodegenError::NotAFunction);
        };

        if self.ctx.function_signatures.contains_key(name) {
            return Err(CodegenError::DuplicateDefinition(name.clone()));
        }

        let mut param_types: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(params.len());
        for param in params {
            let param_ty = param.ty.to_llvm_type(self.ctx)?;
            param_types.push(param_ty.into());
        }

        let fn_type = if *return_type == DataType::Void {
            self.ctx.context.void_type().fn_type(&param_types, false)
        } else {
            let ret_ty = return_type.to_llvm_type(self.ctx)?;
            ret_ty.fn_type(&param_types, false)
        };

        let function = self
            .ctx
            .module
            .add_function(name, fn_type, Some(Linkage::Internal));

        for (i, param) in params.iter().enumerate() {
            if let Some(param_value) = function.get_nth_param(i as u32) {
                param_value.set_name(&param.name);
            }
        }

        self.ctx.function_signatures.insert(
            name.clone(),
            (
                params.iter().map(|p| p.ty.clone()).collect(),
                return_type.clone(),
            ),
        );

        Ok(function)
    }

    /// 生成普通函数体（函数应当已在声明阶段创建）
    pub fn define_function(&mut self, decl: &Decl) -> CodegenResult<FunctionValue<'ctx>> {
        let Decl::Function {
            name,
            params,
            return_type,
            body,
            ..
        } = decl
        else {
            return Err(CodegenError::NotAFunction);
        };

        let function = self
            .ctx
            .module
            .get_function(name)
            .ok_or_else(|| CodegenError::FunctionNotFound(name.clone()))?;

        let entry = self.ctx.context.append_basic_block(function, "entry");
        self.ctx.builder.position_at_end(entry);

        self.ctx.push_var_symbol_layer();
        let result = self.define_function_inner(function, params, return_type, body, name);
        self.ctx.pop_var_symbol_layer();
        result?;

        Ok(function)
    }

    fn define_function_inner(
        &mut self,
        function: FunctionValue<'ctx>,
        params: &[Param],
        return_type: &DataType,
        body: &[tsl_syntax::ast::Stmt],
        name: &str,
    ) -> CodegenResult<()> {
        // 为参数分配栈槽并存储
        for (i, param) in params.iter().enumerate() {
            let param_value = function.get_nth_param(i as u32).ok_or_else(|| {
                CodegenError::LLVMBuildError(format!("missing parameter {}", i))
            })?;

            let param_ty = param.ty.to_llvm_type(self.ctx)?;
            let alloca = self
                .ctx
                .builder
                .build_alloca(param_ty, &param.name)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
            self.ctx
                .builder
                .build_store(alloca, param_value)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

            self.ctx.declare_var(
                &param.name,
                VarSlot {
                    ptr: alloca,
                    ty: param.ty.clone(),
                },
            )?;
        }

        let mut stmt_gen = StmtGenerator::new(self.ctx, return_type.clone());
        stmt_gen.generate_block(body)?;

        // void 函数允许隐式 return，非 void 函数缺终结指令报错
        let last_block = self
            .ctx
            .builder
            .get_insert_block()
            .ok_or_else(|| CodegenError::LLVMBuildError("builder lost insert block".into()))?;
        if last_block.get_terminator().is_none() {
            if *return_type == DataType::Void {
                self.ctx
                    .builder
                    .build_return(None)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
            } else {
                return Err(CodegenError::MissingReturn(name.to_string()));
            }
        }
        Ok(())
    }

    /// 生成 shader 入口：声明外部链接函数并生成函数体
    pub fn define_shader(&mut self, decl: &Decl) -> CodegenResult<FunctionValue<'ctx>> {
        let Decl::Function {
            name, params, body, ..
        } = decl
        else {
            return Err(CodegenError::NotAFunction);
        };

        let args: Vec<(DataType, bool)> = params
            .iter()
            .map(|p| (p.ty.clone(), p.is_output))
            .collect();
        let function = declare_shader_function(self.ctx, name, &args)?;

        let entry = self.ctx.context.append_basic_block(function, "entry");
        self.ctx.builder.position_at_end(entry);

        self.ctx.push_var_symbol_layer();
        let result = self.define_shader_inner(function, params, body);
        self.ctx.pop_var_symbol_layer();
        result?;

        Ok(function)
    }

    fn define_shader_inner(
        &mut self,
        function: FunctionValue<'ctx>,
        params: &[Param],
        body: &[tsl_syntax::ast::Stmt],
    ) -> CodegenResult<()> {
        for (i, param) in params.iter().enumerate() {
            let param_value = function.get_nth_param(i as u32).ok_or_else(|| {
                CodegenError::LLVMBuildError(format!("missing parameter {}", i))
            })?;
            param_value.set_name(&param.name);

            let slot = if param.is_output {
                // out 参数直接用调用方指针当栈槽，写入即回传
                VarSlot {
                    ptr: param_value.into_pointer_value(),
                    ty: param.ty.clone(),
                }
            } else if param.ty.is_aggregate() {
                // 聚合 in 参数按指针进来，拷贝一份保持值语义
                let llvm_ty = param.ty.to_llvm_type(self.ctx)?;
                let alloca = self
                    .ctx
                    .builder
                    .build_alloca(llvm_ty, &param.name)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                let value = self
                    .ctx
                    .builder
                    .build_load(param_value.into_pointer_value(), &param.name)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                self.ctx
                    .builder
                    .build_store(alloca, value)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                VarSlot {
                    ptr: alloca,
                    ty: param.ty.clone(),
                }
            } else {
                let llvm_ty = param.ty.to_llvm_type(self.ctx)?;
                let alloca = self
                    .ctx
                    .builder
                    .build_alloca(llvm_ty, &param.name)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                self.ctx
                    .builder
                    .build_store(alloca, param_value)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                VarSlot {
                    ptr: alloca,
                    ty: param.ty.clone(),
                }
            };

            self.ctx.declare_var(&param.name, slot)?;
        }

        if let Some(global_param) = function.get_last_param() {
            global_param.set_name("tsl_global");
        }

        let mut stmt_gen = StmtGenerator::new(self.ctx, DataType::Void);
        stmt_gen.generate_block(body)?;

        let last_block = self
            .ctx
            .builder
            .get_insert_block()
            .ok_or_else(|| CodegenError::LLVMBuildError("builder lost insert block".into()))?;
        if last_block.get_terminator().is_none() {
            self.ctx
                .builder
                .build_return(None)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
        }
        Ok(())
    }
}
