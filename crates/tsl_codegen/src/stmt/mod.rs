//! Statement Code Generation
//!
//! 语句代码生成：变量声明、赋值、控制流、return。
//! 每个块一层变量符号，赋值时做 int → float 方向的隐式提升

pub mod control_flow;

use inkwell::basic_block::BasicBlock;
use tsl_syntax::ast::{AssignTarget, DataType, Stmt};

use crate::context::{CompileContext, VarSlot};
use crate::error::{CodegenError, CodegenResult};
use crate::expr::{promote, vector_component_index, ExprGenerator};
use crate::types::ToLLVMType;

/// 循环上下文，break/continue 的跳转目标
pub struct LoopContext<'ctx> {
    pub continue_block: BasicBlock<'ctx>,
    pub break_block: BasicBlock<'ctx>,
}

/// 语句代码生成器
pub struct StmtGenerator<'ctx, 'a> {
    pub ctx: &'a mut CompileContext<'ctx>,
    pub return_type: DataType,
    pub loop_stack: Vec<LoopContext<'ctx>>,
}

impl<'ctx, 'a> StmtGenerator<'ctx, 'a> {
    /// 创建语句生成器
    pub fn new(ctx: &'a mut CompileContext<'ctx>, return_type: DataType) -> Self {
        Self {
            ctx,
            return_type,
            loop_stack: Vec::new(),
        }
    }

    /// 生成一个语句块，块内变量自成一层
    ///
    /// return/break/continue 之后的语句不可达，跳过不再生成
    pub fn generate_block(&mut self, stmts: &[Stmt]) -> CodegenResult<()> {
        self.ctx.push_var_symbol_layer();
        let mut result = Ok(());
        for stmt in stmts {
            if let Some(block) = self.ctx.builder.get_insert_block() {
                if self.block_ends_with_terminator(block) {
                    break;
                }
            }
            result = self.generate(stmt);
            if result.is_err() {
                break;
            }
        }
        self.ctx.pop_var_symbol_layer();
        result
    }

    /// 生成单条语句
    pub fn generate(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::VarDecl { name, ty, init, .. } => self.gen_var_decl(name, ty, init.as_ref()),
            Stmt::Assign { target, value, .. } => self.gen_assign(target, value),
            Stmt::If {
                condition,
                then_block,
                else_block,
                ..
            } => control_flow::gen_if(self, condition, then_block, else_block.as_deref()),
            Stmt::While {
                condition, body, ..
            } => control_flow::gen_while(self, condition, body),
            Stmt::Break { .. } => control_flow::gen_break(self),
            Stmt::Continue { .. } => control_flow::gen_continue(self),
            Stmt::Return { value, .. } => self.gen_return(value.as_ref()),
            Stmt::Expression { expr, .. } => {
                let expr_gen = ExprGenerator::new(self.ctx);
                expr_gen.generate(expr)?;
                Ok(())
            }
            Stmt::Block { body, .. } => self.generate_block(body),
        }
    }

    fn gen_var_decl(
        &mut self,
        name: &str,
        ty: &DataType,
        init: Option<&tsl_syntax::ast::Expr>,
    ) -> CodegenResult<()> {
        let llvm_ty = ty.to_llvm_type(self.ctx)?;
        let ptr = self
            .ctx
            .builder
            .build_alloca(llvm_ty, name)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

        if let Some(init) = init {
            let expr_gen = ExprGenerator::new(self.ctx);
            let value = expr_gen.generate(init)?;
            let value = promote(self.ctx, value, ty)?;
            self.ctx
                .builder
                .build_store(ptr, value.value)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
        }

        self.ctx.declare_var(name, VarSlot { ptr, ty: ty.clone() })
    }

    fn gen_assign(
        &mut self,
        target: &AssignTarget,
        value: &tsl_syntax::ast::Expr,
    ) -> CodegenResult<()> {
        match target {
            AssignTarget::Variable(name) => {
                let slot = match self.ctx.lookup_var(name) {
                    Some(slot) => slot.clone(),
                    None if self.ctx.global_values.contains_key(name) => {
                        return Err(CodegenError::AssignToGlobal(name.clone()));
                    }
                    None => return Err(CodegenError::UndefinedVariable(name.clone())),
                };

                let expr_gen = ExprGenerator::new(self.ctx);
                let value = expr_gen.generate(value)?;
                let value = promote(self.ctx, value, &slot.ty)?;
                self.ctx
                    .builder
                    .build_store(slot.ptr, value.value)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                Ok(())
            }
            AssignTarget::Member { base, field } => self.gen_member_assign(base, field, value),
        }
    }

    fn gen_member_assign(
        &mut self,
        base: &str,
        field: &str,
        value: &tsl_syntax::ast::Expr,
    ) -> CodegenResult<()> {
        let slot = self
            .ctx
            .lookup_var(base)
            .cloned()
            .ok_or_else(|| CodegenError::UndefinedVariable(base.to_string()))?;

        let (index, field_ty) = match &slot.ty {
            DataType::Float3 | DataType::Float4 => (
                vector_component_index(field, &slot.ty)?,
                DataType::Float,
            ),
            DataType::Struct(name) => {
                let fields = self
                    .ctx
                    .struct_fields
                    .get(name)
                    .ok_or_else(|| CodegenError::UndefinedStructType(name.clone()))?;
                fields
                    .iter()
                    .enumerate()
                    .find(|(_, (n, _))| n.as_str() == field)
                    .map(|(i, (_, ty))| (i as u32, ty.clone()))
                    .ok_or_else(|| CodegenError::InvalidMember(format!("{}.{}", name, field)))?
            }
            other => {
                return Err(CodegenError::InvalidMember(format!(
                    "{} has no member `{}`",
                    other, field
                )))
            }
        };

        let struct_ty = slot.ty.to_llvm_type(self.ctx)?.into_struct_type();
        let expr_gen = ExprGenerator::new(self.ctx);
        let value = expr_gen.generate(value)?;
        let value = promote(self.ctx, value, &field_ty)?;

        let field_ptr = self
            .ctx
            .builder
            .build_struct_gep(slot.ptr, index, field)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
        self.ctx
            .builder
            .build_store(field_ptr, value.value)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
        Ok(())
    }

    fn gen_return(&mut self, value: Option<&tsl_syntax::ast::Expr>) -> CodegenResult<()> {
        match (value, self.return_type.clone()) {
            (None, DataType::Void) => {
                self.ctx
                    .builder
                    .build_return(None)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                Ok(())
            }
            (Some(_), DataType::Void) => Err(CodegenError::TypeMismatch {
                expected: DataType::Void.to_string(),
                found: "return value".to_string(),
            }),
            (None, ty) => Err(CodegenError::TypeMismatch {
                expected: ty.to_string(),
                found: DataType::Void.to_string(),
            }),
            (Some(expr), ty) => {
                let expr_gen = ExprGenerator::new(self.ctx);
                let value = expr_gen.generate(expr)?;
                let value = promote(self.ctx, value, &ty)?;
                self.ctx
                    .builder
                    .build_return(Some(&value.value))
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                Ok(())
            }
        }
    }

    /// 当前插入点所在块是否已经有终结指令
    pub fn block_ends_with_terminator(&self, block: BasicBlock<'ctx>) -> bool {
        block.get_terminator().is_some()
    }
}
