//! Control Flow Code Generation
//!
//! if/else 与 while 的基本块编排，break/continue 跳转

use tsl_syntax::ast::{Expr, Stmt};

use crate::error::{CodegenError, CodegenResult};
use crate::expr::{binary, ExprGenerator};
use crate::stmt::{LoopContext, StmtGenerator};

/// 生成 if 语句
pub fn gen_if<'ctx, 'a>(
    gen: &mut StmtGenerator<'ctx, 'a>,
    condition: &Expr,
    then_block: &[Stmt],
    else_block: Option<&[Stmt]>,
) -> CodegenResult<()> {
    // 生成条件，int 条件按 C 语义与零比较
    let expr_gen = ExprGenerator::new(gen.ctx);
    let cond_value = expr_gen.generate(condition)?;
    let cond_int = binary::to_bool(gen.ctx, cond_value)?;

    // 获取当前函数
    let function = gen
        .ctx
        .builder
        .get_insert_block()
        .and_then(|bb| bb.get_parent())
        .ok_or_else(|| CodegenError::LLVMBuildError("not in a function".to_string()))?;

    // 创建基本块
    let then_bb = gen.ctx.context.append_basic_block(function, "then");
    let else_bb = gen.ctx.context.append_basic_block(function, "else");
    let merge_bb = gen.ctx.context.append_basic_block(function, "ifcont");

    // 条件跳转
    gen.ctx
        .builder
        .build_conditional_branch(cond_int, then_bb, else_bb)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    // Then 分支
    gen.ctx.builder.position_at_end(then_bb);
    gen.generate_block(then_block)?;
    let current_then = gen
        .ctx
        .builder
        .get_insert_block()
        .ok_or_else(|| CodegenError::LLVMBuildError("builder lost insert block".to_string()))?;
    if !gen.block_ends_with_terminator(current_then) {
        gen.ctx
            .builder
            .build_unconditional_branch(merge_bb)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
    }

    // Else 分支
    gen.ctx.builder.position_at_end(else_bb);
    if let Some(else_stmts) = else_block {
        gen.generate_block(else_stmts)?;
    }
    let current_else = gen
        .ctx
        .builder
        .get_insert_block()
        .ok_or_else(|| CodegenError::LLVMBuildError("builder lost insert block".to_string()))?;
    if !gen.block_ends_with_terminator(current_else) {
        gen.ctx
            .builder
            .build_unconditional_branch(merge_bb)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
    }

    // 合并点
    gen.ctx.builder.position_at_end(merge_bb);

    Ok(())
}

/// 生成 while 循环
pub fn gen_while<'ctx, 'a>(
    gen: &mut StmtGenerator<'ctx, 'a>,
    condition: &Expr,
    body: &[Stmt],
) -> CodegenResult<()> {
    let function = gen
        .ctx
        .builder
        .get_insert_block()
        .and_then(|bb| bb.get_parent())
        .ok_or_else(|| CodegenError::LLVMBuildError("not in a function".to_string()))?;

    let cond_bb = gen.ctx.context.append_basic_block(function, "while.cond");
    let body_bb = gen.ctx.context.append_basic_block(function, "while.body");
    let after_bb = gen.ctx.context.append_basic_block(function, "while.end");

    // 跳转到条件块
    gen.ctx
        .builder
        .build_unconditional_branch(cond_bb)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    // 条件块
    gen.ctx.builder.position_at_end(cond_bb);
    let expr_gen = ExprGenerator::new(gen.ctx);
    let cond_value = expr_gen.generate(condition)?;
    let cond_int = binary::to_bool(gen.ctx, cond_value)?;
    gen.ctx
        .builder
        .build_conditional_branch(cond_int, body_bb, after_bb)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    // 循环体
    gen.ctx.builder.position_at_end(body_bb);

    gen.loop_stack.push(LoopContext {
        continue_block: cond_bb,
        break_block: after_bb,
    });

    let body_result = gen.generate_block(body);

    gen.loop_stack.pop();
    body_result?;

    let current_body = gen
        .ctx
        .builder
        .get_insert_block()
        .ok_or_else(|| CodegenError::LLVMBuildError("builder lost insert block".to_string()))?;
    if !gen.block_ends_with_terminator(current_body) {
        gen.ctx
            .builder
            .build_unconditional_branch(cond_bb)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
    }

    // 循环后
    gen.ctx.builder.position_at_end(after_bb);

    Ok(())
}

/// 生成 break 语句
pub fn gen_break(gen: &mut StmtGenerator) -> CodegenResult<()> {
    let context = gen.loop_stack.last().ok_or(CodegenError::OutsideLoop)?;

    gen.ctx
        .builder
        .build_unconditional_branch(context.break_block)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    Ok(())
}

/// 生成 continue 语句
pub fn gen_continue(gen: &mut StmtGenerator) -> CodegenResult<()> {
    let context = gen.loop_stack.last().ok_or(CodegenError::OutsideLoop)?;

    gen.ctx
        .builder
        .build_unconditional_branch(context.continue_block)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    Ok(())
}
