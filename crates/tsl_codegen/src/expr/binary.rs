//! Binary Operation Code Generation
//!
//! 二元运算代码生成：标量算术（带 int → float 提升）、比较、逻辑运算、
//! 向量的逐分量算术，以及 closure tree 的 ADD/MUL 节点构造

use inkwell::values::BasicValueEnum;
use inkwell::{FloatPredicate, IntPredicate};
use tsl_syntax::ast::{BinaryOp, DataType, Expr};

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::types::ToLLVMType;

use super::closure;
use super::{promote, ExprGenerator, TypedValue};

/// 生成二元运算代码
pub fn gen_binary<'ctx>(
    ctx: &CompileContext<'ctx>,
    left: &Expr,
    op: BinaryOp,
    right: &Expr,
) -> CodegenResult<TypedValue<'ctx>> {
    let expr_gen = ExprGenerator::new(ctx);
    let lhs = expr_gen.generate(left)?;
    let rhs = expr_gen.generate(right)?;

    // closure 运算优先分发: c + c 构造 ADD 节点, c * w / w * c 构造 MUL 节点
    match (op, &lhs.ty, &rhs.ty) {
        (BinaryOp::Add, DataType::Closure, DataType::Closure) => {
            return closure::gen_closure_add(ctx, lhs, rhs);
        }
        (BinaryOp::Mul, DataType::Closure, _) => {
            let weight = promote(ctx, rhs, &DataType::Float)?;
            return closure::gen_closure_mul(ctx, weight, lhs);
        }
        (BinaryOp::Mul, _, DataType::Closure) => {
            let weight = promote(ctx, lhs, &DataType::Float)?;
            return closure::gen_closure_mul(ctx, weight, rhs);
        }
        _ => {}
    }

    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            gen_arithmetic(ctx, op, lhs, rhs)
        }
        BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Leq
        | BinaryOp::Geq => gen_comparison(ctx, op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => gen_logical(ctx, op, lhs, rhs),
    }
}

/// 把两个数值操作数提升到公共类型 (double > float > int)
fn unify_numeric<'ctx>(
    ctx: &CompileContext<'ctx>,
    op: BinaryOp,
    lhs: TypedValue<'ctx>,
    rhs: TypedValue<'ctx>,
) -> CodegenResult<(TypedValue<'ctx>, TypedValue<'ctx>, DataType)> {
    if !lhs.ty.is_numeric() || !rhs.ty.is_numeric() {
        return Err(CodegenError::UnsupportedOperator {
            op: format!("{:?}", op),
            lhs: lhs.ty.to_string(),
            rhs: rhs.ty.to_string(),
        });
    }

    let common = if lhs.ty == DataType::Double || rhs.ty == DataType::Double {
        DataType::Double
    } else if lhs.ty == DataType::Float || rhs.ty == DataType::Float {
        DataType::Float
    } else {
        DataType::Int
    };

    let lhs = promote(ctx, lhs, &common)?;
    let rhs = promote(ctx, rhs, &common)?;
    Ok((lhs, rhs, common))
}

fn gen_arithmetic<'ctx>(
    ctx: &CompileContext<'ctx>,
    op: BinaryOp,
    lhs: TypedValue<'ctx>,
    rhs: TypedValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    // 向量逐分量运算单独处理
    if lhs.ty.vector_width().is_some() || rhs.ty.vector_width().is_some() {
        return gen_vector_arithmetic(ctx, op, lhs, rhs);
    }

    let (lhs, rhs, common) = unify_numeric(ctx, op, lhs, rhs)?;

    let value: BasicValueEnum = if common == DataType::Int {
        let l = lhs.value.into_int_value();
        let r = rhs.value.into_int_value();
        let result = match op {
            BinaryOp::Add => ctx.builder.build_int_add(l, r, "addtmp"),
            BinaryOp::Sub => ctx.builder.build_int_sub(l, r, "subtmp"),
            BinaryOp::Mul => ctx.builder.build_int_mul(l, r, "multmp"),
            BinaryOp::Div => ctx.builder.build_int_signed_div(l, r, "divtmp"),
            BinaryOp::Mod => ctx.builder.build_int_signed_rem(l, r, "modtmp"),
            _ => unreachable!(),
        };
        result
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
            .into()
    } else {
        let l = lhs.value.into_float_value();
        let r = rhs.value.into_float_value();
        let result = match op {
            BinaryOp::Add => ctx.builder.build_float_add(l, r, "addtmp"),
            BinaryOp::Sub => ctx.builder.build_float_sub(l, r, "subtmp"),
            BinaryOp::Mul => ctx.builder.build_float_mul(l, r, "multmp"),
            BinaryOp::Div => ctx.builder.build_float_div(l, r, "divtmp"),
            BinaryOp::Mod => ctx.builder.build_float_rem(l, r, "modtmp"),
            _ => unreachable!(),
        };
        result
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
            .into()
    };

    Ok(TypedValue { value, ty: common })
}

/// float3/float4 的逐分量算术，标量一侧先广播
fn gen_vector_arithmetic<'ctx>(
    ctx: &CompileContext<'ctx>,
    op: BinaryOp,
    lhs: TypedValue<'ctx>,
    rhs: TypedValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    if !matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div) {
        return Err(CodegenError::UnsupportedOperator {
            op: format!("{:?}", op),
            lhs: lhs.ty.to_string(),
            rhs: rhs.ty.to_string(),
        });
    }

    let (vec_ty, width) = if let Some(w) = lhs.ty.vector_width() {
        (lhs.ty.clone(), w as u32)
    } else {
        (rhs.ty.clone(), rhs.ty.vector_width().unwrap() as u32)
    };
    if lhs.ty.vector_width().is_some() && rhs.ty.vector_width().is_some() && lhs.ty != rhs.ty {
        return Err(CodegenError::UnsupportedOperator {
            op: format!("{:?}", op),
            lhs: lhs.ty.to_string(),
            rhs: rhs.ty.to_string(),
        });
    }

    let struct_ty = vec_ty.to_llvm_type(ctx)?.into_struct_type();
    let mut result = struct_ty.get_undef();

    for i in 0..width {
        let l = component(ctx, &lhs, i)?;
        let r = component(ctx, &rhs, i)?;
        let value = match op {
            BinaryOp::Add => ctx.builder.build_float_add(l, r, "addtmp"),
            BinaryOp::Sub => ctx.builder.build_float_sub(l, r, "subtmp"),
            BinaryOp::Mul => ctx.builder.build_float_mul(l, r, "multmp"),
            BinaryOp::Div => ctx.builder.build_float_div(l, r, "divtmp"),
            _ => unreachable!(),
        }
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
        result = ctx
            .builder
            .build_insert_value(result, value, i, "vectmp")
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
            .into_struct_value();
    }

    Ok(TypedValue {
        value: result.into(),
        ty: vec_ty,
    })
}

/// 取出向量的第 i 个分量；标量操作数提升为 float 后广播
fn component<'ctx>(
    ctx: &CompileContext<'ctx>,
    operand: &TypedValue<'ctx>,
    i: u32,
) -> CodegenResult<inkwell::values::FloatValue<'ctx>> {
    if operand.ty.vector_width().is_some() {
        ctx.builder
            .build_extract_value(operand.value.into_struct_value(), i, "comp")
            .map(|v| v.into_float_value())
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))
    } else {
        let scalar = promote(ctx, operand.clone(), &DataType::Float)?;
        Ok(scalar.value.into_float_value())
    }
}

fn gen_comparison<'ctx>(
    ctx: &CompileContext<'ctx>,
    op: BinaryOp,
    lhs: TypedValue<'ctx>,
    rhs: TypedValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    // bool 只支持相等比较
    if lhs.ty == DataType::Bool && rhs.ty == DataType::Bool {
        let predicate = match op {
            BinaryOp::Eq => IntPredicate::EQ,
            BinaryOp::Neq => IntPredicate::NE,
            _ => {
                return Err(CodegenError::UnsupportedOperator {
                    op: format!("{:?}", op),
                    lhs: lhs.ty.to_string(),
                    rhs: rhs.ty.to_string(),
                })
            }
        };
        let value = ctx
            .builder
            .build_int_compare(
                predicate,
                lhs.value.into_int_value(),
                rhs.value.into_int_value(),
                "cmptmp",
            )
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
        return Ok(TypedValue {
            value: value.into(),
            ty: DataType::Bool,
        });
    }

    let (lhs, rhs, common) = unify_numeric(ctx, op, lhs, rhs)?;

    let value = if common == DataType::Int {
        let predicate = match op {
            BinaryOp::Eq => IntPredicate::EQ,
            BinaryOp::Neq => IntPredicate::NE,
            BinaryOp::Lt => IntPredicate::SLT,
            BinaryOp::Gt => IntPredicate::SGT,
            BinaryOp::Leq => IntPredicate::SLE,
            BinaryOp::Geq => IntPredicate::SGE,
            _ => unreachable!(),
        };
        ctx.builder
            .build_int_compare(
                predicate,
                lhs.value.into_int_value(),
                rhs.value.into_int_value(),
                "cmptmp",
            )
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
    } else {
        let predicate = match op {
            BinaryOp::Eq => FloatPredicate::OEQ,
            BinaryOp::Neq => FloatPredicate::ONE,
            BinaryOp::Lt => FloatPredicate::OLT,
            BinaryOp::Gt => FloatPredicate::OGT,
            BinaryOp::Leq => FloatPredicate::OLE,
            BinaryOp::Geq => FloatPredicate::OGE,
            _ => unreachable!(),
        };
        ctx.builder
            .build_float_compare(
                predicate,
                lhs.value.into_float_value(),
                rhs.value.into_float_value(),
                "cmptmp",
            )
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
    };

    Ok(TypedValue {
        value: value.into(),
        ty: DataType::Bool,
    })
}

fn gen_logical<'ctx>(
    ctx: &CompileContext<'ctx>,
    op: BinaryOp,
    lhs: TypedValue<'ctx>,
    rhs: TypedValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    let l = to_bool(ctx, lhs)?;
    let r = to_bool(ctx, rhs)?;

    let value = match op {
        BinaryOp::And => ctx.builder.build_and(l, r, "andtmp"),
        BinaryOp::Or => ctx.builder.build_or(l, r, "ortmp"),
        _ => unreachable!(),
    }
    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    Ok(TypedValue {
        value: value.into(),
        ty: DataType::Bool,
    })
}

/// bool 原样使用，int 按 C 语义与零比较
pub fn to_bool<'ctx>(
    ctx: &CompileContext<'ctx>,
    value: TypedValue<'ctx>,
) -> CodegenResult<inkwell::values::IntValue<'ctx>> {
    match value.ty {
        DataType::Bool => Ok(value.value.into_int_value()),
        DataType::Int => ctx
            .builder
            .build_int_compare(
                IntPredicate::NE,
                value.value.into_int_value(),
                ctx.context.i32_type().const_zero(),
                "tobool",
            )
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string())),
        ref other => Err(CodegenError::TypeMismatch {
            expected: DataType::Bool.to_string(),
            found: other.to_string(),
        }),
    }
}
