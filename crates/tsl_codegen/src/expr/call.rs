//! Call Code Generation
//!
//! 普通函数调用、math 运行时调用和向量构造

use inkwell::values::BasicMetadataValueEnum;
use tsl_syntax::ast::{DataType, Expr};

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::types::ToLLVMType;

use super::{promote, ExprGenerator, TypedValue};

/// 生成函数调用
///
/// 先查 shader 源码里定义的函数，再退回 math 运行时
pub fn gen_call<'ctx>(
    ctx: &CompileContext<'ctx>,
    callee: &str,
    args: &[Expr],
) -> CodegenResult<TypedValue<'ctx>> {
    if let Some((param_types, return_type)) = ctx.function_signatures.get(callee).cloned() {
        return gen_user_call(ctx, callee, &param_types, &return_type, args);
    }

    if let Some(function) = ctx.math_functions.get(callee).copied() {
        if function.count_params() as usize != args.len() {
            return Err(CodegenError::ArityMismatch(callee.to_string()));
        }
        let expr_gen = ExprGenerator::new(ctx);
        let mut call_args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
        for arg in args {
            let value = expr_gen.generate(arg)?;
            let value = promote(ctx, value, &DataType::Float)?;
            call_args.push(value.value.into());
        }
        let value = ctx
            .builder
            .build_call(function, &call_args, "mathtmp")
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| CodegenError::LLVMBuildError("math call has no value".into()))?;
        return Ok(TypedValue {
            value,
            ty: DataType::Float,
        });
    }

    Err(CodegenError::FunctionNotFound(callee.to_string()))
}

fn gen_user_call<'ctx>(
    ctx: &CompileContext<'ctx>,
    callee: &str,
    param_types: &[DataType],
    return_type: &DataType,
    args: &[Expr],
) -> CodegenResult<TypedValue<'ctx>> {
    if param_types.len() != args.len() {
        return Err(CodegenError::ArityMismatch(callee.to_string()));
    }

    let function = ctx
        .module
        .get_function(callee)
        .ok_or_else(|| CodegenError::FunctionNotFound(callee.to_string()))?;

    let expr_gen = ExprGenerator::new(ctx);
    let mut call_args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
    for (arg, param_ty) in args.iter().zip(param_types) {
        let value = expr_gen.generate(arg)?;
        let value = promote(ctx, value, param_ty)?;
        call_args.push(value.value.into());
    }

    // void 调用不能命名结果
    let call_name = if *return_type == DataType::Void {
        ""
    } else {
        "calltmp"
    };
    let call = ctx
        .builder
        .build_call(function, &call_args, call_name)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;

    match call.try_as_basic_value().left() {
        Some(value) => Ok(TypedValue {
            value,
            ty: return_type.clone(),
        }),
        None => Ok(TypedValue::void(ctx)),
    }
}

/// float3(x, y, z) / float4(x, y, z, w) 构造
pub fn gen_vec_ctor<'ctx>(
    ctx: &CompileContext<'ctx>,
    ty: &DataType,
    args: &[Expr],
) -> CodegenResult<TypedValue<'ctx>> {
    let width = ty
        .vector_width()
        .ok_or_else(|| CodegenError::UnsupportedType(ty.to_string()))?;
    if args.len() != width {
        return Err(CodegenError::ArityMismatch(ty.to_string()));
    }

    let struct_ty = ty.to_llvm_type(ctx)?.into_struct_type();
    let mut result = struct_ty.get_undef();

    let expr_gen = ExprGenerator::new(ctx);
    for (i, arg) in args.iter().enumerate() {
        let value = expr_gen.generate(arg)?;
        let value = promote(ctx, value, &DataType::Float)?;
        result = ctx
            .builder
            .build_insert_value(result, value.value, i as u32, "vecinit")
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
            .into_struct_value();
    }

    Ok(TypedValue {
        value: result.into(),
        ty: ty.clone(),
    })
}
