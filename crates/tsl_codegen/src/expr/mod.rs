//! Expression Code Generation
//!
//! 表达式代码生成。生成结果用 `TypedValue` 携带 TSL 类型，
//! 隐式类型提升只允许 int → float → double 方向

pub mod binary;
pub mod call;
pub mod closure;

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::types::ToLLVMType;
use inkwell::values::BasicValueEnum;
use tsl_syntax::ast::{DataType, Expr, ExprKind, Literal, UnaryOp};

/// 带 TSL 类型的 LLVM 值
#[derive(Debug, Clone)]
pub struct TypedValue<'ctx> {
    pub value: BasicValueEnum<'ctx>,
    pub ty: DataType,
}

impl<'ctx> TypedValue<'ctx> {
    /// void 调用的占位值，任何后续使用都会在类型提升处报错
    pub fn void(ctx: &CompileContext<'ctx>) -> Self {
        Self {
            value: ctx.context.i32_type().const_zero().into(),
            ty: DataType::Void,
        }
    }
}

/// 把值提升到目标类型，方向只允许变宽
pub fn promote<'ctx>(
    ctx: &CompileContext<'ctx>,
    value: TypedValue<'ctx>,
    target: &DataType,
) -> CodegenResult<TypedValue<'ctx>> {
    if value.ty == *target {
        return Ok(value);
    }

    let promoted = match (&value.ty, target) {
        (DataType::Int, DataType::Float) => ctx
            .builder
            .build_signed_int_to_float(value.value.into_int_value(), ctx.context.f32_type(), "itof")
            .map(Into::into)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?,
        (DataType::Int, DataType::Double) => ctx
            .builder
            .build_signed_int_to_float(value.value.into_int_value(), ctx.context.f64_type(), "itod")
            .map(Into::into)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?,
        (DataType::Float, DataType::Double) => ctx
            .builder
            .build_float_ext(value.value.into_float_value(), ctx.context.f64_type(), "ftod")
            .map(Into::into)
            .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?,
        _ => {
            return Err(CodegenError::TypeMismatch {
                expected: target.to_string(),
                found: value.ty.to_string(),
            })
        }
    };

    Ok(TypedValue {
        value: promoted,
        ty: target.clone(),
    })
}

/// 表达式代码生成器
pub struct ExprGenerator<'ctx, 'a> {
    pub ctx: &'a CompileContext<'ctx>,
}

impl<'ctx, 'a> ExprGenerator<'ctx, 'a> {
    /// 创建表达式生成器
    pub fn new(ctx: &'a CompileContext<'ctx>) -> Self {
        Self { ctx }
    }

    /// 生成一个表达式的值
    pub fn generate(&self, expr: &Expr) -> CodegenResult<TypedValue<'ctx>> {
        match &expr.kind {
            ExprKind::Literal(lit) => self.gen_literal(lit),
            ExprKind::Variable(name) => self.gen_variable(name),
            ExprKind::Unary(op, operand) => self.gen_unary(*op, operand),
            ExprKind::Binary(lhs, op, rhs) => binary::gen_binary(self.ctx, lhs, *op, rhs),
            ExprKind::Call { callee, args } => call::gen_call(self.ctx, callee, args),
            ExprKind::VecCtor { ty, args } => call::gen_vec_ctor(self.ctx, ty, args),
            ExprKind::Member { base, field } => self.gen_member(base, field),
            ExprKind::MakeClosure { name, args } => {
                closure::gen_make_closure(self.ctx, name, args)
            }
        }
    }

    fn gen_literal(&self, lit: &Literal) -> CodegenResult<TypedValue<'ctx>> {
        let (value, ty): (BasicValueEnum, DataType) = match lit {
            Literal::Int(x) => (
                self.ctx
                    .context
                    .i32_type()
                    .const_int(*x as i64 as u64, true)
                    .into(),
                DataType::Int,
            ),
            Literal::Float(x) => (
                self.ctx.context.f32_type().const_float(*x as f64).into(),
                DataType::Float,
            ),
            Literal::Bool(x) => (
                self.ctx
                    .context
                    .bool_type()
                    .const_int(*x as u64, false)
                    .into(),
                DataType::Bool,
            ),
        };
        Ok(TypedValue { value, ty })
    }

    fn gen_variable(&self, name: &str) -> CodegenResult<TypedValue<'ctx>> {
        if let Some(slot) = self.ctx.lookup_var(name) {
            let llvm_ty = slot.ty.to_llvm_type(self.ctx)?;
            let value = self
                .ctx
                .builder
                .build_load(slot.ptr, name)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
            return Ok(TypedValue {
                value,
                ty: slot.ty.clone(),
            });
        }

        // 局部找不到时退回全局参数
        if let Some((global, ty)) = self.ctx.global_values.get(name) {
            let llvm_ty = ty.to_llvm_type(self.ctx)?;
            let value = self
                .ctx
                .builder
                .build_load(global.as_pointer_value(), name)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
            return Ok(TypedValue {
                value,
                ty: ty.clone(),
            });
        }

        Err(CodegenError::UndefinedVariable(name.to_string()))
    }

    fn gen_unary(&self, op: UnaryOp, operand: &Expr) -> CodegenResult<TypedValue<'ctx>> {
        let value = self.generate(operand)?;
        match (op, &value.ty) {
            (UnaryOp::Neg, DataType::Int) => self
                .ctx
                .builder
                .build_int_neg(value.value.into_int_value(), "negtmp")
                .map(|v| TypedValue {
                    value: v.into(),
                    ty: DataType::Int,
                })
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string())),
            (UnaryOp::Neg, DataType::Float | DataType::Double) => self
                .ctx
                .builder
                .build_float_neg(value.value.into_float_value(), "negtmp")
                .map(|v| TypedValue {
                    value: v.into(),
                    ty: value.ty.clone(),
                })
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string())),
            (UnaryOp::Not, DataType::Bool) => self
                .ctx
                .builder
                .build_not(value.value.into_int_value(), "nottmp")
                .map(|v| TypedValue {
                    value: v.into(),
                    ty: DataType::Bool,
                })
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string())),
            // !int 按 C 语义: 等于零
            (UnaryOp::Not, DataType::Int) => self
                .ctx
                .builder
                .build_int_compare(
                    inkwell::IntPredicate::EQ,
                    value.value.into_int_value(),
                    self.ctx.context.i32_type().const_zero(),
                    "nottmp",
                )
                .map(|v| TypedValue {
                    value: v.into(),
                    ty: DataType::Bool,
                })
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string())),
            _ => Err(CodegenError::UnsupportedOperator {
                op: format!("{:?}", op),
                lhs: value.ty.to_string(),
                rhs: String::new(),
            }),
        }
    }

    fn gen_member(&self, base: &Expr, field: &str) -> CodegenResult<TypedValue<'ctx>> {
        let base_value = self.generate(base)?;
        match &base_value.ty {
            DataType::Float3 | DataType::Float4 => {
                let index = vector_component_index(field, &base_value.ty)?;
                let value = self
                    .ctx
                    .builder
                    .build_extract_value(base_value.value.into_struct_value(), index, field)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                Ok(TypedValue {
                    value,
                    ty: DataType::Float,
                })
            }
            DataType::Struct(name) => {
                let fields = self
                    .ctx
                    .struct_fields
                    .get(name)
                    .ok_or_else(|| CodegenError::UndefinedStructType(name.clone()))?;
                let (index, field_ty) = fields
                    .iter()
                    .enumerate()
                    .find(|(_, (n, _))| n.as_str() == field)
                    .map(|(i, (_, ty))| (i as u32, ty.clone()))
                    .ok_or_else(|| {
                        CodegenError::InvalidMember(format!("{}.{}", name, field))
                    })?;
                let value = self
                    .ctx
                    .builder
                    .build_extract_value(base_value.value.into_struct_value(), index, field)
                    .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
                Ok(TypedValue {
                    value,
                    ty: field_ty,
                })
            }
            other => Err(CodegenError::InvalidMember(format!(
                "{} has no member `{}`",
                other, field
            ))),
        }
    }
}

/// x/y/z/w → 分量下标，越界的分量（如 float3 的 w）报错
pub fn vector_component_index(field: &str, ty: &DataType) -> CodegenResult<u32> {
    let index = match field {
        "x" => 0,
        "y" => 1,
        "z" => 2,
        "w" => 3,
        _ => {
            return Err(CodegenError::InvalidMember(format!(
                "{} has no component `{}`",
                ty, field
            )))
        }
    };
    let width = ty.vector_width().unwrap_or(0) as u32;
    if index >= width {
        return Err(CodegenError::InvalidMember(format!(
            "{} has no component `{}`",
            ty, field
        )));
    }
    Ok(index)
}
