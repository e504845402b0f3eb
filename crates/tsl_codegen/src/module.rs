//! Module-Level Code Generation
//!
//! struct 声明注册与全局 shader 参数的生成。
//! 编译顺序由 driver 控制：先全局参数与 struct，再函数，最后 shader 根

use inkwell::module::Linkage;
use inkwell::types::BasicTypeEnum;
use inkwell::values::BasicValueEnum;
use tsl_syntax::ast::{DataType, Literal};

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::types::ToLLVMType;

/// 注册一个 shader struct：创建命名结构并记录字段布局
pub fn register_structure(
    ctx: &mut CompileContext,
    name: &str,
    fields: &[(String, DataType)],
) -> CodegenResult<()> {
    if ctx.struct_types.contains_key(name) {
        return Err(CodegenError::DuplicateDefinition(name.to_string()));
    }

    let struct_ty = ctx.context.opaque_struct_type(name);
    let mut body: Vec<BasicTypeEnum> = Vec::with_capacity(fields.len());

    // 先插入占位，允许字段引用本类型之外的已注册 struct
    ctx.struct_types.insert(name.to_string(), struct_ty);
    for (_, field_ty) in fields {
        match field_ty.to_llvm_type(ctx) {
            Ok(llvm_ty) => body.push(llvm_ty),
            Err(e) => {
                ctx.struct_types.remove(name);
                return Err(e);
            }
        }
    }
    struct_ty.set_body(&body, false);

    ctx.struct_fields.insert(name.to_string(), fields.to_vec());
    Ok(())
}

/// 生成一个全局 shader 参数（内部链接的只读全局量）
pub fn define_global_parameter(
    ctx: &mut CompileContext,
    name: &str,
    ty: &DataType,
    init: &Literal,
) -> CodegenResult<()> {
    if ctx.global_values.contains_key(name) {
        return Err(CodegenError::DuplicateDefinition(name.to_string()));
    }

    let llvm_ty = ty.to_llvm_type(ctx)?;
    let initializer = const_literal(ctx, init, ty)?;

    let global = ctx.module.add_global(llvm_ty, None, name);
    global.set_initializer(&initializer);
    global.set_linkage(Linkage::Internal);
    global.set_constant(true);

    ctx.global_values
        .insert(name.to_string(), (global, ty.clone()));
    Ok(())
}

/// 把字面量物化为目标类型的常量，int 字面量允许提升为 float/double
pub fn const_literal<'ctx>(
    ctx: &CompileContext<'ctx>,
    lit: &Literal,
    ty: &DataType,
) -> CodegenResult<BasicValueEnum<'ctx>> {
    let value: BasicValueEnum = match (lit, ty) {
        (Literal::Int(x), DataType::Int) => ctx
            .context
            .i32_type()
            .const_int(*x as i64 as u64, true)
            .into(),
        (Literal::Int(x), DataType::Float) => {
            ctx.context.f32_type().const_float(*x as f64).into()
        }
        (Literal::Int(x), DataType::Double) => {
            ctx.context.f64_type().const_float(*x as f64).into()
        }
        (Literal::Float(x), DataType::Float) => {
            ctx.context.f32_type().const_float(*x as f64).into()
        }
        (Literal::Float(x), DataType::Double) => {
            ctx.context.f64_type().const_float(*x as f64).into()
        }
        (Literal::Bool(x), DataType::Bool) => ctx
            .context
            .bool_type()
            .const_int(*x as u64, false)
            .into(),
        (lit, ty) => {
            return Err(CodegenError::TypeMismatch {
                expected: ty.to_string(),
                found: format!("{:?}", lit),
            })
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_module::declare_global_module;
    use inkwell::context::Context;

    #[test]
    fn test_register_structure() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        let fields = vec![
            ("albedo".to_string(), DataType::Float3),
            ("roughness".to_string(), DataType::Float),
        ];
        register_structure(&mut ctx, "Material", &fields).unwrap();

        assert!(ctx.struct_types.contains_key("Material"));
        assert_eq!(ctx.struct_fields["Material"].len(), 2);

        // 重复注册报错
        assert!(matches!(
            register_structure(&mut ctx, "Material", &fields),
            Err(CodegenError::DuplicateDefinition(_))
        ));
    }

    #[test]
    fn test_global_parameter() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        define_global_parameter(&mut ctx, "scale", &DataType::Float, &Literal::Float(2.0))
            .unwrap();
        assert!(ctx.global_values.contains_key("scale"));

        let ir = ctx.print_to_string();
        assert!(ir.contains("@scale"));
        assert!(ir.contains("internal"));
    }

    #[test]
    fn test_const_literal_promotion() {
        let context = Context::create();
        let ctx = CompileContext::new(&context, "test");

        // int 字面量可以初始化 float 参数
        assert!(const_literal(&ctx, &Literal::Int(3), &DataType::Float).is_ok());
        // bool 不能初始化 float
        assert!(const_literal(&ctx, &Literal::Bool(true), &DataType::Float).is_err());
    }
}
