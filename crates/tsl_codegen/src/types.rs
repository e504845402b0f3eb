//! Type Mapping
//!
//! TSL 类型到 LLVM 类型的映射。float3/float4/matrix 解析为
//! global module 预先声明的命名结构，closure 是节点指针

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::global_module::CLOSURE_BASE_TYPE;
use inkwell::types::{BasicType, BasicTypeEnum};
use inkwell::AddressSpace;
use tsl_syntax::ast::DataType;

/// DataType 到 LLVM 类型的转换 trait
pub trait ToLLVMType<'ctx> {
    /// 转换为 LLVM BasicTypeEnum
    fn to_llvm_type(&self, context: &CompileContext<'ctx>) -> CodegenResult<BasicTypeEnum<'ctx>>;
}

impl<'ctx> ToLLVMType<'ctx> for DataType {
    fn to_llvm_type(&self, context: &CompileContext<'ctx>) -> CodegenResult<BasicTypeEnum<'ctx>> {
        match self {
            // 基础类型映射
            DataType::Int => Ok(context.context.i32_type().as_basic_type_enum()),
            DataType::Float => Ok(context.context.f32_type().as_basic_type_enum()),
            DataType::Double => Ok(context.context.f64_type().as_basic_type_enum()),
            DataType::Bool => Ok(context.context.bool_type().as_basic_type_enum()),

            // 内置聚合类型来自 global module 的命名结构
            DataType::Float3 => named_struct(context, "float3"),
            DataType::Float4 => named_struct(context, "float4"),
            DataType::Matrix => named_struct(context, "matrix"),

            // closure 按节点指针传递，节点内容对 shader 不透明
            DataType::Closure => {
                let base = context
                    .struct_types
                    .get(CLOSURE_BASE_TYPE)
                    .ok_or_else(|| CodegenError::UndefinedStructType(CLOSURE_BASE_TYPE.into()))?;
                Ok(base.ptr_type(AddressSpace::default()).as_basic_type_enum())
            }

            // shader 源码声明的 struct
            DataType::Struct(name) => context
                .struct_types
                .get(name)
                .map(|t| t.as_basic_type_enum())
                .ok_or_else(|| CodegenError::UndefinedStructType(name.clone())),

            // void 不是 basic type，调用者应该特殊处理
            DataType::Void => Err(CodegenError::UnsupportedType(
                "void is not a basic type".to_string(),
            )),
        }
    }
}

fn named_struct<'ctx>(
    context: &CompileContext<'ctx>,
    name: &str,
) -> CodegenResult<BasicTypeEnum<'ctx>> {
    context
        .struct_types
        .get(name)
        .map(|t| t.as_basic_type_enum())
        .ok_or_else(|| CodegenError::UndefinedStructType(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::global_module::declare_global_module;
    use inkwell::context::Context;

    #[test]
    fn test_scalar_mapping() {
        let context = Context::create();
        let ctx = CompileContext::new(&context, "test");

        assert!(DataType::Int.to_llvm_type(&ctx).unwrap().is_int_type());
        assert!(DataType::Float.to_llvm_type(&ctx).unwrap().is_float_type());
        assert!(DataType::Bool.to_llvm_type(&ctx).unwrap().is_int_type());
        assert!(DataType::Void.to_llvm_type(&ctx).is_err());
    }

    #[test]
    fn test_builtin_structs_need_global_module() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");

        // global module 声明之前 float3 不可用
        assert!(DataType::Float3.to_llvm_type(&ctx).is_err());

        declare_global_module(&mut ctx).unwrap();
        assert!(DataType::Float3.to_llvm_type(&ctx).unwrap().is_struct_type());
        assert!(DataType::Closure
            .to_llvm_type(&ctx)
            .unwrap()
            .is_pointer_type());
    }
}
