//! Global Module
//!
//! 每个 shader 模块共享的 IR 声明：closure tree 节点结构（布局与
//! 宿主 ABI 逐字节一致）、内置向量/矩阵结构、不透明的 tsl_global
//! 上下文、closure 分配器和 math 运行时原型。全部物化进调用方提供
//! 的 compile context，并登记到名字 → 类型映射

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::types::ToLLVMType;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, PointerType, StructType};
use inkwell::values::FunctionValue;
use inkwell::AddressSpace;
use tsl_syntax::ast::DataType;

pub const CLOSURE_BASE_TYPE: &str = "closure_base";
pub const CLOSURE_ADD_TYPE: &str = "closure_add";
pub const CLOSURE_MUL_TYPE: &str = "closure_mul";
pub const FLOAT3_TYPE: &str = "float3";
pub const FLOAT4_TYPE: &str = "float4";
pub const MATRIX_TYPE: &str = "matrix";
pub const TSL_GLOBAL_TYPE: &str = "tsl_global";

/// 宿主提供的 closure 分配器
pub const CLOSURE_ALLOC_FN: &str = "allocate_closure";
/// closure 构造函数的符号前缀
pub const MAKE_CLOSURE_PREFIX: &str = "make_closure_";

/// math 运行时原型: (shader 可见名, 宿主符号名, 参数个数)
pub const MATH_FUNCTIONS: &[(&str, &str, u32)] = &[
    ("sin", "tsl_sin", 1),
    ("cos", "tsl_cos", 1),
    ("tan", "tsl_tan", 1),
    ("sqrt", "tsl_sqrt", 1),
    ("pow", "tsl_pow", 2),
    ("abs", "tsl_abs", 1),
    ("floor", "tsl_floor", 1),
];

/// 在 compile context 中物化全局声明，每次编译调用一次
pub fn declare_global_module(ctx: &mut CompileContext) -> CodegenResult<()> {
    declare_closure_tree_types(ctx);
    declare_builtin_types(ctx);
    declare_global_functions(ctx)?;
    Ok(())
}

/// closure tree 节点结构，布局必须与 tsl_runtime::closure 一致
fn declare_closure_tree_types(ctx: &mut CompileContext) {
    let i32_ty = ctx.context.i32_type();
    let f32_ty = ctx.context.f32_type();

    let base = named_struct(ctx, CLOSURE_BASE_TYPE);
    if base.is_opaque() {
        base.set_body(&[i32_ty.into()], false);
    }
    let base_ptr = base.ptr_type(AddressSpace::default());

    let add = named_struct(ctx, CLOSURE_ADD_TYPE);
    if add.is_opaque() {
        // i32 之后的 4 字节 padding 由目标布局的指针对齐产生
        add.set_body(&[i32_ty.into(), base_ptr.into(), base_ptr.into()], false);
    }

    let mul = named_struct(ctx, CLOSURE_MUL_TYPE);
    if mul.is_opaque() {
        mul.set_body(&[i32_ty.into(), f32_ty.into(), base_ptr.into()], false);
    }

    ctx.struct_types.insert(CLOSURE_BASE_TYPE.to_string(), base);
    ctx.struct_types.insert(CLOSURE_ADD_TYPE.to_string(), add);
    ctx.struct_types.insert(CLOSURE_MUL_TYPE.to_string(), mul);
}

/// 内置向量/矩阵结构和不透明的 tsl_global
fn declare_builtin_types(ctx: &mut CompileContext) {
    let f32_ty = ctx.context.f32_type();

    let float3 = named_struct(ctx, FLOAT3_TYPE);
    if float3.is_opaque() {
        float3.set_body(&[f32_ty.into(), f32_ty.into(), f32_ty.into()], false);
    }

    let float4 = named_struct(ctx, FLOAT4_TYPE);
    if float4.is_opaque() {
        float4.set_body(
            &[f32_ty.into(), f32_ty.into(), f32_ty.into(), f32_ty.into()],
            false,
        );
    }

    let matrix = named_struct(ctx, MATRIX_TYPE);
    if matrix.is_opaque() {
        matrix.set_body(&[f32_ty.array_type(16).into()], false);
    }

    // 内容由宿主定义，shader 只持有指针
    let tsl_global = named_struct(ctx, TSL_GLOBAL_TYPE);

    ctx.struct_types.insert(FLOAT3_TYPE.to_string(), float3);
    ctx.struct_types.insert(FLOAT4_TYPE.to_string(), float4);
    ctx.struct_types.insert(MATRIX_TYPE.to_string(), matrix);
    ctx.struct_types
        .insert(TSL_GLOBAL_TYPE.to_string(), tsl_global);
}

/// closure 分配器和 math 库的外部原型
fn declare_global_functions(ctx: &mut CompileContext) -> CodegenResult<()> {
    let f32_ty = ctx.context.f32_type();
    let i8_ptr = ctx.context.i8_type().ptr_type(AddressSpace::default());

    if ctx.module.get_function(CLOSURE_ALLOC_FN).is_none() {
        let alloc_ty = i8_ptr.fn_type(&[ctx.context.i32_type().into()], false);
        ctx.module.add_function(CLOSURE_ALLOC_FN, alloc_ty, None);
    }

    for (shader_name, symbol, arity) in MATH_FUNCTIONS {
        let function = match ctx.module.get_function(symbol) {
            Some(function) => function,
            None => {
                let params: Vec<BasicMetadataTypeEnum> =
                    (0..*arity).map(|_| f32_ty.into()).collect();
                let fn_ty = f32_ty.fn_type(&params, false);
                ctx.module.add_function(symbol, fn_ty, None)
            }
        };
        ctx.math_functions.insert(shader_name.to_string(), function);
    }
    Ok(())
}

/// 声明一个已注册 closure 的构造函数原型
///
/// `make_closure_<name>(fields...) -> closure_base*`，函数体由宿主提供。
/// 聚合字段按指针传递，与 shader ABI 一致
pub fn declare_closure_function<'ctx>(
    ctx: &mut CompileContext<'ctx>,
    name: &str,
    fields: &[(String, DataType)],
) -> CodegenResult<FunctionValue<'ctx>> {
    let symbol = format!("{}{}", MAKE_CLOSURE_PREFIX, name);
    if let Some(existing) = ctx.module.get_function(&symbol) {
        return Ok(existing);
    }

    let mut params: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(fields.len());
    for (_, ty) in fields {
        let llvm_ty = ty.to_llvm_type(ctx)?;
        if ty.is_aggregate() {
            params.push(llvm_ty.ptr_type(AddressSpace::default()).into());
        } else {
            params.push(llvm_ty.into());
        }
    }

    let ret = closure_ptr_type(ctx)?;
    let fn_ty = ret.fn_type(&params, false);
    let function = ctx.module.add_function(&symbol, fn_ty, None);

    ctx.closure_functions
        .insert(name.to_string(), function);
    ctx.closure_signatures
        .insert(name.to_string(), fields.to_vec());
    Ok(function)
}

/// closure 节点指针类型 (%closure_base*)
pub fn closure_ptr_type<'ctx>(ctx: &CompileContext<'ctx>) -> CodegenResult<PointerType<'ctx>> {
    ctx.struct_types
        .get(CLOSURE_BASE_TYPE)
        .map(|t| t.ptr_type(AddressSpace::default()))
        .ok_or_else(|| CodegenError::UndefinedStructType(CLOSURE_BASE_TYPE.to_string()))
}

/// tsl_global 指针类型，每个 shader 函数的隐式末参数
pub fn tsl_global_ptr_type<'ctx>(ctx: &CompileContext<'ctx>) -> CodegenResult<PointerType<'ctx>> {
    ctx.struct_types
        .get(TSL_GLOBAL_TYPE)
        .map(|t| t.ptr_type(AddressSpace::default()))
        .ok_or_else(|| CodegenError::UndefinedStructType(TSL_GLOBAL_TYPE.to_string()))
}

fn named_struct<'ctx>(ctx: &CompileContext<'ctx>, name: &str) -> StructType<'ctx> {
    ctx.module
        .get_struct_type(name)
        .unwrap_or_else(|| ctx.context.opaque_struct_type(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;

    #[test]
    fn test_declare_global_module() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        assert!(ctx.struct_types.contains_key(CLOSURE_BASE_TYPE));
        assert!(ctx.struct_types.contains_key(CLOSURE_ADD_TYPE));
        assert!(ctx.struct_types.contains_key(CLOSURE_MUL_TYPE));
        assert!(ctx.struct_types.contains_key(FLOAT3_TYPE));
        assert!(ctx.module.get_function(CLOSURE_ALLOC_FN).is_some());
        assert!(ctx.math_functions.contains_key("sin"));

        // tsl_global 保持不透明
        assert!(ctx.struct_types[TSL_GLOBAL_TYPE].is_opaque());
    }

    #[test]
    fn test_closure_node_layout() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        let add = ctx.struct_types[CLOSURE_ADD_TYPE];
        assert_eq!(add.count_fields(), 3);
        let mul = ctx.struct_types[CLOSURE_MUL_TYPE];
        assert_eq!(mul.count_fields(), 3);
        assert!(mul.get_field_type_at_index(1).unwrap().is_float_type());
    }

    #[test]
    fn test_declare_closure_function_idempotent() {
        let context = Context::create();
        let mut ctx = CompileContext::new(&context, "test");
        declare_global_module(&mut ctx).unwrap();

        let fields = vec![("base_color".to_string(), DataType::Float3)];
        let f1 = declare_closure_function(&mut ctx, "Lambert", &fields).unwrap();
        let f2 = declare_closure_function(&mut ctx, "Lambert", &fields).unwrap();
        assert_eq!(f1, f2);
        assert!(ctx.module.get_function("make_closure_Lambert").is_some());
        // 聚合字段按指针传递
        assert_eq!(f1.count_params(), 1);
        assert!(f1.get_nth_param(0).unwrap().is_pointer_value());
    }
}
