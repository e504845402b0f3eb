//! Closure Code Generation
//!
//! make_closure 调用和 closure tree 节点构造。ADD/MUL 节点通过宿主
//! 分配器 `allocate_closure` 在运行期搭建，尺寸直接取自宿主侧
//! `#[repr(C)]` 定义，保证两侧布局一致

use inkwell::values::{BasicMetadataValueEnum, PointerValue};
use inkwell::AddressSpace;
use std::mem::size_of;
use tsl_runtime::{ClosureTreeNodeAdd, ClosureTreeNodeMul, CLOSURE_ADD, CLOSURE_MUL};
use tsl_syntax::ast::{DataType, Expr};

use crate::context::CompileContext;
use crate::error::{CodegenError, CodegenResult};
use crate::global_module::{closure_ptr_type, CLOSURE_ADD_TYPE, CLOSURE_ALLOC_FN, CLOSURE_MUL_TYPE};
use crate::types::ToLLVMType;

use super::{promote, ExprGenerator, TypedValue};

/// 生成 make_closure<Name>(args...) 调用
///
/// 构造函数必须在编译开始时按 touched closure 预先声明过
pub fn gen_make_closure<'ctx>(
    ctx: &CompileContext<'ctx>,
    name: &str,
    args: &[Expr],
) -> CodegenResult<TypedValue<'ctx>> {
    let function = ctx
        .closure_functions
        .get(name)
        .copied()
        .ok_or_else(|| CodegenError::UnregisteredClosure(name.to_string()))?;
    let fields = ctx
        .closure_signatures
        .get(name)
        .cloned()
        .ok_or_else(|| CodegenError::UnregisteredClosure(name.to_string()))?;

    if fields.len() != args.len() {
        return Err(CodegenError::ArityMismatch(format!(
            "make_closure<{}>",
            name
        )));
    }

    let expr_gen = ExprGenerator::new(ctx);
    let mut call_args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
    for (arg, (field_name, field_ty)) in args.iter().zip(&fields) {
        let value = expr_gen.generate(arg)?;
        let value = promote(ctx, value, field_ty)?;
        if field_ty.is_aggregate() {
            // 聚合字段按指针传递，先落到栈槽
            let llvm_ty = field_ty.to_llvm_type(ctx)?;
            let slot = ctx
                .builder
                .build_alloca(llvm_ty, field_name)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
            ctx.builder
                .build_store(slot, value.value)
                .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
            call_args.push(slot.into());
        } else {
            call_args.push(value.value.into());
        }
    }

    let value = ctx
        .builder
        .build_call(function, &call_args, "closuretmp")
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
        .try_as_basic_value()
        .left()
        .ok_or_else(|| {
            CodegenError::LLVMBuildError("closure constructor returned void".into())
        })?;

    Ok(TypedValue {
        value,
        ty: DataType::Closure,
    })
}

/// closure + closure：分配一个 ADD 节点挂住两棵子树
pub fn gen_closure_add<'ctx>(
    ctx: &CompileContext<'ctx>,
    lhs: TypedValue<'ctx>,
    rhs: TypedValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    let node = allocate_node(ctx, CLOSURE_ADD_TYPE, size_of::<ClosureTreeNodeAdd>())?;
    let node_ty = ctx.struct_types[CLOSURE_ADD_TYPE];

    store_field(ctx, node_ty, node, 0, closure_id(ctx, CLOSURE_ADD))?;
    store_field(ctx, node_ty, node, 1, lhs.value)?;
    store_field(ctx, node_ty, node, 2, rhs.value)?;

    as_closure(ctx, node)
}

/// weight * closure：分配一个 MUL 节点
pub fn gen_closure_mul<'ctx>(
    ctx: &CompileContext<'ctx>,
    weight: TypedValue<'ctx>,
    child: TypedValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    let node = allocate_node(ctx, CLOSURE_MUL_TYPE, size_of::<ClosureTreeNodeMul>())?;
    let node_ty = ctx.struct_types[CLOSURE_MUL_TYPE];

    store_field(ctx, node_ty, node, 0, closure_id(ctx, CLOSURE_MUL))?;
    store_field(ctx, node_ty, node, 1, weight.value)?;
    store_field(ctx, node_ty, node, 2, child.value)?;

    as_closure(ctx, node)
}

/// 调用 allocate_closure 并把结果指针转成节点类型
fn allocate_node<'ctx>(
    ctx: &CompileContext<'ctx>,
    node_type: &str,
    size: usize,
) -> CodegenResult<PointerValue<'ctx>> {
    let alloc = ctx
        .module
        .get_function(CLOSURE_ALLOC_FN)
        .ok_or_else(|| CodegenError::FunctionNotFound(CLOSURE_ALLOC_FN.to_string()))?;

    let size = ctx.context.i32_type().const_int(size as u64, false);
    let raw = ctx
        .builder
        .build_call(alloc, &[size.into()], "nodemem")
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?
        .try_as_basic_value()
        .left()
        .ok_or_else(|| CodegenError::LLVMBuildError("allocator returned void".into()))?
        .into_pointer_value();

    let node_struct = ctx.struct_types[node_type];
    ctx.builder
        .build_pointer_cast(
            raw,
            node_struct.ptr_type(AddressSpace::default()),
            "node",
        )
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))
}

fn store_field<'ctx>(
    ctx: &CompileContext<'ctx>,
    node_ty: inkwell::types::StructType<'ctx>,
    node: PointerValue<'ctx>,
    index: u32,
    value: impl inkwell::values::BasicValue<'ctx>,
) -> CodegenResult<()> {
    let field = ctx
        .builder
        .build_struct_gep(node, index, "field")
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
    ctx.builder
        .build_store(field, value)
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
    Ok(())
}

fn closure_id<'ctx>(
    ctx: &CompileContext<'ctx>,
    id: i32,
) -> inkwell::values::IntValue<'ctx> {
    ctx.context.i32_type().const_int(id as i64 as u64, true)
}

fn as_closure<'ctx>(
    ctx: &CompileContext<'ctx>,
    node: PointerValue<'ctx>,
) -> CodegenResult<TypedValue<'ctx>> {
    let base_ptr = ctx
        .builder
        .build_pointer_cast(node, closure_ptr_type(ctx)?, "closure")
        .map_err(|e| CodegenError::LLVMBuildError(e.to_string()))?;
    Ok(TypedValue {
        value: base_ptr.into(),
        ty: DataType::Closure,
    })
}
