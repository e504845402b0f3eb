//! Shader Group Linker
//!
//! 把 shader group 降级为单个 wrapper 函数：为每个不同的 unit 模板
//! 声明外部原型，按依赖优先的 DFS 顺序逐实例发射调用，参数按
//! 连接 → 暴露 → 默认值的次序装配。产物是一个普通的
//! ShaderUnitTemplate，走统一的 resolve 路径

use crate::error::{TslError, TslResult};
use crate::shader_group::ShaderGroupTemplate;
use crate::shader_unit::{ShaderArgument, ShaderUnitTemplate, ShaderValue};
use inkwell::context::Context;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, FunctionValue, PointerValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use tsl_codegen::function::{declare_shader_function, shader_fn_type};
use tsl_codegen::global_module::declare_global_module;
use tsl_codegen::{CompileContext, ModuleBuffer, ToLLVMType};
use tsl_syntax::ast::{DataType, Decl};

/// 链接一个 shader group，生成 wrapper 模板
pub(crate) fn link_shader_group(
    group: &ShaderGroupTemplate,
    closure_module: ModuleBuffer,
) -> TslResult<Arc<ShaderUnitTemplate>> {
    if group.root_instance_name.is_empty() {
        return Err(TslError::ShaderGroupWithoutRoot);
    }
    if !group.units.contains_key(&group.root_instance_name) {
        return Err(TslError::ShaderGroupWithoutRoot);
    }

    let context = Context::create();
    let mut ctx = CompileContext::new(&context, group.name());
    declare_global_module(&mut ctx).map_err(build_err)?;

    // 每个不同的模板声明一个原型；同一模板多实例共用，
    // 不同模板撞根函数名说明 group 配置非法
    let mut declared: HashMap<String, *const ShaderUnitTemplate> = HashMap::new();
    let mut prototypes: HashMap<String, FunctionValue> = HashMap::new();
    let mut instances: Vec<_> = group.units.iter().collect();
    instances.sort_by(|a, b| a.0.cmp(b.0));
    for &(instance, template) in &instances {
        let root_name = template.root_function_name();
        if root_name.is_empty() {
            return Err(TslError::InvalidShaderGroupTemplate);
        }
        let identity = Arc::as_ptr(template);
        if let Some(previous) = declared.get(root_name) {
            if *previous != identity {
                return Err(TslError::InvalidShaderGroupTemplate);
            }
        } else {
            declared.insert(root_name.to_string(), identity);
        }

        let args = prototype_args(template);
        let function = declare_shader_function(&ctx, root_name, &args).map_err(build_err)?;
        prototypes.insert(instance.clone(), function);
    }

    // wrapper 签名：暴露参数按 group 下标排序，尾随 tsl_global*
    let (wrapper_args, positions) = collect_group_args(group)?;
    let wrapper_name = format!("{}_shader_wrapper", group.name());
    let wrapper_ty = shader_fn_type(&ctx, &wrapper_args).map_err(build_err)?;
    let wrapper = ctx.module.add_function(&wrapper_name, wrapper_ty, None);

    let entry = ctx.context.append_basic_block(wrapper, "entry");
    ctx.builder.position_at_end(entry);

    let env = LinkEnv {
        ctx: &ctx,
        group,
        wrapper,
        prototypes: &prototypes,
        positions: &positions,
    };
    let mut traversal = Traversal {
        visited: HashSet::new(),
        being_visited: HashSet::new(),
        var_mapping: HashMap::new(),
    };
    generate_instance(&env, &mut traversal, &group.root_instance_name)?;

    // 暴露输出必须落在根可达的实例上，否则槽位永远不会被写入
    for instance in group.exposed_outputs.keys() {
        if !traversal.visited.contains(instance) {
            return Err(TslError::InvalidShaderGroupTemplate);
        }
    }

    ctx.builder.build_return(None).map_err(build_err)?;
    ctx.verify().map_err(build_err)?;

    debug!(
        group = group.name(),
        instances = traversal.visited.len(),
        "generated shader group wrapper"
    );

    // 依赖集合：closure module 加每个成员 unit 的模块
    let mut dependencies = vec![closure_module];
    for &(_, template) in &instances {
        dependencies.push(template.module().clone());
    }

    let exposed = group_exposed_arguments(group, &positions, &wrapper_args);
    let module = ModuleBuffer::from_module(&ctx.module);

    info!(group = group.name(), wrapper = %wrapper_name, "linked shader group");

    Ok(Arc::new(ShaderUnitTemplate::new(
        group.name().to_string(),
        module,
        wrapper_name,
        exposed,
        dependencies,
        None,
        group.options.clone(),
    )))
}

/// 声明原型用的参数表；模板保留的 AST 根是权威来源，
/// group wrapper 做成员时退回暴露参数表
fn prototype_args(template: &ShaderUnitTemplate) -> Vec<(DataType, bool)> {
    match template.ast_root() {
        Some(Decl::Function { params, .. }) => params
            .iter()
            .map(|p| (p.ty.clone(), p.is_output))
            .collect(),
        _ => template
            .exposed_arguments()
            .iter()
            .map(|a| (a.ty.clone(), a.is_output))
            .collect(),
    }
}

struct LinkEnv<'ctx, 'a> {
    ctx: &'a CompileContext<'ctx>,
    group: &'a ShaderGroupTemplate,
    wrapper: FunctionValue<'ctx>,
    prototypes: &'a HashMap<String, FunctionValue<'ctx>>,
    positions: &'a HashMap<(String, String), u32>,
}

struct Traversal<'ctx> {
    visited: HashSet<String>,
    being_visited: HashSet<String>,
    /// 实例 → out 参数 → 栈槽，后继实例从这里读取输入
    var_mapping: HashMap<String, HashMap<String, PointerValue<'ctx>>>,
}

/// 依赖优先地生成一个实例的调用
fn generate_instance<'ctx>(
    env: &LinkEnv<'ctx, '_>,
    traversal: &mut Traversal<'ctx>,
    instance: &str,
) -> TslResult<()> {
    // 正在访问的节点再次出现说明连接图有环
    if traversal.being_visited.contains(instance) {
        return Err(TslError::ShaderGroupWithCycles);
    }
    if traversal.visited.contains(instance) {
        return Ok(());
    }

    let group = env.group;
    let template = group
        .units
        .get(instance)
        .ok_or_else(|| TslError::UndefinedShaderUnit(instance.to_string()))?;

    traversal.being_visited.insert(instance.to_string());
    traversal.visited.insert(instance.to_string());

    // 先生成所有依赖实例
    if let Some(connections) = group.connections.get(instance) {
        let mut sources: Vec<&String> = connections.values().map(|(src, _)| src).collect();
        sources.sort();
        sources.dedup();
        for source in sources {
            if !group.units.contains_key(source) {
                return Err(TslError::UndefinedShaderUnit(source.clone()));
            }
            generate_instance(env, traversal, source)?;
        }
    }

    // 装配参数并发射调用
    let ctx = env.ctx;
    let mut call_args: Vec<BasicMetadataValueEnum> = Vec::new();
    for arg in template.exposed_arguments() {
        if arg.is_output {
            call_args.push(assemble_output(env, traversal, instance, arg)?);
        } else {
            call_args.push(assemble_input(env, traversal, instance, arg)?);
        }
    }
    let tsl_global = env
        .wrapper
        .get_last_param()
        .ok_or(TslError::InvalidShaderGroupTemplate)?;
    call_args.push(tsl_global.into());

    let function = env
        .prototypes
        .get(instance)
        .ok_or_else(|| TslError::UndefinedShaderUnit(instance.to_string()))?;
    ctx.builder
        .build_call(*function, &call_args, "")
        .map_err(build_err)?;

    traversal.being_visited.remove(instance);
    Ok(())
}

/// 输入参数：连接 → 暴露的 group 输入 → 默认值，否则报错
fn assemble_input<'ctx>(
    env: &LinkEnv<'ctx, '_>,
    traversal: &Traversal<'ctx>,
    instance: &str,
    arg: &ShaderArgument,
) -> TslResult<BasicMetadataValueEnum<'ctx>> {
    let ctx = env.ctx;
    let group = env.group;

    // 1. 来自其他实例输出的连接
    if let Some((src_inst, src_arg)) = group
        .connections
        .get(instance)
        .and_then(|m| m.get(&arg.name))
    {
        let src_template = group
            .units
            .get(src_inst)
            .ok_or_else(|| TslError::UndefinedShaderUnit(src_inst.clone()))?;
        let src_def = src_template
            .exposed_arguments()
            .iter()
            .find(|a| a.name == *src_arg)
            .ok_or(TslError::InvalidArgType)?;
        if !src_def.is_output || src_def.ty != arg.ty {
            return Err(TslError::InvalidArgType);
        }

        let slot = traversal
            .var_mapping
            .get(src_inst)
            .and_then(|m| m.get(src_arg))
            .copied()
            .ok_or(TslError::InvalidShaderGroupTemplate)?;

        if arg.ty.is_aggregate() {
            // 聚合输入按指针传递，callee 自己拷贝
            return Ok(slot.into());
        }
        let llvm_ty = arg.ty.to_llvm_type(ctx).map_err(build_err)?;
        let loaded = ctx
            .builder
            .build_load(slot, &arg.name)
            .map_err(build_err)?;
        return Ok(loaded.into());
    }

    // 2. 暴露为 group 输入的参数直接转发 wrapper 形参
    if group
        .exposed_inputs
        .get(instance)
        .and_then(|m| m.get(&arg.name))
        .is_some()
    {
        let position = env.positions[&(instance.to_string(), arg.name.clone())];
        let param = env
            .wrapper
            .get_nth_param(position)
            .ok_or(TslError::InvalidShaderGroupTemplate)?;
        return Ok(param.into());
    }

    // 3. group 提供的默认字面量
    if let Some(value) = group
        .input_defaults
        .get(instance)
        .and_then(|m| m.get(&arg.name))
    {
        let constant = const_shader_value(ctx, value, &arg.ty)?;
        if arg.ty.is_aggregate() {
            let llvm_ty = arg.ty.to_llvm_type(ctx).map_err(build_err)?;
            let slot = ctx
                .builder
                .build_alloca(llvm_ty, &arg.name)
                .map_err(build_err)?;
            ctx.builder.build_store(slot, constant).map_err(build_err)?;
            return Ok(slot.into());
        }
        return Ok(constant.into());
    }

    Err(TslError::ArgumentWithoutInitialization {
        group: group.name().to_string(),
        instance: instance.to_string(),
        argument: arg.name.clone(),
    })
}

/// 输出参数：暴露的转发 wrapper 指针，其余分配栈槽供后继读取
fn assemble_output<'ctx>(
    env: &LinkEnv<'ctx, '_>,
    traversal: &mut Traversal<'ctx>,
    instance: &str,
    arg: &ShaderArgument,
) -> TslResult<BasicMetadataValueEnum<'ctx>> {
    let ctx = env.ctx;

    let slot = if env
        .group
        .exposed_outputs
        .get(instance)
        .and_then(|m| m.get(&arg.name))
        .is_some()
    {
        let position = env.positions[&(instance.to_string(), arg.name.clone())];
        env.wrapper
            .get_nth_param(position)
            .ok_or(TslError::InvalidShaderGroupTemplate)?
            .into_pointer_value()
    } else {
        let llvm_ty = arg.ty.to_llvm_type(ctx).map_err(build_err)?;
        ctx.builder
            .build_alloca(llvm_ty, &format!("{}_{}", instance, arg.name))
            .map_err(build_err)?
    };

    traversal
        .var_mapping
        .entry(instance.to_string())
        .or_default()
        .insert(arg.name.clone(), slot);
    Ok(slot.into())
}

/// 收集 group 的暴露参数，按下标排序并校验
fn collect_group_args(
    group: &ShaderGroupTemplate,
) -> TslResult<(Vec<(DataType, bool)>, HashMap<(String, String), u32>)> {
    let mut by_index: BTreeMap<usize, (String, String, DataType, bool)> = BTreeMap::new();

    let exposures = [
        (&group.exposed_inputs, false),
        (&group.exposed_outputs, true),
    ];
    for (table, expect_output) in exposures {
        for (instance, args) in table {
            let template = group
                .units
                .get(instance)
                .ok_or_else(|| TslError::UndefinedShaderUnit(instance.clone()))?;
            for (arg_name, index) in args {
                let arg = template
                    .exposed_arguments()
                    .iter()
                    .find(|a| a.name == *arg_name)
                    .ok_or(TslError::InvalidArgType)?;
                if arg.is_output != expect_output {
                    return Err(TslError::InvalidArgType);
                }
                if matches!(arg.ty, DataType::Void | DataType::Struct(_)) {
                    return Err(TslError::InvalidArgType);
                }
                let previous = by_index.insert(
                    *index,
                    (
                        instance.clone(),
                        arg_name.clone(),
                        arg.ty.clone(),
                        expect_output,
                    ),
                );
                if previous.is_some() {
                    return Err(TslError::InvalidArgType);
                }
            }
        }
    }

    let mut ordered = Vec::with_capacity(by_index.len());
    let mut positions = HashMap::new();
    for (position, (_, (instance, arg_name, ty, is_output))) in by_index.into_iter().enumerate() {
        positions.insert((instance, arg_name), position as u32);
        ordered.push((ty, is_output));
    }
    Ok((ordered, positions))
}

/// group 模板对外的参数表，名字用 `<实例>_<参数>`
fn group_exposed_arguments(
    group: &ShaderGroupTemplate,
    positions: &HashMap<(String, String), u32>,
    wrapper_args: &[(DataType, bool)],
) -> Vec<ShaderArgument> {
    let mut names: Vec<String> = vec![String::new(); wrapper_args.len()];
    for ((instance, arg), position) in positions {
        names[*position as usize] = format!("{}_{}", instance, arg);
    }
    wrapper_args
        .iter()
        .zip(names)
        .map(|((ty, is_output), name)| ShaderArgument {
            name,
            ty: ty.clone(),
            is_output: *is_output,
            default: None,
        })
        .collect()
}

/// 把默认值物化为常量，int 默认值允许提升
fn const_shader_value<'ctx>(
    ctx: &CompileContext<'ctx>,
    value: &ShaderValue,
    target: &DataType,
) -> TslResult<BasicValueEnum<'ctx>> {
    let constant: BasicValueEnum = match (value, target) {
        (ShaderValue::Int(x), DataType::Int) => ctx
            .context
            .i32_type()
            .const_int(*x as i64 as u64, true)
            .into(),
        (ShaderValue::Int(x), DataType::Float) => {
            ctx.context.f32_type().const_float(*x as f64).into()
        }
        (ShaderValue::Int(x), DataType::Double) => {
            ctx.context.f64_type().const_float(*x as f64).into()
        }
        (ShaderValue::Float(x), DataType::Float) => {
            ctx.context.f32_type().const_float(*x as f64).into()
        }
        (ShaderValue::Float(x), DataType::Double) => {
            ctx.context.f64_type().const_float(*x as f64).into()
        }
        (ShaderValue::Double(x), DataType::Double) => {
            ctx.context.f64_type().const_float(*x).into()
        }
        (ShaderValue::Bool(x), DataType::Bool) => ctx
            .context
            .bool_type()
            .const_int(*x as u64, false)
            .into(),
        (ShaderValue::Float3(v), DataType::Float3) => {
            let f32_ty = ctx.context.f32_type();
            let fields: Vec<BasicValueEnum> = v
                .iter()
                .map(|x| f32_ty.const_float(*x as f64).into())
                .collect();
            ctx.struct_types["float3"].const_named_struct(&fields).into()
        }
        (ShaderValue::Float4(v), DataType::Float4) => {
            let f32_ty = ctx.context.f32_type();
            let fields: Vec<BasicValueEnum> = v
                .iter()
                .map(|x| f32_ty.const_float(*x as f64).into())
                .collect();
            ctx.struct_types["float4"].const_named_struct(&fields).into()
        }
        (ShaderValue::Matrix(m), DataType::Matrix) => {
            let f32_ty = ctx.context.f32_type();
            let elements: Vec<_> = m.iter().map(|x| f32_ty.const_float(*x as f64)).collect();
            let array = f32_ty.const_array(&elements);
            ctx.struct_types["matrix"]
                .const_named_struct(&[array.into()])
                .into()
        }
        _ => return Err(TslError::InvalidArgType),
    };
    Ok(constant)
}

fn build_err(error: impl std::fmt::Display) -> TslError {
    TslError::CodegenFailed(error.to_string())
}
