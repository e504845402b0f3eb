//! Instance Resolver
//!
//! 把不可变模板变成可调用实例：在全新的 LLVM Context 里重建模板
//! 模块，跑固定顺序的优化 pass，可选验证，建 MCJIT 执行引擎，
//! 挂上全部依赖模块并映射宿主符号，最后解析根函数地址。
//! 任何一步失败都整体丢弃，不会留下半成品实例

use crate::error::{TslError, TslResult};
use crate::shader_unit::{ShaderInstance, ShaderUnitTemplate};
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::passes::PassManager;
use inkwell::values::FunctionValue;
use inkwell::OptimizationLevel;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// 解析一个模板为 JIT 实例
pub(crate) fn resolve_shader_unit(
    template: &ShaderUnitTemplate,
    host_symbols: &HashMap<String, usize>,
) -> TslResult<ShaderInstance> {
    if template.module().is_empty() || template.root_function_name().is_empty() {
        return Err(TslError::InvalidShaderGroupTemplate);
    }

    // 实例独占的 context；Box 保证模块/引擎引用的地址稳定
    let context = Box::new(Context::create());
    let context_ref: &'static Context = unsafe { &*(context.as_ref() as *const Context) };

    let module = template
        .module()
        .parse_into(context_ref)
        .map_err(TslError::CodegenFailed)?;
    let root_function = module
        .get_function(template.root_function_name())
        .ok_or(TslError::InvalidShaderGroupTemplate)?;

    if template.allow_optimization() {
        run_function_passes(&module, root_function);
    }

    if template.allow_verification() && !root_function.verify(false) {
        return Err(TslError::LLVMFunctionVerificationFailed(
            template.root_function_name().to_string(),
        ));
    }

    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| TslError::CodegenFailed(e.to_string()))?;

    // 同一个符号只能建立一次全局映射，跨模块用名字去重
    let mut mapped = HashSet::new();
    map_host_symbols(&engine, &module, host_symbols, &mut mapped);

    // 依赖模块逐个克隆进同一个 context 并挂到引擎上
    for dependency in template.dependencies() {
        let dep_module = dependency
            .parse_into(context_ref)
            .map_err(TslError::CodegenFailed)?;
        engine
            .add_module(&dep_module)
            .map_err(|_| TslError::CodegenFailed("failed to add dependency module".into()))?;
        map_host_symbols(&engine, &dep_module, host_symbols, &mut mapped);
    }

    let function_pointer = engine
        .get_function_address(template.root_function_name())
        .map_err(|e| TslError::CodegenFailed(e.to_string()))?;

    info!(
        shader = template.name(),
        root = template.root_function_name(),
        "resolved shader instance"
    );

    Ok(ShaderInstance::new(context, engine, function_pointer))
}

/// 固定顺序的函数级优化: instcombine → reassociate → GVN → simplifycfg
fn run_function_passes<'ctx>(module: &Module<'ctx>, function: FunctionValue<'ctx>) {
    let fpm = PassManager::create(module);
    fpm.add_instruction_combining_pass();
    fpm.add_reassociate_pass();
    fpm.add_gvn_pass();
    fpm.add_cfg_simplification_pass();
    fpm.initialize();
    fpm.run_on(&function);
    fpm.finalize();
}

/// 把模块里没有函数体的声明绑定到注册过的宿主符号地址
fn map_host_symbols<'ctx>(
    engine: &ExecutionEngine<'ctx>,
    module: &Module<'ctx>,
    host_symbols: &HashMap<String, usize>,
    mapped: &mut HashSet<String>,
) {
    let mut function = module.get_first_function();
    while let Some(current) = function {
        if current.count_basic_blocks() == 0 {
            if let Ok(name) = current.get_name().to_str() {
                if let Some(address) = host_symbols.get(name) {
                    if mapped.insert(name.to_string()) {
                        engine.add_global_mapping(&current, *address);
                        debug!(symbol = name, "mapped host symbol");
                    }
                }
            }
        }
        function = current.get_next_function();
    }
}
