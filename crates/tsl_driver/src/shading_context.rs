//! Shading Context
//!
//! 进程级门面：持有 closure 注册表和宿主符号表，发放编译 driver、
//! 模板和实例。构造时做一次 JIT 能力检查（原生目标初始化 +
//! 跨 context 模块克隆探针），不支持的平台直接报错

use crate::closure_register::{ClosureRegister, ClosureVarList};
use crate::compiler::TslCompiler;
use crate::error::{TslError, TslResult};
use crate::linker;
use crate::resolver;
use crate::shader_group::ShaderGroupTemplate;
use crate::shader_unit::{CompileOptions, ShaderInstance, ShaderUnitTemplate};
use inkwell::context::Context;
use inkwell::targets::{InitializationConfig, Target};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::info;
use tsl_codegen::ModuleBuffer;
use tsl_runtime::math::default_host_symbols;
use tsl_runtime::ClosureID;

/// shading 系统的进程级入口
pub struct ShadingContext {
    register: Arc<ClosureRegister>,
    host_symbols: Mutex<HashMap<String, usize>>,
}

impl ShadingContext {
    /// 创建 shading context
    ///
    /// 默认宿主符号表带上运行时的 math 库和 closure 分配器
    pub fn new() -> TslResult<Arc<Self>> {
        ensure_jit_support()?;

        let mut host_symbols = HashMap::new();
        for (name, address) in default_host_symbols() {
            host_symbols.insert(name.to_string(), address);
        }

        info!("shading context initialized");
        Ok(Arc::new(Self {
            register: Arc::new(ClosureRegister::new()?),
            host_symbols: Mutex::new(host_symbols),
        }))
    }

    /// 注册一个 closure 类型
    pub fn register_closure(
        &self,
        name: &str,
        fields: ClosureVarList,
        structure_size: u32,
    ) -> TslResult<ClosureID> {
        self.register
            .register_closure_type(name, fields, structure_size)
    }

    /// 注册一个宿主符号（closure 构造函数、自定义运行时函数）
    ///
    /// resolve 时绑定到执行引擎的符号解析器
    pub fn register_host_function(&self, name: &str, address: usize) {
        self.host_symbols
            .lock()
            .expect("host symbol lock poisoned")
            .insert(name.to_string(), address);
    }

    /// 发放一个编译 driver；driver 不可跨线程共享
    pub fn begin_compile(&self) -> TslCompiler {
        TslCompiler::new(self.register.clone())
    }

    /// 用默认选项编译一段 shader 源码
    pub fn compile_shader_unit(
        &self,
        name: &str,
        source: &str,
    ) -> TslResult<Arc<ShaderUnitTemplate>> {
        self.compile_shader_unit_with_options(name, source, CompileOptions::default())
    }

    /// 编译一段 shader 源码为模板
    pub fn compile_shader_unit_with_options(
        &self,
        name: &str,
        source: &str,
        options: CompileOptions,
    ) -> TslResult<Arc<ShaderUnitTemplate>> {
        self.begin_compile().compile(name, source, options)
    }

    /// 新建一个空的 shader group 模板
    pub fn make_shader_group(&self, name: &str) -> ShaderGroupTemplate {
        ShaderGroupTemplate::new(name)
    }

    /// 链接 shader group，得到可 resolve 的 wrapper 模板
    pub fn resolve_shader_group(
        &self,
        group: &ShaderGroupTemplate,
    ) -> TslResult<Arc<ShaderUnitTemplate>> {
        linker::link_shader_group(group, self.register.get_closure_module())
    }

    /// 把模板 JIT 成可调用实例
    pub fn resolve_shader_unit(
        &self,
        template: &ShaderUnitTemplate,
    ) -> TslResult<ShaderInstance> {
        let host_symbols = self
            .host_symbols
            .lock()
            .expect("host symbol lock poisoned")
            .clone();
        resolver::resolve_shader_unit(template, &host_symbols)
    }
}

/// 每个进程只做一次的 JIT 能力检查
fn ensure_jit_support() -> TslResult<()> {
    static SUPPORT: OnceLock<Result<(), String>> = OnceLock::new();
    SUPPORT
        .get_or_init(|| {
            Target::initialize_native(&InitializationConfig::default())?;

            // 跨 context 克隆探针：不可用的话整个 resolve 路径都不成立
            let source = Context::create();
            let probe = source.create_module("clone_probe");
            let buffer = ModuleBuffer::from_module(&probe);
            let target = Context::create();
            buffer.parse_into(&target)?;
            Ok(())
        })
        .clone()
        .map_err(TslError::CodegenFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let context = ShadingContext::new().unwrap();
        // 默认符号表包含运行时 math 库与分配器
        let symbols = context.host_symbols.lock().unwrap();
        assert!(symbols.contains_key("tsl_sin"));
        assert!(symbols.contains_key("allocate_closure"));
    }

    #[test]
    fn test_register_host_function() {
        let context = ShadingContext::new().unwrap();
        context.register_host_function("my_symbol", 0x1234);
        assert_eq!(
            context.host_symbols.lock().unwrap().get("my_symbol"),
            Some(&0x1234)
        );
    }
}
