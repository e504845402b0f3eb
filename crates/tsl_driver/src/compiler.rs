//! TSL Compiler Driver
//!
//! 每线程一个的编译 driver：驱动 parser、接收回调、把 AST 降级进
//! 模板自己的 IR 模块。整个 compile 在一个 AST arena region 里进行，
//! 结束时把 shader 根节点的所有权从 arena 转移到模板上

use crate::closure_register::ClosureRegister;
use crate::error::{TslError, TslResult};
use crate::shader_unit::{CompileOptions, ShaderArgument, ShaderUnitTemplate, ShaderValue};
use inkwell::context::Context;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use tsl_codegen::global_module::{declare_closure_function, declare_global_module};
use tsl_codegen::{module, CodegenError, CompileContext, FunctionGenerator, ModuleBuffer};
use tsl_diagnostics::Diagnostic;
use tsl_syntax::arena::{self, AstRegionGuard, DeclHandle};
use tsl_syntax::ast::{DataType, Decl, Param};
use tsl_syntax::frontend::{deliver_program, ParserCallbacks};
use tsl_syntax::parse_program;

/// 编译 driver（spec 里的 per-thread compiler）
///
/// 持有自己的 LLVM context；parse 产生的顶层节点通过回调落进
/// driver 的各个列表，codegen 阶段再按固定顺序消费
pub struct TslCompiler {
    context: Context,
    register: Arc<ClosureRegister>,

    // 一次 compile 的回调状态
    ast_root: Option<DeclHandle>,
    functions: Vec<DeclHandle>,
    structures: Vec<DeclHandle>,
    global_parameters: Vec<(DeclHandle, DataType)>,
    closures_in_shader: Vec<Arc<str>>,
    type_cache: DataType,
    string_pool: HashSet<Arc<str>>,
}

impl ParserCallbacks for TslCompiler {
    fn push_function(&mut self, handle: DeclHandle, is_shader: bool) {
        if is_shader {
            self.ast_root = Some(handle);
        } else {
            self.functions.push(handle);
        }
    }

    fn push_structure(&mut self, handle: DeclHandle) {
        self.structures.push(handle);
    }

    fn push_global_parameter(&mut self, handle: DeclHandle) {
        let ty = self.data_type_cache();
        self.global_parameters.push((handle, ty));
    }

    fn closure_touched(&mut self, name: &str) {
        let interned = self.claim_permanent_address(name);
        if !self.closures_in_shader.contains(&interned) {
            self.closures_in_shader.push(interned);
        }
    }

    fn cache_data_type(&mut self, ty: DataType) {
        self.type_cache = ty;
    }

    fn data_type_cache(&self) -> DataType {
        self.type_cache.clone()
    }

    fn claim_permanent_address(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.string_pool.get(s) {
            return existing.clone();
        }
        let interned: Arc<str> = Arc::from(s);
        self.string_pool.insert(interned.clone());
        interned
    }
}

impl TslCompiler {
    pub(crate) fn new(register: Arc<ClosureRegister>) -> Self {
        Self {
            context: Context::create(),
            register,
            ast_root: None,
            functions: Vec::new(),
            structures: Vec::new(),
            global_parameters: Vec::new(),
            closures_in_shader: Vec::new(),
            type_cache: DataType::Void,
            string_pool: HashSet::new(),
        }
    }

    /// 清空编译状态，准备下一次 compile
    pub fn reset(&mut self) {
        self.ast_root = None;
        self.functions.clear();
        self.structures.clear();
        self.global_parameters.clear();
        self.closures_in_shader.clear();
        self.type_cache = DataType::Void;
    }

    /// 编译一段 shader 源码为不可变模板
    pub fn compile(
        &mut self,
        name: &str,
        source: &str,
        options: CompileOptions,
    ) -> TslResult<Arc<ShaderUnitTemplate>> {
        self.reset();
        let _region = AstRegionGuard::enter();

        if options.verbose_parser {
            debug!(shader = name, source, "parsing shader source");
        }

        let program = parse_program(source).map_err(|errors| {
            for error in &errors {
                debug!(shader = name, ?error, "parse error");
            }
            TslError::ParseFailed
        })?;

        if options.verbose_parser {
            debug!(shader = name, ast = ?program, "parsed program");
        }

        deliver_program(program, self);

        let mut ctx = CompileContext::new(&self.context, name);
        let (root_function_name, exposed_arguments) = self.lower(&mut ctx, name)?;

        let module = ModuleBuffer::from_module(&ctx.module);
        let dependencies = vec![self.register.get_closure_module()];
        let ast_root = self.ast_root.and_then(arena::take_decl);

        info!(
            shader = name,
            root = %root_function_name,
            arguments = exposed_arguments.len(),
            "compiled shader unit template"
        );

        Ok(Arc::new(ShaderUnitTemplate::new(
            name.to_string(),
            module,
            root_function_name,
            exposed_arguments,
            dependencies,
            ast_root,
            options,
        )))
    }

    /// 按固定顺序降级：全局参数 → struct → 函数 → shader 根
    fn lower<'ctx>(
        &self,
        ctx: &mut CompileContext<'ctx>,
        shader: &str,
    ) -> TslResult<(String, Vec<ShaderArgument>)> {
        declare_global_module(ctx).map_err(|e| collapse(ctx, shader, e))?;

        // shader 里 touch 到的 closure 必须已经注册过
        for closure_name in &self.closures_in_shader {
            match self.register.lookup(closure_name) {
                Some((_, fields)) => {
                    declare_closure_function(ctx, closure_name, &fields)
                        .map_err(|e| collapse(ctx, shader, e))?;
                }
                None => {
                    return Err(TslError::UnregisteredClosureTouched(
                        closure_name.to_string(),
                    ))
                }
            }
        }

        for (handle, cached_ty) in &self.global_parameters {
            let cached_ty = cached_ty.clone();
            run_on_decl(ctx, shader, *handle, |ctx, decl| {
                let Decl::GlobalParam { name, init, .. } = decl else {
                    return Err(CodegenError::NotAFunction);
                };
                module::define_global_parameter(ctx, name, &cached_ty, init)
            })?;
        }

        for handle in &self.structures {
            run_on_decl(ctx, shader, *handle, |ctx, decl| {
                let Decl::Structure { name, fields, .. } = decl else {
                    return Err(CodegenError::NotAFunction);
                };
                let fields: Vec<(String, DataType)> = fields
                    .iter()
                    .map(|f| (f.name.clone(), f.ty.clone()))
                    .collect();
                module::register_structure(ctx, name, &fields)
            })?;
        }

        // 先声明再生成函数体，支持前向引用
        for handle in &self.functions {
            run_on_decl(ctx, shader, *handle, |ctx, decl| {
                FunctionGenerator::new(ctx).declare_function(decl).map(|_| ())
            })?;
        }
        for handle in &self.functions {
            run_on_decl(ctx, shader, *handle, |ctx, decl| {
                FunctionGenerator::new(ctx).define_function(decl).map(|_| ())
            })?;
        }

        let mut root_function_name = String::new();
        let mut exposed_arguments = Vec::new();
        if let Some(handle) = self.ast_root {
            let (name, params) = arena::with_decl(handle, |decl| match decl {
                Decl::Function { name, params, .. } => (name.clone(), params.clone()),
                _ => (String::new(), Vec::new()),
            })
            .ok_or(TslError::InvalidInput)?;

            exposed_arguments = parse_shader_parameters(&params)?;
            run_on_decl(ctx, shader, handle, |ctx, decl| {
                FunctionGenerator::new(ctx).define_shader(decl).map(|_| ())
            })?;
            root_function_name = name;
        }

        ctx.verify().map_err(|e| collapse(ctx, shader, e))?;

        Ok((root_function_name, exposed_arguments))
    }
}

/// 从 shader 根函数的参数表提取暴露参数
///
/// 暴露参数只允许基础类型；默认字面量允许 int → float/double 提升
fn parse_shader_parameters(params: &[Param]) -> TslResult<Vec<ShaderArgument>> {
    let mut arguments = Vec::with_capacity(params.len());
    for param in params {
        match &param.ty {
            DataType::Void | DataType::Struct(_) => return Err(TslError::InvalidArgType),
            _ => {}
        }
        let default = param
            .default
            .as_ref()
            .map(|lit| ShaderValue::from_literal(lit, &param.ty))
            .transpose()?;
        arguments.push(ShaderArgument {
            name: param.name.clone(),
            ty: param.ty.clone(),
            is_output: param.is_output,
            default,
        });
    }
    Ok(arguments)
}

/// 对 arena 里的节点执行一个 codegen 步骤，错误折叠进诊断 sink
fn run_on_decl<'ctx>(
    ctx: &mut CompileContext<'ctx>,
    shader: &str,
    handle: DeclHandle,
    f: impl FnOnce(&mut CompileContext<'ctx>, &Decl) -> Result<(), CodegenError>,
) -> TslResult<()> {
    match arena::with_decl(handle, |decl| f(ctx, decl)) {
        None => Err(TslError::InvalidInput),
        Some(Err(error)) => Err(collapse(ctx, shader, error)),
        Some(Ok(())) => Ok(()),
    }
}

/// codegen 错误进 sink 并折叠为顶层 CodegenFailed
fn collapse<'ctx>(ctx: &mut CompileContext<'ctx>, shader: &str, error: CodegenError) -> TslError {
    ctx.diagnostics
        .add(Diagnostic::error(error.to_string()).with_shader(shader));
    TslError::CodegenFailed(ctx.diagnostics.summary())
}
