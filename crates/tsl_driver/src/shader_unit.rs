//! Shader Unit
//!
//! 编译产物的数据模型：编译选项、参数默认值、暴露参数、
//! 不可变的 ShaderUnitTemplate 和 JIT 完成后的 ShaderInstance。
//! 模板是稳定资产，实例轻量、可随时从模板再造

use crate::error::{TslError, TslResult};
use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use tsl_codegen::ModuleBuffer;
use tsl_syntax::ast::{DataType, Decl, Literal};

/// 每个模板的编译选项
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// 是否在 resolve 时运行优化 pass
    pub allow_optimization: bool,
    /// 是否在 resolve 时运行 IR 验证
    pub allow_verification: bool,
    /// 是否输出 parser 诊断日志
    pub verbose_parser: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            allow_optimization: true,
            allow_verification: true,
            verbose_parser: false,
        }
    }
}

/// 一个基础类型的字面值，用于参数默认值注入
#[derive(Debug, Clone, PartialEq)]
pub enum ShaderValue {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Matrix([f32; 16]),
}

impl ShaderValue {
    /// 值对应的 TSL 类型
    pub fn data_type(&self) -> DataType {
        match self {
            ShaderValue::Int(_) => DataType::Int,
            ShaderValue::Float(_) => DataType::Float,
            ShaderValue::Double(_) => DataType::Double,
            ShaderValue::Bool(_) => DataType::Bool,
            ShaderValue::Float3(_) => DataType::Float3,
            ShaderValue::Float4(_) => DataType::Float4,
            ShaderValue::Matrix(_) => DataType::Matrix,
        }
    }

    /// 从 shader 源码的参数默认字面量构造，允许 int 字面量提升
    pub(crate) fn from_literal(lit: &Literal, ty: &DataType) -> TslResult<Self> {
        match (lit, ty) {
            (Literal::Int(x), DataType::Int) => Ok(ShaderValue::Int(*x)),
            (Literal::Int(x), DataType::Float) => Ok(ShaderValue::Float(*x as f32)),
            (Literal::Int(x), DataType::Double) => Ok(ShaderValue::Double(*x as f64)),
            (Literal::Float(x), DataType::Float) => Ok(ShaderValue::Float(*x)),
            (Literal::Float(x), DataType::Double) => Ok(ShaderValue::Double(*x as f64)),
            (Literal::Bool(x), DataType::Bool) => Ok(ShaderValue::Bool(*x)),
            _ => Err(TslError::InvalidArgType),
        }
    }
}

/// shader unit 暴露的一个参数
#[derive(Debug, Clone)]
pub struct ShaderArgument {
    pub name: String,
    pub ty: DataType,
    pub is_output: bool,
    pub default: Option<ShaderValue>,
}

/// 一份编译完成的 shader 源码
///
/// 持有序列化的 IR 模块、根函数名、保留的 AST 根（shader group
/// 之后需要重新声明它的签名）、暴露参数表和依赖模块集合。
/// `compile` 返回后逻辑上不可变，可跨线程只读共享
pub struct ShaderUnitTemplate {
    name: String,
    module: ModuleBuffer,
    root_function_name: String,
    exposed_arguments: Vec<ShaderArgument>,
    dependencies: Vec<ModuleBuffer>,
    ast_root: Option<Decl>,
    options: CompileOptions,
}

impl ShaderUnitTemplate {
    pub(crate) fn new(
        name: String,
        module: ModuleBuffer,
        root_function_name: String,
        exposed_arguments: Vec<ShaderArgument>,
        dependencies: Vec<ModuleBuffer>,
        ast_root: Option<Decl>,
        options: CompileOptions,
    ) -> Self {
        Self {
            name,
            module,
            root_function_name,
            exposed_arguments,
            dependencies,
            ast_root,
            options,
        }
    }

    /// 模板名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 根函数符号名
    pub fn root_function_name(&self) -> &str {
        &self.root_function_name
    }

    /// 暴露的参数表
    pub fn exposed_arguments(&self) -> &[ShaderArgument] {
        &self.exposed_arguments
    }

    pub(crate) fn module(&self) -> &ModuleBuffer {
        &self.module
    }

    pub(crate) fn dependencies(&self) -> &[ModuleBuffer] {
        &self.dependencies
    }

    pub(crate) fn ast_root(&self) -> Option<&Decl> {
        self.ast_root.as_ref()
    }

    /// resolve 时是否运行优化 pass
    pub fn allow_optimization(&self) -> bool {
        self.options.allow_optimization
    }

    /// resolve 时是否运行 IR 验证
    pub fn allow_verification(&self) -> bool {
        self.options.allow_verification
    }
}

/// JIT 完成的 shader 实例
///
/// 独占一个 LLVM Context 和一个执行引擎；字段顺序保证 engine 先于
/// context 析构。同一个模板可以同时存在任意多个实例
pub struct ShaderInstance {
    function_pointer: usize,
    _engine: ExecutionEngine<'static>,
    _context: Box<Context>,
}

impl ShaderInstance {
    pub(crate) fn new(
        context: Box<Context>,
        engine: ExecutionEngine<'static>,
        function_pointer: usize,
    ) -> Self {
        Self {
            function_pointer,
            _engine: engine,
            _context: context,
        }
    }

    /// 已解析的原生函数地址，按 shader 的 ABI 转换后调用
    pub fn function_pointer(&self) -> usize {
        self.function_pointer
    }
}

// 实例独占自己的 context 与 engine，不和其他 LLVM 对象共享可变状态；
// 函数指针本身随进程存活
unsafe impl Send for ShaderInstance {}
unsafe impl Sync for ShaderInstance {}

impl std::fmt::Debug for ShaderInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderInstance")
            .field("function_pointer", &(self.function_pointer as *const ()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CompileOptions::default();
        assert!(options.allow_optimization);
        assert!(options.allow_verification);
        assert!(!options.verbose_parser);
    }

    #[test]
    fn test_shader_value_from_literal() {
        let v = ShaderValue::from_literal(&Literal::Int(2), &DataType::Float).unwrap();
        assert_eq!(v, ShaderValue::Float(2.0));
        assert_eq!(v.data_type(), DataType::Float);

        assert!(ShaderValue::from_literal(&Literal::Bool(true), &DataType::Float).is_err());
    }
}
