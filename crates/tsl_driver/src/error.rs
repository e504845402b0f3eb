//! Compilation Errors
//!
//! 对外暴露的错误枚举。codegen 内部的语义错误在 compile context 的
//! 诊断 sink 里积累，最终折叠成单个 `CodegenFailed`

use thiserror::Error;

/// TSL 公共操作的错误状态
#[derive(Debug, Error)]
pub enum TslError {
    /// 词法或语法错误
    #[error("failed to parse shader source")]
    ParseFailed,

    /// closure 注册参数非法（零尺寸或字段类型不支持）
    #[error("invalid closure schema: {0}")]
    InvalidClosureSchema(String),

    /// shader 引用了未注册的 closure
    #[error("shader touches unregistered closure: {0}")]
    UnregisteredClosureTouched(String),

    /// 代码生成期间的语义错误（未知符号、类型不匹配等）
    #[error("code generation failed: {0}")]
    CodegenFailed(String),

    /// 空的模板或 group
    #[error("invalid input")]
    InvalidInput,

    /// 模板缺少模块或根函数
    #[error("invalid shader group template")]
    InvalidShaderGroupTemplate,

    /// group 没有设置根 shader，或根不在 units 里
    #[error("shader group has no root shader unit")]
    ShaderGroupWithoutRoot,

    /// group 连接图中存在环
    #[error("shader group contains cycles")]
    ShaderGroupWithCycles,

    /// 连接引用了不存在的 shader unit 实例
    #[error("undefined shader unit: {0}")]
    UndefinedShaderUnit(String),

    /// 输入参数既没有连接、没有暴露、也没有默认值
    #[error("argument `{argument}` of `{instance}` in group `{group}` has no initialization")]
    ArgumentWithoutInitialization {
        group: String,
        instance: String,
        argument: String,
    },

    /// 连接或暴露用了不支持的参数类型
    #[error("invalid argument type")]
    InvalidArgType,

    /// IR 验证失败
    #[error("LLVM function verification failed: {0}")]
    LLVMFunctionVerificationFailed(String),
}

/// TSL 结果类型
pub type TslResult<T> = Result<T, TslError>;
