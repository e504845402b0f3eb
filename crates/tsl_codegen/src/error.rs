//! Code Generation Error Types
//!
//! 代码生成过程中可能出现的语义错误。全部先进入 compile context 的
//! 诊断 sink，由 driver 折叠为顶层 CodegenFailed

use thiserror::Error;

/// 代码生成错误
#[derive(Debug, Error)]
pub enum CodegenError {
    /// 未定义的变量
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// 未定义的结构体类型
    #[error("undefined struct type: {0}")]
    UndefinedStructType(String),

    /// 重复定义
    #[error("duplicate definition: {0}")]
    DuplicateDefinition(String),

    /// 类型不匹配
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// 运算符不支持给定的操作数类型
    #[error("unsupported operator `{op}` for {lhs} and {rhs}")]
    UnsupportedOperator {
        op: String,
        lhs: String,
        rhs: String,
    },

    /// 函数未找到
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// shader 引用了未注册的 closure
    #[error("closure not registered: {0}")]
    UnregisteredClosure(String),

    /// 非法的成员访问
    #[error("invalid member access: {0}")]
    InvalidMember(String),

    /// 参数个数不符
    #[error("wrong number of arguments for {0}")]
    ArityMismatch(String),

    /// 非 void 函数缺少 return
    #[error("missing return in function {0}")]
    MissingReturn(String),

    /// break/continue 在循环外
    #[error("break or continue outside of a loop")]
    OutsideLoop,

    /// 全局参数只读
    #[error("cannot assign to global parameter: {0}")]
    AssignToGlobal(String),

    /// 不支持的类型
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// 不是函数声明
    #[error("expected function declaration")]
    NotAFunction,

    /// LLVM 构建错误
    #[error("LLVM build error: {0}")]
    LLVMBuildError(String),
}

/// 代码生成结果类型
pub type CodegenResult<T> = Result<T, CodegenError>;
