//! TSL Driver
//!
//! Tiny Shading Language 的编译、链接与解析引擎：
//! - `shading_context.rs` - 进程级门面
//! - `compiler.rs` - 每线程的编译 driver
//! - `closure_register.rs` - closure 类型注册表与 closure module
//! - `shader_unit.rs` / `shader_group.rs` - 模板数据模型
//! - `linker.rs` - group 的拓扑链接与 wrapper 生成
//! - `resolver.rs` - 模板到 JIT 实例的解析
//!
//! 典型用法：注册 closure → 编译 shader unit →（可选）组装 group →
//! resolve 得到函数指针 → 按 shader ABI 调用

pub mod closure_register;
pub mod compiler;
pub mod error;
mod linker;
mod resolver;
pub mod shader_group;
pub mod shader_unit;
pub mod shading_context;

pub use closure_register::{ClosureRegister, ClosureVarList};
pub use compiler::TslCompiler;
pub use error::{TslError, TslResult};
pub use shader_group::ShaderGroupTemplate;
pub use shader_unit::{CompileOptions, ShaderArgument, ShaderInstance, ShaderUnitTemplate, ShaderValue};
pub use shading_context::ShadingContext;

// 方便宿主按 ABI 调用
pub use tsl_runtime::{
    ClosureID, ClosureTreeNodeAdd, ClosureTreeNodeBase, ClosureTreeNodeMul, Float3, Float4,
    Matrix, TslGlobal, CLOSURE_ADD, CLOSURE_MUL, INVALID_CLOSURE_ID,
};
pub use tsl_syntax::ast::DataType;
