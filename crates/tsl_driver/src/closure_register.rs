//! Closure Register
//!
//! 进程级的 closure 类型注册表：名字 → 稳定正整数 ID（从 1 紧密分配），
//! 同时维护 closure module 快照——声明宿主分配器和每个已注册 closure
//! 构造函数原型的 IR 模块。注册在一把互斥锁下串行；模块快照随注册集
//! 重建，是注册内容的纯函数

use crate::error::{TslError, TslResult};
use inkwell::context::Context;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;
use tsl_codegen::global_module::{declare_closure_function, declare_global_module};
use tsl_codegen::{CompileContext, ModuleBuffer};
use tsl_runtime::{ClosureID, INVALID_CLOSURE_ID};
use tsl_syntax::ast::DataType;

/// closure 字段表: (字段名, 类型)
pub type ClosureVarList = Vec<(String, DataType)>;

#[derive(Debug, Clone)]
struct ClosureSignature {
    id: ClosureID,
    fields: ClosureVarList,
}

struct RegisterInner {
    closures: HashMap<String, ClosureSignature>,
    next_closure_id: ClosureID,
    module: ModuleBuffer,
}

/// closure 类型注册表
pub struct ClosureRegister {
    inner: Mutex<RegisterInner>,
}

impl ClosureRegister {
    /// 创建空注册表并生成初始（只含分配器声明的）closure module
    pub fn new() -> TslResult<Self> {
        let module = build_closure_module(&HashMap::new())?;
        Ok(Self {
            inner: Mutex::new(RegisterInner {
                closures: HashMap::new(),
                next_closure_id: INVALID_CLOSURE_ID + 1,
                module,
            }),
        })
    }

    /// 注册一个 closure 类型，返回分配的 ID
    ///
    /// 重复注册同名 closure 返回已分配的 ID，不重建模块。
    /// 零尺寸或不支持的字段类型返回 `InvalidClosureSchema`
    pub fn register_closure_type(
        &self,
        name: &str,
        fields: ClosureVarList,
        structure_size: u32,
    ) -> TslResult<ClosureID> {
        if name.is_empty() {
            return Err(TslError::InvalidClosureSchema("empty name".to_string()));
        }
        if (structure_size as usize) < std::mem::size_of::<tsl_runtime::ClosureTreeNodeBase>() {
            return Err(TslError::InvalidClosureSchema(format!(
                "closure `{}` has invalid size {}",
                name, structure_size
            )));
        }
        for (field_name, ty) in &fields {
            match ty {
                DataType::Int
                | DataType::Float
                | DataType::Double
                | DataType::Bool
                | DataType::Float3
                | DataType::Float4
                | DataType::Matrix => {}
                other => {
                    return Err(TslError::InvalidClosureSchema(format!(
                        "field `{}` of closure `{}` has unsupported type {}",
                        field_name, name, other
                    )))
                }
            }
        }

        let mut inner = self.inner.lock().expect("closure register lock poisoned");

        if let Some(existing) = inner.closures.get(name) {
            return Ok(existing.id);
        }

        let id = inner.next_closure_id;
        inner.next_closure_id += 1;
        inner.closures.insert(
            name.to_string(),
            ClosureSignature { id, fields },
        );
        inner.module = build_closure_module(&inner.closures)?;

        debug!(closure = name, id, "registered closure type");
        Ok(id)
    }

    /// 当前 closure module 快照，链接实例时克隆（解析）使用
    pub fn get_closure_module(&self) -> ModuleBuffer {
        self.inner
            .lock()
            .expect("closure register lock poisoned")
            .module
            .clone()
    }

    /// 按名字查询已注册 closure 的 ID 和字段表
    pub fn lookup(&self, name: &str) -> Option<(ClosureID, ClosureVarList)> {
        self.inner
            .lock()
            .expect("closure register lock poisoned")
            .closures
            .get(name)
            .map(|sig| (sig.id, sig.fields.clone()))
    }
}

/// 从注册集重建 closure module：全局声明加每个构造函数原型
fn build_closure_module(
    closures: &HashMap<String, ClosureSignature>,
) -> TslResult<ModuleBuffer> {
    let context = Context::create();
    let mut ctx = CompileContext::new(&context, "tsl_closure_module");
    declare_global_module(&mut ctx).map_err(|e| TslError::CodegenFailed(e.to_string()))?;

    // 按 ID 排序保证重建结果确定
    let mut ordered: Vec<_> = closures.iter().collect();
    ordered.sort_by_key(|(_, sig)| sig.id);
    for (name, sig) in ordered {
        declare_closure_function(&mut ctx, name, &sig.fields)
            .map_err(|e| TslError::InvalidClosureSchema(e.to_string()))?;
    }

    Ok(ModuleBuffer::from_module(&ctx.module))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_positive_ids() {
        let register = ClosureRegister::new().unwrap();
        let a = register
            .register_closure_type("A", vec![("w".into(), DataType::Float)], 8)
            .unwrap();
        let b = register.register_closure_type("B", vec![], 4).unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn test_reregister_returns_same_id() {
        let register = ClosureRegister::new().unwrap();
        let first = register.register_closure_type("A", vec![], 4).unwrap();
        let module_before = register.get_closure_module();

        let second = register.register_closure_type("A", vec![], 4).unwrap();
        assert_eq!(first, second);

        // 重复注册不重建模块
        let module_after = register.get_closure_module();
        assert_eq!(module_before.len(), module_after.len());
    }

    #[test]
    fn test_invalid_schema() {
        let register = ClosureRegister::new().unwrap();
        assert!(matches!(
            register.register_closure_type("Z", vec![], 0),
            Err(TslError::InvalidClosureSchema(_))
        ));
        assert!(matches!(
            register.register_closure_type(
                "C",
                vec![("c".into(), DataType::Closure)],
                16
            ),
            Err(TslError::InvalidClosureSchema(_))
        ));
        assert!(matches!(
            register.register_closure_type("", vec![], 8),
            Err(TslError::InvalidClosureSchema(_))
        ));
    }

    #[test]
    fn test_module_declares_constructors() {
        let register = ClosureRegister::new().unwrap();
        register
            .register_closure_type("Lambert", vec![("base_color".into(), DataType::Float3)], 16)
            .unwrap();

        let buffer = register.get_closure_module();
        let context = Context::create();
        let module = buffer.parse_into(&context).unwrap();
        assert!(module.get_function("make_closure_Lambert").is_some());
        assert!(module.get_function("allocate_closure").is_some());
    }
}
