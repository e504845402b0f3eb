//! Module Buffer
//!
//! 跨 LLVM Context 共享模块的载体：模块序列化为 bitcode 字节，
//! 需要时再解析进目标 Context。解析是输入的纯函数，同一份 buffer
//! 可以被任意多个执行引擎各自"克隆"一份

use inkwell::context::Context;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;
use std::sync::Arc;

/// 序列化的 LLVM 模块快照
#[derive(Debug, Clone)]
pub struct ModuleBuffer {
    name: String,
    bitcode: Arc<Vec<u8>>,
}

impl ModuleBuffer {
    /// 把一个模块冻结为 bitcode 快照，原模块不受影响
    pub fn from_module(module: &Module) -> Self {
        let name = module
            .get_name()
            .to_str()
            .unwrap_or("tsl_module")
            .to_string();
        let bitcode = module.write_bitcode_to_memory().as_slice().to_vec();
        Self {
            name,
            bitcode: Arc::new(bitcode),
        }
    }

    /// 模块名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// bitcode 字节数
    pub fn len(&self) -> usize {
        self.bitcode.len()
    }

    /// 是否为空快照
    pub fn is_empty(&self) -> bool {
        self.bitcode.is_empty()
    }

    /// 在目标 Context 中重建模块（逻辑上的 CloneModule）
    pub fn parse_into<'ctx>(&self, context: &'ctx Context) -> Result<Module<'ctx>, String> {
        let buffer = MemoryBuffer::create_from_memory_range_copy(&self.bitcode, &self.name);
        Module::parse_bitcode_from_buffer(&buffer, context).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_across_contexts() {
        let src_context = Context::create();
        let module = src_context.create_module("probe");
        let fn_type = src_context.f32_type().fn_type(&[], false);
        module.add_function("probe_fn", fn_type, None);

        let buffer = ModuleBuffer::from_module(&module);
        assert_eq!(buffer.name(), "probe");
        assert!(!buffer.is_empty());

        // 原模块仍然可用，快照可在别的 context 中重建
        assert!(module.get_function("probe_fn").is_some());

        let dst_context = Context::create();
        let cloned = buffer.parse_into(&dst_context).unwrap();
        assert!(cloned.get_function("probe_fn").is_some());
    }

    #[test]
    fn test_parse_twice_is_independent() {
        let src_context = Context::create();
        let module = src_context.create_module("m");
        let buffer = ModuleBuffer::from_module(&module);

        let c1 = Context::create();
        let c2 = Context::create();
        assert!(buffer.parse_into(&c1).is_ok());
        assert!(buffer.parse_into(&c2).is_ok());
    }
}
