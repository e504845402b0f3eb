//! Closure Tree ABI
//!
//! closure tree 节点的线格式。JIT 生成的代码按同样的布局读写这些
//! 结构，任何字段或对齐的变化都会同时破坏两侧，所以尺寸在编译期
//! 直接断言

use std::mem::size_of;

/// closure 类型 ID
///
/// 0 保留为非法值，-1/-2 保留给 ADD/MUL 节点；用户 closure 从 1 开始
/// 按注册顺序紧密分配。ID 在进程重启之间不保证稳定
pub type ClosureID = i32;

pub const INVALID_CLOSURE_ID: ClosureID = 0;
pub const CLOSURE_ADD: ClosureID = -1;
pub const CLOSURE_MUL: ClosureID = -2;

/// 所有 closure 节点的公共头
#[repr(C)]
#[derive(Debug)]
pub struct ClosureTreeNodeBase {
    pub id: ClosureID,
}

/// 两棵子树相加
#[repr(C)]
#[derive(Debug)]
pub struct ClosureTreeNodeAdd {
    pub id: ClosureID,
    pub closure0: *mut ClosureTreeNodeBase,
    pub closure1: *mut ClosureTreeNodeBase,
}

/// 子树乘以标量权重
#[repr(C)]
#[derive(Debug)]
pub struct ClosureTreeNodeMul {
    pub id: ClosureID,
    pub weight: f32,
    pub closure: *mut ClosureTreeNodeBase,
}

impl ClosureTreeNodeBase {
    /// 按 ADD 节点重新解释
    ///
    /// # Safety
    /// 调用方必须保证 `self.id == CLOSURE_ADD`
    pub unsafe fn as_add_node(&self) -> &ClosureTreeNodeAdd {
        &*(self as *const Self as *const ClosureTreeNodeAdd)
    }

    /// 按 MUL 节点重新解释
    ///
    /// # Safety
    /// 调用方必须保证 `self.id == CLOSURE_MUL`
    pub unsafe fn as_mul_node(&self) -> &ClosureTreeNodeMul {
        &*(self as *const Self as *const ClosureTreeNodeMul)
    }
}

// 布局必须与 LLVM 侧声明的结构逐字节一致，否则 JIT 写宿主读会错位
const _: () = assert!(size_of::<ClosureTreeNodeBase>() == size_of::<ClosureID>());
#[cfg(target_pointer_width = "64")]
const _: () = assert!(
    size_of::<ClosureTreeNodeAdd>()
        == size_of::<ClosureID>() + 4 + size_of::<*mut ClosureTreeNodeBase>() * 2
);
#[cfg(target_pointer_width = "64")]
const _: () = assert!(
    size_of::<ClosureTreeNodeMul>()
        == size_of::<ClosureID>() + size_of::<f32>() + size_of::<*mut ClosureTreeNodeBase>()
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::offset_of;

    #[test]
    fn test_node_field_offsets() {
        assert_eq!(offset_of!(ClosureTreeNodeAdd, id), 0);
        assert_eq!(offset_of!(ClosureTreeNodeAdd, closure0), 8);
        assert_eq!(offset_of!(ClosureTreeNodeAdd, closure1), 16);

        assert_eq!(offset_of!(ClosureTreeNodeMul, id), 0);
        assert_eq!(offset_of!(ClosureTreeNodeMul, weight), 4);
        assert_eq!(offset_of!(ClosureTreeNodeMul, closure), 8);
    }

    #[test]
    fn test_reinterpret_add() {
        let mut add = ClosureTreeNodeAdd {
            id: CLOSURE_ADD,
            closure0: std::ptr::null_mut(),
            closure1: std::ptr::null_mut(),
        };
        let base = &mut add as *mut ClosureTreeNodeAdd as *mut ClosureTreeNodeBase;
        let base = unsafe { &*base };
        assert_eq!(base.id, CLOSURE_ADD);
        let add_again = unsafe { base.as_add_node() };
        assert!(add_again.closure0.is_null());
    }
}
