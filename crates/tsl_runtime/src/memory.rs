//! Closure Memory Arena
//!
//! closure module 声明的宿主分配器 `allocate_closure` 的实现。
//! 每个线程一个 bump 列表，shader 在一帧内构造的 closure tree
//! 由渲染器在帧末统一 `reset_closure_arena` 回收

use std::alloc::{alloc, dealloc, Layout};
use std::cell::RefCell;

// closure 节点含指针字段，统一按 8 字节对齐分配
const CLOSURE_ALIGN: usize = 8;

struct ArenaBlock {
    ptr: *mut u8,
    layout: Layout,
}

thread_local! {
    static CLOSURE_ARENA: RefCell<Vec<ArenaBlock>> = const { RefCell::new(Vec::new()) };
}

/// 分配一个 closure 节点，JIT 代码通过符号名直接调用
///
/// size 为 0 或超出合理范围时返回空指针，shader 侧视为分配失败
#[no_mangle]
pub extern "C" fn allocate_closure(size: u32) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }

    let layout = match Layout::from_size_align(size as usize, CLOSURE_ALIGN) {
        Ok(layout) => layout,
        Err(_) => return std::ptr::null_mut(),
    };

    let ptr = unsafe { alloc(layout) };
    if ptr.is_null() {
        return ptr;
    }

    CLOSURE_ARENA.with(|arena| {
        arena.borrow_mut().push(ArenaBlock { ptr, layout });
    });
    ptr
}

/// 释放当前线程迄今分配的所有 closure 节点
///
/// 调用后先前拿到的所有节点指针立即失效
pub fn reset_closure_arena() {
    CLOSURE_ARENA.with(|arena| {
        for block in arena.borrow_mut().drain(..) {
            unsafe { dealloc(block.ptr, block.layout) };
        }
    });
}

/// 当前线程存活的分配数量
pub fn closure_arena_len() -> usize {
    CLOSURE_ARENA.with(|arena| arena.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_reset() {
        reset_closure_arena();

        let a = allocate_closure(24);
        let b = allocate_closure(16);
        assert!(!a.is_null());
        assert!(!b.is_null());
        assert_ne!(a, b);
        assert_eq!(closure_arena_len(), 2);

        // 对齐满足 closure 节点的指针字段
        assert_eq!(a as usize % 8, 0);
        assert_eq!(b as usize % 8, 0);

        reset_closure_arena();
        assert_eq!(closure_arena_len(), 0);
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(allocate_closure(0).is_null());
    }

    #[test]
    fn test_arena_is_per_thread() {
        reset_closure_arena();
        let _ = allocate_closure(8);

        let other = std::thread::spawn(|| closure_arena_len()).join().unwrap();
        assert_eq!(other, 0);
        assert_eq!(closure_arena_len(), 1);

        reset_closure_arena();
    }
}
