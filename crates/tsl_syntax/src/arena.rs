//! AST Memory Arena
//!
//! 线程本地的 region 栈，管理一次编译期间所有顶层 AST 节点的生命周期。
//! 节点通过稳定索引（`DeclHandle`）访问而不是裸指针；region 弹出时
//! 其拥有的全部节点一起释放。模板要在编译结束后保留 AST 根节点时，
//! 用 `take_decl` 把所有权从 region 转移出去。

use crate::ast::Decl;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

thread_local! {
    static REGION_STACK: RefCell<Vec<Region>> = const { RefCell::new(Vec::new()) };
    static REGION_SERIAL: Cell<u64> = const { Cell::new(0) };
}

struct Region {
    serial: u64,
    nodes: Vec<Option<Decl>>,
}

/// 非拥有的节点句柄
///
/// 只在分配它的线程上、且对应 region 还在栈上时有效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclHandle {
    serial: u64,
    index: u32,
}

/// 编译 region 的 RAII guard
///
/// 构造时压入一个新 region，drop 时弹出并释放其中所有节点。
/// 同一线程上可以嵌套（嵌套编译各自持有自己的 region）
pub struct AstRegionGuard {
    serial: u64,
    // region 栈是线程本地的，guard 不允许跨线程移动
    _not_send: PhantomData<*const ()>,
}

impl AstRegionGuard {
    /// 进入一个新的编译 region
    pub fn enter() -> Self {
        let serial = REGION_SERIAL.with(|s| {
            let serial = s.get() + 1;
            s.set(serial);
            serial
        });
        REGION_STACK.with(|stack| {
            stack.borrow_mut().push(Region {
                serial,
                nodes: Vec::new(),
            });
        });
        Self {
            serial,
            _not_send: PhantomData,
        }
    }
}

impl Drop for AstRegionGuard {
    fn drop(&mut self) {
        REGION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.last().map(|r| r.serial),
                Some(self.serial),
                "compile regions must unwind in LIFO order"
            );
            stack.pop();
        });
    }
}

/// 把一个 AST 节点的所有权交给栈顶 region，返回其句柄
///
/// # Panics
///
/// 当前线程没有活动 region 时 panic：节点必须在
/// `AstRegionGuard` 的生命周期内分配
pub fn alloc_decl(decl: Decl) -> DeclHandle {
    REGION_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let region = stack
            .last_mut()
            .expect("AST node allocated outside of a compile region");
        let index = region.nodes.len() as u32;
        region.nodes.push(Some(decl));
        DeclHandle {
            serial: region.serial,
            index,
        }
    })
}

/// 非拥有访问：句柄对应的节点仍被栈上某个 region 持有时调用 `f`
///
/// 这是原始实现中 raw-pointer → shared_ptr 查找的索引版
pub fn with_decl<R>(handle: DeclHandle, f: impl FnOnce(&Decl) -> R) -> Option<R> {
    REGION_STACK.with(|stack| {
        let stack = stack.borrow();
        let region = stack.iter().find(|r| r.serial == handle.serial)?;
        let node = region.nodes.get(handle.index as usize)?.as_ref()?;
        Some(f(node))
    })
}

/// 把节点所有权从 region 转移出去
///
/// 之后同一句柄的 `with_decl` / `take_decl` 都返回 None
pub fn take_decl(handle: DeclHandle) -> Option<Decl> {
    REGION_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let region = stack.iter_mut().find(|r| r.serial == handle.serial)?;
        region.nodes.get_mut(handle.index as usize)?.take()
    })
}
