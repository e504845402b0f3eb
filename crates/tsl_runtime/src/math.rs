//! Math Runtime Symbols
//!
//! global module 为 shader 声明的 math 原型在这里落地。
//! 名字带 `tsl_` 前缀避免与宿主进程链接的 libm 符号冲突

use crate::memory::allocate_closure;

#[no_mangle]
pub extern "C" fn tsl_sin(x: f32) -> f32 {
    x.sin()
}

#[no_mangle]
pub extern "C" fn tsl_cos(x: f32) -> f32 {
    x.cos()
}

#[no_mangle]
pub extern "C" fn tsl_tan(x: f32) -> f32 {
    x.tan()
}

#[no_mangle]
pub extern "C" fn tsl_sqrt(x: f32) -> f32 {
    x.sqrt()
}

#[no_mangle]
pub extern "C" fn tsl_pow(x: f32, y: f32) -> f32 {
    x.powf(y)
}

#[no_mangle]
pub extern "C" fn tsl_abs(x: f32) -> f32 {
    x.abs()
}

#[no_mangle]
pub extern "C" fn tsl_floor(x: f32) -> f32 {
    x.floor()
}

/// 默认的宿主符号表：math 库加 closure 分配器
///
/// shading context 启动时注入执行引擎的符号解析器
pub fn default_host_symbols() -> Vec<(&'static str, usize)> {
    vec![
        ("tsl_sin", tsl_sin as usize),
        ("tsl_cos", tsl_cos as usize),
        ("tsl_tan", tsl_tan as usize),
        ("tsl_sqrt", tsl_sqrt as usize),
        ("tsl_pow", tsl_pow as usize),
        ("tsl_abs", tsl_abs as usize),
        ("tsl_floor", tsl_floor as usize),
        ("allocate_closure", allocate_closure as usize),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_matches_std() {
        assert_eq!(tsl_sqrt(9.0), 3.0);
        assert_eq!(tsl_abs(-2.5), 2.5);
        assert_eq!(tsl_floor(1.75), 1.0);
        assert_eq!(tsl_pow(2.0, 10.0), 1024.0);
    }

    #[test]
    fn test_default_symbols_complete() {
        let symbols = default_host_symbols();
        assert!(symbols.iter().any(|(n, _)| *n == "allocate_closure"));
        assert!(symbols.iter().any(|(n, _)| *n == "tsl_sin"));
        assert!(symbols.iter().all(|(_, addr)| *addr != 0));
    }
}
