//! shader group 的链接与端到端测试

use tsl_driver::{ShaderValue, ShadingContext, TslError, TslGlobal};

/// group wrapper: 一个 float 输入 + 一个 float 输出 + tsl_global*
type GroupFn = unsafe extern "C" fn(f32, *mut f32, *mut TslGlobal);
/// 单输出 wrapper
type OutOnlyFn = unsafe extern "C" fn(*mut f32, *mut TslGlobal);
/// in float / out float 的 shader unit
type InOutFloatFn = unsafe extern "C" fn(f32, *mut f32, *mut TslGlobal);

const MUL2: &str = "shader mul2(in float x, out float y){ y = x * 2.0; }";
const ADD3: &str = "shader add3(in float x, out float y){ y = x + 3.0; }";

#[test]
fn test_group_wiring() {
    let context = ShadingContext::new().unwrap();
    let mul2 = context.compile_shader_unit("mul2", MUL2).unwrap();
    let add3 = context.compile_shader_unit("add3", ADD3).unwrap();

    let mut group = context.make_shader_group("pipeline");
    group.add_unit("mul2", &mul2);
    group.add_unit("add3", &add3);
    group.connect("mul2", "y", "add3", "x");
    group.expose_input("mul2", "x", 0);
    group.expose_output("add3", "y", 1);
    group.set_root("add3");

    let wrapper = context.resolve_shader_group(&group).unwrap();
    assert_eq!(wrapper.root_function_name(), "pipeline_shader_wrapper");
    assert_eq!(wrapper.exposed_arguments().len(), 2);

    let instance = context.resolve_shader_unit(&wrapper).unwrap();
    let entry: GroupFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(4.0, &mut output, global.as_mut()) };
    // (4 * 2) + 3
    assert_eq!(output, 11.0);
}

#[test]
fn test_default_injection() {
    let context = ShadingContext::new().unwrap();
    let mul2 = context.compile_shader_unit("mul2", MUL2).unwrap();
    let add3 = context.compile_shader_unit("add3", ADD3).unwrap();

    // 与 test_group_wiring 相同，但去掉连接，给 add3.x 默认值
    let mut group = context.make_shader_group("defaulted");
    group.add_unit("mul2", &mul2);
    group.add_unit("add3", &add3);
    group.expose_input("mul2", "x", 0);
    group.expose_output("add3", "y", 1);
    group.set_default("add3", "x", ShaderValue::Float(7.0));
    group.set_root("add3");

    let wrapper = context.resolve_shader_group(&group).unwrap();
    let instance = context.resolve_shader_unit(&wrapper).unwrap();
    let entry: GroupFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(4.0, &mut output, global.as_mut()) };
    // 默认值 7 + 3，mul2 不在根的依赖里不会被调用
    assert_eq!(output, 10.0);
}

#[test]
fn test_cycle_rejected() {
    let context = ShadingContext::new().unwrap();
    let forward = context
        .compile_shader_unit("forward", "shader f(in float x, out float y){ y = x; }")
        .unwrap();

    let mut group = context.make_shader_group("cyclic");
    group.add_unit("f1", &forward);
    group.add_unit("f2", &forward);
    group.connect("f1", "y", "f2", "x");
    group.connect("f2", "y", "f1", "x");
    group.set_root("f1");

    let result = context.resolve_shader_group(&group);
    assert!(matches!(result, Err(TslError::ShaderGroupWithCycles)));
}

#[test]
fn test_self_connection_rejected() {
    let context = ShadingContext::new().unwrap();
    let forward = context
        .compile_shader_unit("forward", "shader f(in float x, out float y){ y = x; }")
        .unwrap();

    let mut group = context.make_shader_group("self_loop");
    group.add_unit("f1", &forward);
    group.connect("f1", "y", "f1", "x");
    group.set_root("f1");

    assert!(matches!(
        context.resolve_shader_group(&group),
        Err(TslError::ShaderGroupWithCycles)
    ));
}

#[test]
fn test_single_unit_group_matches_direct_call() {
    let context = ShadingContext::new().unwrap();
    let mul2 = context.compile_shader_unit("mul2", MUL2).unwrap();

    // 直接调用 unit
    let direct_instance = context.resolve_shader_unit(&mul2).unwrap();
    let direct: InOutFloatFn =
        unsafe { std::mem::transmute(direct_instance.function_pointer()) };

    // 只有暴露输入输出、没有连接的单元素 group
    let mut group = context.make_shader_group("lone");
    group.add_unit("mul2", &mul2);
    group.expose_input("mul2", "x", 0);
    group.expose_output("mul2", "y", 1);
    group.set_root("mul2");

    let wrapper = context.resolve_shader_group(&group).unwrap();
    let group_instance = context.resolve_shader_unit(&wrapper).unwrap();
    let wrapped: GroupFn = unsafe { std::mem::transmute(group_instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    for x in [0.0f32, 1.5, -4.25, 1000.0] {
        let mut direct_out = 0.0f32;
        let mut wrapped_out = 0.0f32;
        unsafe {
            direct(x, &mut direct_out, global.as_mut());
            wrapped(x, &mut wrapped_out, global.as_mut());
        }
        assert_eq!(direct_out.to_bits(), wrapped_out.to_bits());
    }
}

#[test]
fn test_root_without_dependencies_forwards_arguments() {
    let context = ShadingContext::new().unwrap();
    let constant = context
        .compile_shader_unit("lone_const", "shader c(out float o){ o = 1.25; }")
        .unwrap();

    let mut group = context.make_shader_group("forwarding");
    group.add_unit("c", &constant);
    group.expose_output("c", "o", 0);
    group.set_root("c");

    let wrapper = context.resolve_shader_group(&group).unwrap();
    let instance = context.resolve_shader_unit(&wrapper).unwrap();
    let entry: OutOnlyFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(&mut output, global.as_mut()) };
    assert_eq!(output, 1.25);
}

#[test]
fn test_argument_without_initialization() {
    let context = ShadingContext::new().unwrap();
    let add3 = context.compile_shader_unit("add3", ADD3).unwrap();

    let mut group = context.make_shader_group("uninitialized");
    group.add_unit("add3", &add3);
    group.expose_output("add3", "y", 0);
    group.set_root("add3");

    match context.resolve_shader_group(&group) {
        Err(TslError::ArgumentWithoutInitialization {
            group,
            instance,
            argument,
        }) => {
            assert_eq!(group, "uninitialized");
            assert_eq!(instance, "add3");
            assert_eq!(argument, "x");
        }
        other => panic!("expected ArgumentWithoutInitialization, got {:?}", other.err()),
    }
}

#[test]
fn test_missing_root() {
    let context = ShadingContext::new().unwrap();
    let mul2 = context.compile_shader_unit("mul2", MUL2).unwrap();

    // 没设置根
    let mut group = context.make_shader_group("rootless");
    group.add_unit("mul2", &mul2);
    assert!(matches!(
        context.resolve_shader_group(&group),
        Err(TslError::ShaderGroupWithoutRoot)
    ));

    // 根不在 units 里
    group.set_root("ghost");
    assert!(matches!(
        context.resolve_shader_group(&group),
        Err(TslError::ShaderGroupWithoutRoot)
    ));
}

#[test]
fn test_undefined_shader_unit_in_connection() {
    let context = ShadingContext::new().unwrap();
    let add3 = context.compile_shader_unit("add3", ADD3).unwrap();

    let mut group = context.make_shader_group("dangling");
    group.add_unit("add3", &add3);
    group.connect("ghost", "y", "add3", "x");
    group.expose_output("add3", "y", 0);
    group.set_root("add3");

    assert!(matches!(
        context.resolve_shader_group(&group),
        Err(TslError::UndefinedShaderUnit(name)) if name == "ghost"
    ));
}

#[test]
fn test_type_mismatch_connection() {
    let context = ShadingContext::new().unwrap();
    let float_out = context
        .compile_shader_unit("float_out", "shader fo(out float y){ y = 1.0; }")
        .unwrap();
    let int_in = context
        .compile_shader_unit("int_in", "shader ii(in int x, out int y){ y = x; }")
        .unwrap();

    let mut group = context.make_shader_group("mismatched");
    group.add_unit("fo", &float_out);
    group.add_unit("ii", &int_in);
    group.connect("fo", "y", "ii", "x");
    group.expose_output("ii", "y", 0);
    group.set_root("ii");

    assert!(matches!(
        context.resolve_shader_group(&group),
        Err(TslError::InvalidArgType)
    ));
}

#[test]
fn test_expose_wrong_direction() {
    let context = ShadingContext::new().unwrap();
    let mul2 = context.compile_shader_unit("mul2", MUL2).unwrap();

    // 把输出参数暴露成 group 输入
    let mut group = context.make_shader_group("backwards");
    group.add_unit("mul2", &mul2);
    group.expose_input("mul2", "y", 0);
    group.set_default("mul2", "x", ShaderValue::Float(1.0));
    group.set_root("mul2");

    assert!(matches!(
        context.resolve_shader_group(&group),
        Err(TslError::InvalidArgType)
    ));
}

#[test]
fn test_shared_template_under_two_instance_names() {
    let context = ShadingContext::new().unwrap();
    let mul2 = context.compile_shader_unit("mul2", MUL2).unwrap();

    // 同一个模板两个实例串联: x * 2 * 2
    let mut group = context.make_shader_group("chained");
    group.add_unit("first", &mul2);
    group.add_unit("second", &mul2);
    group.connect("first", "y", "second", "x");
    group.expose_input("first", "x", 0);
    group.expose_output("second", "y", 1);
    group.set_root("second");

    let wrapper = context.resolve_shader_group(&group).unwrap();
    let instance = context.resolve_shader_unit(&wrapper).unwrap();
    let entry: GroupFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(3.0, &mut output, global.as_mut()) };
    assert_eq!(output, 12.0);
}
