//! shader unit 的端到端测试：编译 → resolve → 调用

use tsl_driver::{CompileOptions, ShadingContext, TslError, TslGlobal};

/// out float 单输出 shader 的调用约定
type OutFloatFn = unsafe extern "C" fn(*mut f32, *mut TslGlobal);
/// in float / out float shader 的调用约定
type InOutFloatFn = unsafe extern "C" fn(f32, *mut f32, *mut TslGlobal);
/// in int / out float shader 的调用约定
type IntOutFloatFn = unsafe extern "C" fn(i32, *mut f32, *mut TslGlobal);

#[test]
fn test_constant_shader() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit("constant", "shader entry(out float o){ o = 3.5; }")
        .unwrap();

    assert_eq!(template.root_function_name(), "entry");
    assert_eq!(template.exposed_arguments().len(), 1);
    assert!(template.exposed_arguments()[0].is_output);

    let instance = context.resolve_shader_unit(&template).unwrap();
    let entry: OutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(&mut output, global.as_mut()) };
    assert_eq!(output, 3.5);
}

#[test]
fn test_repeated_calls_are_bitwise_identical() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit(
            "repeat",
            "shader entry(in float x, out float y){ y = x * 0.1 + 2.7; }",
        )
        .unwrap();
    let instance = context.resolve_shader_unit(&template).unwrap();
    let entry: InOutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut first = 0.0f32;
    let mut second = 0.0f32;
    unsafe {
        entry(1.3, &mut first, global.as_mut());
        entry(1.3, &mut second, global.as_mut());
    }
    assert_eq!(first.to_bits(), second.to_bits());
}

#[test]
fn test_multiple_instances_per_template() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit("twice", "shader entry(in float x, out float y){ y = x * 2.0; }")
        .unwrap();

    // 一个模板可以同时支撑多个实例
    let a = context.resolve_shader_unit(&template).unwrap();
    let b = context.resolve_shader_unit(&template).unwrap();

    let mut global = TslGlobal::empty();
    for instance in [&a, &b] {
        let entry: InOutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };
        let mut output = 0.0f32;
        unsafe { entry(21.0, &mut output, global.as_mut()) };
        assert_eq!(output, 42.0);
    }
}

#[test]
fn test_math_runtime_call() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit("math", "shader entry(in float x, out float y){ y = sqrt(x); }")
        .unwrap();
    let instance = context.resolve_shader_unit(&template).unwrap();
    let entry: InOutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(9.0, &mut output, global.as_mut()) };
    assert_eq!(output, 3.0);
}

#[test]
fn test_global_parameter() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit(
            "scaled",
            r#"
            float scale = 2.5;
            shader entry(in float x, out float y){ y = x * scale; }
            "#,
        )
        .unwrap();
    let instance = context.resolve_shader_unit(&template).unwrap();
    let entry: InOutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(4.0, &mut output, global.as_mut()) };
    assert_eq!(output, 10.0);
}

#[test]
fn test_plain_function_and_control_flow() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit(
            "looped",
            r#"
            float step(float acc, float x){ return acc + x; }
            shader entry(in int n, out float y){
                float acc = 0.0;
                int i = 0;
                while (i < n) {
                    if (i % 2 == 0) {
                        acc = step(acc, 1.0);
                    } else {
                        acc = step(acc, 0.5);
                    }
                    i = i + 1;
                }
                y = acc;
            }
            "#,
        )
        .unwrap();
    let instance = context.resolve_shader_unit(&template).unwrap();
    let entry: IntOutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(4, &mut output, global.as_mut()) };
    // 1.0 + 0.5 + 1.0 + 0.5
    assert_eq!(output, 3.0);
}

#[test]
fn test_struct_and_vector() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit(
            "material",
            r#"
            struct Material { float3 albedo; float roughness; };
            shader entry(out float o){
                Material m;
                m.albedo = float3(0.5, 1.5, 2.5);
                m.roughness = 0.25;
                o = m.albedo.y + m.roughness;
            }
            "#,
        )
        .unwrap();
    let instance = context.resolve_shader_unit(&template).unwrap();
    let entry: OutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };

    let mut global = TslGlobal::empty();
    let mut output = 0.0f32;
    unsafe { entry(&mut output, global.as_mut()) };
    assert_eq!(output, 1.75);
}

#[test]
fn test_optimization_disabled_same_result() {
    let context = ShadingContext::new().unwrap();
    let source = "shader entry(in float x, out float y){ y = (x + 1.0) * (x + 1.0); }";

    let optimized = context.compile_shader_unit("opt_on", source).unwrap();
    let plain = context
        .compile_shader_unit_with_options(
            "opt_off",
            source,
            CompileOptions {
                allow_optimization: false,
                allow_verification: true,
                verbose_parser: false,
            },
        )
        .unwrap();

    let mut global = TslGlobal::empty();
    let mut results = [0.0f32; 2];
    for (i, template) in [optimized, plain].iter().enumerate() {
        let instance = context.resolve_shader_unit(template).unwrap();
        let entry: InOutFloatFn = unsafe { std::mem::transmute(instance.function_pointer()) };
        unsafe { entry(3.0, &mut results[i], global.as_mut()) };
    }
    assert_eq!(results[0], 16.0);
    assert_eq!(results[0].to_bits(), results[1].to_bits());
}

#[test]
fn test_parse_failure() {
    let context = ShadingContext::new().unwrap();
    let result = context.compile_shader_unit("broken", "shader entry(out float o){ o = ; }");
    assert!(matches!(result, Err(TslError::ParseFailed)));
}

#[test]
fn test_codegen_failure_reports_detail() {
    let context = ShadingContext::new().unwrap();
    let result = context.compile_shader_unit(
        "undefined",
        "shader entry(out float o){ o = missing_variable; }",
    );
    match result {
        Err(TslError::CodegenFailed(detail)) => {
            assert!(detail.contains("missing_variable"));
        }
        other => panic!("expected CodegenFailed, got {:?}", other.err()),
    }
}

#[test]
fn test_template_without_shader_root_cannot_resolve() {
    let context = ShadingContext::new().unwrap();
    // 只有普通函数，没有 shader 入口
    let template = context
        .compile_shader_unit("no_root", "float helper(float x){ return x; }")
        .unwrap();
    assert!(template.root_function_name().is_empty());

    let result = context.resolve_shader_unit(&template);
    assert!(matches!(
        result,
        Err(TslError::InvalidShaderGroupTemplate)
    ));
}

#[test]
fn test_shader_argument_defaults_recorded() {
    let context = ShadingContext::new().unwrap();
    let template = context
        .compile_shader_unit(
            "defaults",
            "shader entry(in float x = 2.5, out float y){ y = x; }",
        )
        .unwrap();

    let args = template.exposed_arguments();
    assert_eq!(args.len(), 2);
    assert_eq!(
        args[0].default,
        Some(tsl_driver::ShaderValue::Float(2.5))
    );
    assert!(args[1].default.is_none());
}
