//! Shader Group
//!
//! shader unit 实例的有向无环图。同一个模板可以用不同实例名挂进
//! 同一个 group；连接、默认值和对外暴露都按实例名记录。
//! 所有校验推迟到 resolve（链接）阶段进行

use crate::shader_unit::{CompileOptions, ShaderUnitTemplate, ShaderValue};
use std::collections::HashMap;
use std::sync::Arc;

/// shader group 模板
pub struct ShaderGroupTemplate {
    name: String,
    /// 实例名 → unit 模板
    pub(crate) units: HashMap<String, Arc<ShaderUnitTemplate>>,
    /// dst 实例 → dst 参数 → (src 实例, src 参数)
    pub(crate) connections: HashMap<String, HashMap<String, (String, String)>>,
    /// 未连接输入的默认字面量
    pub(crate) input_defaults: HashMap<String, HashMap<String, ShaderValue>>,
    /// 暴露为 group 输入/输出的参数：实例 → 参数 → group 参数下标
    pub(crate) exposed_inputs: HashMap<String, HashMap<String, usize>>,
    pub(crate) exposed_outputs: HashMap<String, HashMap<String, usize>>,
    /// 根实例名，resolve 必需
    pub(crate) root_instance_name: String,
    pub(crate) options: CompileOptions,
}

impl ShaderGroupTemplate {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            units: HashMap::new(),
            connections: HashMap::new(),
            input_defaults: HashMap::new(),
            exposed_inputs: HashMap::new(),
            exposed_outputs: HashMap::new(),
            root_instance_name: String::new(),
            options: CompileOptions::default(),
        }
    }

    /// group 名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 以给定实例名加入一个 shader unit
    pub fn add_unit(&mut self, instance_name: &str, template: &Arc<ShaderUnitTemplate>) {
        self.units
            .insert(instance_name.to_string(), template.clone());
    }

    /// 把 src 实例的输出接到 dst 实例的输入
    pub fn connect(&mut self, src_inst: &str, src_arg: &str, dst_inst: &str, dst_arg: &str) {
        self.connections
            .entry(dst_inst.to_string())
            .or_default()
            .insert(
                dst_arg.to_string(),
                (src_inst.to_string(), src_arg.to_string()),
            );
    }

    /// 把一个实例的输入暴露为 group 的第 index 个参数
    pub fn expose_input(&mut self, instance: &str, arg: &str, index: usize) {
        self.exposed_inputs
            .entry(instance.to_string())
            .or_default()
            .insert(arg.to_string(), index);
    }

    /// 把一个实例的输出暴露为 group 的第 index 个参数
    pub fn expose_output(&mut self, instance: &str, arg: &str, index: usize) {
        self.exposed_outputs
            .entry(instance.to_string())
            .or_default()
            .insert(arg.to_string(), index);
    }

    /// 为未连接的输入提供默认值
    pub fn set_default(&mut self, instance: &str, arg: &str, value: ShaderValue) {
        self.input_defaults
            .entry(instance.to_string())
            .or_default()
            .insert(arg.to_string(), value);
    }

    /// 设置根实例
    pub fn set_root(&mut self, instance: &str) {
        self.root_instance_name = instance.to_string();
    }

    /// 覆盖 group 的编译选项
    pub fn set_options(&mut self, options: CompileOptions) {
        self.options = options;
    }
}
