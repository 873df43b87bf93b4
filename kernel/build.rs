//! Rux 文件映射子系统构建脚本
//!
//! 这个脚本在编译前运行，负责：
//! 1. 解析 Kernel.toml（或 menuconfig 生成的 build/.config）
//! 2. 生成配置常量到 OUT_DIR/config.rs，由 src/config.rs 引入

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;

/// 解析 build/.config 文件（简单 section_key=value 格式）
fn parse_dot_config(content: &str) -> toml::Value {
    let mut sections: HashMap<String, toml::map::Map<String, toml::Value>> = HashMap::new();

    for line in content.lines() {
        let line = line.trim();

        // 跳过注释和空行
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();

        // 使用第一个下划线分割 section 和 key
        let Some((section, config_key)) = key.trim().split_once('_') else {
            continue;
        };

        let parsed_value = if value == "true" {
            toml::Value::Boolean(true)
        } else if value == "false" {
            toml::Value::Boolean(false)
        } else if let Ok(int_val) = parse_int(value) {
            toml::Value::Integer(int_val)
        } else {
            toml::Value::String(value.trim_matches('"').to_string())
        };

        sections
            .entry(section.to_string())
            .or_default()
            .insert(config_key.to_string(), parsed_value);
    }

    let mut root_map = toml::map::Map::new();
    for (section_name, section_data) in sections {
        root_map.insert(section_name, toml::Value::Table(section_data));
    }
    toml::Value::Table(root_map)
}

/// 支持十进制与 0x 前缀的十六进制
fn parse_int(value: &str) -> Result<i64, std::num::ParseIntError> {
    match value.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(&hex.replace('_', ""), 16),
        None => value.replace('_', "").parse::<i64>(),
    }
}

fn get_int(config: &toml::Value, section: &str, key: &str, default: i64) -> i64 {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_integer())
        .unwrap_or(default)
}

fn get_str<'a>(config: &'a toml::Value, section: &str, key: &str, default: &'a str) -> &'a str {
    config
        .get(section)
        .and_then(|s| s.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or(default)
}

fn main() {
    println!("cargo:rerun-if-changed=../Kernel.toml");
    println!("cargo:rerun-if-changed=../build/.config");

    // 优先读取 build/.config（menuconfig 生成的配置），其次 Kernel.toml
    let config = if let Ok(content) = fs::read_to_string("../build/.config") {
        println!("cargo:warning=Using build/.config configuration");
        parse_dot_config(&content)
    } else if let Ok(content) = fs::read_to_string("../Kernel.toml") {
        toml::from_str(&content).expect("Kernel.toml 解析失败")
    } else {
        // 没有配置文件时全部使用默认值
        toml::Value::Table(toml::map::Map::new())
    };

    generate_config_code(&config);
}

fn generate_config_code(config: &toml::Value) {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR 未设置"));

    let page_size = get_int(config, "memory", "page_size", 4096);
    assert!(
        page_size > 0 && (page_size & (page_size - 1)) == 0,
        "memory.page_size 必须是 2 的幂"
    );

    let nvma = get_int(config, "vma", "nvma", 100);
    let novma = get_int(config, "vma", "novma", 16);
    let mmap_base = get_int(config, "vma", "mmap_base", 0x2000_0000);
    let mmap_top = get_int(config, "vma", "mmap_top", 0x3f_0000_0000);
    assert!(nvma > 0 && novma > 0, "vma.nvma 与 vma.novma 必须大于 0");
    assert!(mmap_base < mmap_top, "vma.mmap_base 必须小于 vma.mmap_top");

    let maxopblocks = get_int(config, "fs", "maxopblocks", 10);
    let bsize = get_int(config, "fs", "bsize", 1024);
    assert!(maxopblocks > 5, "fs.maxopblocks 过小，无法容纳写回数据块");

    let config_code = format!(
        r#"// Rux 文件映射子系统配置（自动生成）
//
// 此文件由 build.rs 根据 Kernel.toml 自动生成，请勿手动修改

/// 内核名称
pub const KERNEL_NAME: &str = "{name}";

/// 内核版本
pub const KERNEL_VERSION: &str = "{version}";

/// 页大小
pub const PAGE_SIZE: usize = {page_size};

/// 页大小位移
pub const PAGE_SHIFT: usize = {page_shift};

/// 全局 VMA 描述符表容量
pub const NVMA: usize = {nvma};

/// 每个进程的映射表容量
pub const NOVMA: usize = {novma};

/// mmap 区间下界
pub const MMAP_BASE: usize = {mmap_base:#x};

/// mmap 区间上界（不包含）
pub const MMAP_TOP: usize = {mmap_top:#x};

/// 单个事务可写的最大块数
pub const MAXOPBLOCKS: usize = {maxopblocks};

/// 文件系统块大小
pub const BSIZE: usize = {bsize};
"#,
        name = get_str(config, "general", "name", "Rux"),
        version = get_str(config, "general", "version", "0.1.0"),
        page_size = page_size,
        page_shift = page_size.trailing_zeros(),
        nvma = nvma,
        novma = novma,
        mmap_base = mmap_base,
        mmap_top = mmap_top,
        maxopblocks = maxopblocks,
        bsize = bsize,
    );

    let config_file = out_dir.join("config.rs");

    // 只有内容变化时才写入，避免每次编译都更新文件时间戳
    let existing_content = fs::read_to_string(&config_file).unwrap_or_default();
    if existing_content != config_code {
        fs::write(&config_file, &config_code).expect("写入配置文件失败");
    }
}
