//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 编译期配置
//!
//! 常量由 build.rs 根据工作区根目录下的 Kernel.toml 生成

include!(concat!(env!("OUT_DIR"), "/config.rs"));
