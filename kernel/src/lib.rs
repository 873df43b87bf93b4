//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! Rux 文件映射子系统
//!
//! 进程把文件的一段映射到自己的地址空间：页面在第一次访问时由缺页
//! 处理从文件装入，共享映射的修改在 munmap 时写回文件。
//!
//! - `mm`: 描述符表、缺页装入、munmap、写回、mmap 系统调用
//! - `fs`: 文件、inode 与事务接口
//! - `process`: 进程地址空间视图，fork / exit 时的映射复制与回收

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod errno;
pub mod fs;
pub mod mm;
pub mod process;

#[cfg(test)]
mod tests;
