//! 文件系统接口
//!
//! 文件映射子系统依赖的文件抽象：
//! - `inode`: 带锁的字节级读写 (fs/inode.c)
//! - `file`: 引用计数的打开文件 (fs/file.c)
//! - `journal`: 事务括号 (fs/jbd2)

pub mod file;
pub mod inode;
pub mod journal;

pub use file::{file_close, file_dup, File, FileFlags, FileHandle};
pub use inode::{Ino, Inode, InodeIo, MemInode};
pub use journal::{max_write_bytes, Journal, OpLog, Transaction};
