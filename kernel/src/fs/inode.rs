//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 索引节点 (Inode)
//!
//! 文件映射子系统只需要按字节偏移读写文件内容。具体文件系统通过
//! [`InodeIo`] 提供存储，[`Inode`] 用一把互斥锁保证 inode 级别的独占访问：
//! 所有读写都必须先调用 [`Inode::lock`]（对应 ilock/iunlock）。

use alloc::boxed::Box;
use alloc::vec::Vec;
use spin::{Mutex, MutexGuard};

/// Inode 编号类型
pub type Ino = u64;

/// inode 内容的字节级访问
///
/// 调用方必须持有 inode 锁，因此方法接收 `&mut self`。
pub trait InodeIo: Send {
    /// 从 `off` 开始读取，返回实际读取的字节数（到达文件末尾时可能不足）
    fn read_at(&mut self, off: u64, dst: &mut [u8]) -> usize;

    /// 从 `off` 开始写入，返回实际写入的字节数
    fn write_at(&mut self, off: u64, src: &[u8]) -> usize;

    /// 文件大小（字节）
    fn size(&self) -> u64;
}

/// 索引节点
pub struct Inode {
    ino: Ino,
    io: Mutex<Box<dyn InodeIo>>,
}

impl Inode {
    pub fn new(ino: Ino, io: impl InodeIo + 'static) -> Self {
        Self {
            ino,
            io: Mutex::new(Box::new(io)),
        }
    }

    pub fn ino(&self) -> Ino {
        self.ino
    }

    /// 获取 inode 锁，守卫释放时自动解锁
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn InodeIo>> {
        self.io.lock()
    }
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inode").field("ino", &self.ino).finish()
    }
}

/// 内存文件（ramfs 风格）
///
/// `max_size` 模拟文件系统的最大文件长度：超出部分的写入被截断，
/// 调用方会看到短写。
pub struct MemInode {
    data: Vec<u8>,
    max_size: usize,
}

impl MemInode {
    pub fn new(max_size: usize) -> Self {
        Self {
            data: Vec::new(),
            max_size,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            max_size: usize::MAX,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

impl InodeIo for MemInode {
    fn read_at(&mut self, off: u64, dst: &mut [u8]) -> usize {
        let off = off as usize;
        if off >= self.data.len() {
            return 0;
        }
        let n = core::cmp::min(dst.len(), self.data.len() - off);
        dst[..n].copy_from_slice(&self.data[off..off + n]);
        n
    }

    fn write_at(&mut self, off: u64, src: &[u8]) -> usize {
        let off = off as usize;
        if off >= self.max_size {
            return 0;
        }
        let n = core::cmp::min(src.len(), self.max_size - off);
        if self.data.len() < off + n {
            self.data.resize(off + n, 0);
        }
        self.data[off..off + n].copy_from_slice(&src[..n]);
        n
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_read_at_eof() {
        let inode = Inode::new(1, MemInode::from_bytes(b"hello"));
        let mut buf = [0xffu8; 8];
        let n = inode.lock().read_at(3, &mut buf);
        assert_eq!(n, 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(inode.lock().read_at(5, &mut buf), 0);
    }

    #[test]
    fn test_write_extends_file() {
        let inode = Inode::new(2, MemInode::new(64));
        assert_eq!(inode.lock().write_at(4, b"abc"), 3);
        assert_eq!(inode.lock().size(), 7);

        let mut buf = [0xffu8; 7];
        inode.lock().read_at(0, &mut buf);
        assert_eq!(&buf, b"\0\0\0\0abc");
    }

    #[test]
    fn test_write_truncated_at_max_size() {
        let inode = Inode::new(3, MemInode::new(10));
        assert_eq!(inode.lock().write_at(8, b"abcd"), 2);
        assert_eq!(inode.lock().write_at(10, b"x"), 0);
        assert_eq!(inode.lock().size(), 10);
    }
}
