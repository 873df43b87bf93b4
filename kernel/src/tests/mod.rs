//! 场景测试
//!
//! 使用内存实现的页帧池、软件页表、内存文件与计数日志，在主机上运行
//! 完整的 mmap / 缺页 / munmap / fork / exit 流程：
//! ```bash
//! cargo test -p rux-mmap
//! ```


use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use crate::fs::{File, FileFlags, FileHandle, Inode, MemInode, OpLog};
use crate::mm::pagemap::{PageMapper, SoftPageTable};
use crate::mm::{FrameArena, VirtAddr, VmContext, VmaTable};
use crate::process::Process;

/// 一次测试用到的内核资源
pub struct Fixture {
    pub frames: Arc<FrameArena>,
    pub table: VmaTable,
    pub journal: OpLog,
}

impl Fixture {
    pub fn new(nframes: usize, nvma: usize) -> Self {
        Self {
            frames: Arc::new(FrameArena::new(nframes)),
            table: VmaTable::new(nvma),
            journal: OpLog::new(),
        }
    }

    pub fn ctx(&self) -> VmContext<'_> {
        VmContext::new(&self.table, &*self.frames, &self.journal)
    }

    pub fn process(&self, pid: u32) -> Process<SoftPageTable> {
        Process::new(pid, SoftPageTable::new(Arc::clone(&self.frames)))
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new(64, 8)
    }
}

/// 可辨认的文件内容：每个字节由其偏移决定
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn open_file(inode: MemInode, flags: u32) -> FileHandle {
    File::open(Arc::new(Inode::new(1, inode)), FileFlags::new(flags))
}

pub fn rw_file(bytes: &[u8]) -> FileHandle {
    open_file(MemInode::from_bytes(bytes), FileFlags::O_RDWR)
}

/// 读出整个文件内容
pub fn file_contents(file: &FileHandle) -> Vec<u8> {
    let size = file.inode().lock().size() as usize;
    let mut buf = vec![0u8; size];
    file.read_at(0, &mut buf);
    buf
}

pub fn read_user<P: PageMapper>(proc: &Process<P>, addr: VirtAddr, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    proc.page_table.copy_from_user(addr, &mut buf).unwrap();
    buf
}

pub fn write_user<P: PageMapper>(proc: &mut Process<P>, addr: VirtAddr, data: &[u8]) {
    proc.page_table.copy_to_user(addr, data).unwrap();
}
