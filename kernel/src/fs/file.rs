//! 文件对象
//!
//! 对应 Linux 的 `struct file`。打开的文件通过 [`FileHandle`]（`Arc<File>`）
//! 引用计数：[`file_dup`] 增加一个引用，[`file_close`] 释放一个引用，
//! 最后一个引用释放时文件对象随之销毁。

use alloc::sync::Arc;
use log::trace;

use super::inode::Inode;

/// 文件标志位
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileFlags(u32);

impl FileFlags {
    pub const O_RDONLY: u32 = 0o00000000;
    pub const O_WRONLY: u32 = 0o00000001;
    pub const O_RDWR: u32 = 0o00000002;
    pub const O_ACCMODE: u32 = 0o00000003;

    pub fn new(flags: u32) -> Self {
        Self(flags)
    }

    pub fn is_readonly(&self) -> bool {
        (self.0 & Self::O_ACCMODE) == Self::O_RDONLY
    }

    pub fn is_writeonly(&self) -> bool {
        (self.0 & Self::O_ACCMODE) == Self::O_WRONLY
    }

    pub fn is_rdwr(&self) -> bool {
        (self.0 & Self::O_ACCMODE) == Self::O_RDWR
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// 打开的文件
pub struct File {
    flags: FileFlags,
    inode: Arc<Inode>,
}

/// 引用计数的文件句柄
pub type FileHandle = Arc<File>;

impl File {
    pub fn open(inode: Arc<Inode>, flags: FileFlags) -> FileHandle {
        Arc::new(Self { flags, inode })
    }

    pub fn flags(&self) -> FileFlags {
        self.flags
    }

    pub fn readable(&self) -> bool {
        !self.flags.is_writeonly()
    }

    pub fn writable(&self) -> bool {
        self.flags.is_writeonly() || self.flags.is_rdwr()
    }

    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    /// 持 inode 锁从 `off` 读取，返回实际读取的字节数
    pub fn read_at(&self, off: u64, dst: &mut [u8]) -> usize {
        let mut ip = self.inode.lock();
        ip.read_at(off, dst)
    }
}

impl core::fmt::Debug for File {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("File")
            .field("flags", &self.flags)
            .field("inode", &self.inode)
            .finish()
    }
}

/// 复制文件引用（filedup）
pub fn file_dup(file: &FileHandle) -> FileHandle {
    let dup = Arc::clone(file);
    trace!("file: dup ino={} refs={}", file.inode.ino(), Arc::strong_count(file));
    dup
}

/// 释放文件引用（fileclose）
pub fn file_close(file: FileHandle) {
    trace!(
        "file: close ino={} refs={}",
        file.inode.ino(),
        Arc::strong_count(&file) - 1
    );
    drop(file);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::inode::MemInode;

    fn open(flags: u32) -> FileHandle {
        File::open(
            Arc::new(Inode::new(7, MemInode::from_bytes(b"data"))),
            FileFlags::new(flags),
        )
    }

    #[test]
    fn test_access_mode() {
        let ro = open(FileFlags::O_RDONLY);
        assert!(ro.readable() && !ro.writable());

        let wo = open(FileFlags::O_WRONLY);
        assert!(!wo.readable() && wo.writable());

        let rw = open(FileFlags::O_RDWR);
        assert!(rw.readable() && rw.writable());
    }

    #[test]
    fn test_dup_and_close_refcount() {
        let file = open(FileFlags::O_RDWR);
        let dup = file_dup(&file);
        assert_eq!(Arc::strong_count(&file), 2);

        file_close(file);
        assert_eq!(Arc::strong_count(&dup), 1);

        let mut buf = [0u8; 4];
        assert_eq!(dup.read_at(0, &mut buf), 4);
        assert_eq!(&buf, b"data");
    }
}
