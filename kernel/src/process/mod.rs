//! 进程管理模块
//!
//! 文件映射子系统只关心进程的两部分状态：
//! - 页表：缺页时安装、munmap 时移除
//! - 映射表：进程持有的描述符句柄
//!
//! `fork` / `exit` 分别复制与回收进程的映射表。

pub mod exit;
pub mod fork;

use crate::mm::pagemap::PageMapper;
use crate::mm::vma::VmaList;

pub use exit::exit_mmaps;
pub use fork::copy_mmaps;

/// 进程 ID 类型
pub type Pid = u32;

/// 进程的地址空间视图
pub struct Process<P: PageMapper> {
    pid: Pid,

    /// 用户页表
    pub page_table: P,

    /// 文件映射表，只由进程自己修改
    pub mmaps: VmaList,
}

impl<P: PageMapper> Process<P> {
    pub fn new(pid: Pid, page_table: P) -> Self {
        Self {
            pid,
            page_table,
            mmaps: VmaList::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }
}
