//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 文件系统事务
//!
//! 修改文件系统的操作必须包在一对 begin_op/end_op 之间，日志层据此保证
//! 崩溃一致性。[`Transaction`] 是作用域守卫：创建时 begin，析构时 end，
//! 即使中途出错也会提交。

use core::sync::atomic::{AtomicUsize, Ordering};
use log::trace;

use crate::config::{BSIZE, MAXOPBLOCKS};

/// 日志层接口
pub trait Journal: Sync {
    /// 开始一个文件系统操作，日志空间不足时可以阻塞
    fn begin_op(&self);

    /// 结束一个文件系统操作，最后一个未完成操作结束时提交
    fn end_op(&self);
}

/// 事务守卫
#[must_use = "事务在守卫析构时提交"]
pub struct Transaction<'a> {
    journal: &'a dyn Journal,
}

impl<'a> Transaction<'a> {
    pub fn begin(journal: &'a dyn Journal) -> Self {
        journal.begin_op();
        Self { journal }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.journal.end_op();
    }
}

/// 单个事务内最多可写的字节数
///
/// 每次写入除数据块外还要修改 inode 块、间接块和两个位图块，
/// 再留一半余量给非对齐写入跨块的情况。
pub const fn max_write_bytes() -> usize {
    ((MAXOPBLOCKS - 1 - 1 - 2) / 2) * BSIZE
}

/// 只计数、不落盘的日志实现
#[derive(Debug, Default)]
pub struct OpLog {
    outstanding: AtomicUsize,
    committed: AtomicUsize,
}

impl OpLog {
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicUsize::new(0),
            committed: AtomicUsize::new(0),
        }
    }

    /// 尚未结束的操作数
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// 已结束的操作数
    pub fn committed(&self) -> usize {
        self.committed.load(Ordering::Acquire)
    }
}

impl Journal for OpLog {
    fn begin_op(&self) {
        let n = self.outstanding.fetch_add(1, Ordering::AcqRel) + 1;
        trace!("log: begin_op outstanding={}", n);
    }

    fn end_op(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.committed.fetch_add(1, Ordering::AcqRel);
    }
}
