//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 平台无关的页表接口
//!
//! 文件映射子系统通过 [`PageMapper`] 安装、移除页表项并访问用户内存，
//! 不直接接触架构页表格式。[`SoftPageTable`] 是基于 [`FrameArena`] 的
//! 软件实现，按 Sv39 的方式统计叶子页表页的分配。

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::sync::Arc;
use bitflags::bitflags;

use super::frame::{FrameAllocator, FrameArena};
use super::page::{checked_page_round_up, PhysFrame, VirtAddr, VirtPageNr, PAGE_SIZE};

bitflags! {
    /// 页表项权限位（RISC-V 布局）
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PteFlags: u64 {
        const V = 1 << 0;
        const R = 1 << 1;
        const W = 1 << 2;
        const X = 1 << 3;
        const U = 1 << 4;
        const A = 1 << 6;
        const D = 1 << 7;
    }
}

/// 页表操作错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapError {
    /// 已经映射
    AlreadyMapped,
    /// 未映射
    NotMapped,
    /// 内存不足（无法分配页表页）
    OutOfMemory,
    /// 无效参数
    Invalid,
}

/// 进程页表
pub trait PageMapper {
    /// 从 `va` 所在页开始，把 `round_up(size) / PAGE_SIZE` 个页映射到从 `frame`
    /// 开始的连续物理页
    ///
    /// `va` 不必页对齐。需要新页表页而无法分配时返回 [`MapError::OutOfMemory`]。
    fn map_pages(
        &mut self,
        va: VirtAddr,
        size: usize,
        frame: PhysFrame,
        flags: PteFlags,
    ) -> Result<(), MapError>;

    /// 移除从 `va` 开始的 `npages` 个页表项，跳过不存在的项
    ///
    /// `free_backing` 为真时同时归还对应的物理页。
    fn unmap_pages(&mut self, va: VirtAddr, npages: usize, free_backing: bool);

    /// 查询 `va` 所在页的映射
    fn translate(&self, va: VirtAddr) -> Option<(PhysFrame, PteFlags)>;

    /// 复制内核数据到用户地址
    fn copy_to_user(&mut self, dst: VirtAddr, src: &[u8]) -> Result<(), MapError>;

    /// 从用户地址复制数据
    fn copy_from_user(&self, src: VirtAddr, dst: &mut [u8]) -> Result<(), MapError>;

    /// `va` 所在页是否已驻留
    fn is_resident(&self, va: VirtAddr) -> bool {
        self.translate(va).is_some()
    }
}

/// Sv39 叶子页表覆盖的页数
const PTES_PER_TABLE: usize = 512;

#[derive(Debug, Clone, Copy)]
struct Pte {
    frame: PhysFrame,
    flags: PteFlags,
}

/// 软件页表
pub struct SoftPageTable {
    entries: BTreeMap<VirtPageNr, Pte>,
    /// 已分配的叶子页表，按 vpn / 512 索引
    leaf_tables: BTreeSet<usize>,
    /// 剩余可分配的页表页数，`None` 表示不限
    table_budget: Option<usize>,
    frames: Arc<FrameArena>,
}

impl SoftPageTable {
    pub fn new(frames: Arc<FrameArena>) -> Self {
        Self {
            entries: BTreeMap::new(),
            leaf_tables: BTreeSet::new(),
            table_budget: None,
            frames,
        }
    }

    /// 限制后续可分配的页表页数
    pub fn set_table_budget(&mut self, budget: Option<usize>) {
        self.table_budget = budget;
    }

    /// 已驻留的页数
    pub fn resident_pages(&self) -> usize {
        self.entries.len()
    }

    pub fn frames(&self) -> &Arc<FrameArena> {
        &self.frames
    }

    /// 逐页遍历 `[va, va + len)`，对每段调用 `f(frame, 页内偏移, 缓冲区偏移, 长度)`
    fn walk_range(
        &self,
        va: VirtAddr,
        len: usize,
        mut f: impl FnMut(PhysFrame, usize, usize, usize),
    ) -> Result<(), MapError> {
        let mut done = 0;
        while done < len {
            let cur = va.plus(done);
            let pte = self.entries.get(&cur.page_number()).ok_or(MapError::NotMapped)?;
            let in_page = cur.page_offset();
            let n = core::cmp::min(PAGE_SIZE - in_page, len - done);
            f(pte.frame, in_page, done, n);
            done += n;
        }
        Ok(())
    }
}

impl PageMapper for SoftPageTable {
    fn map_pages(
        &mut self,
        va: VirtAddr,
        size: usize,
        frame: PhysFrame,
        flags: PteFlags,
    ) -> Result<(), MapError> {
        if size == 0 {
            return Err(MapError::Invalid);
        }

        // `va` 所在页起，按 `size` 计算页数；非对齐的 va 不会多占一页
        let first = va.page_number();
        let npages = checked_page_round_up(size).ok_or(MapError::Invalid)? / PAGE_SIZE;
        let last = first + npages - 1;

        // 先检查再修改，失败时页表保持原样
        let mut new_tables = BTreeSet::new();
        for vpn in first..=last {
            if self.entries.contains_key(&vpn) {
                return Err(MapError::AlreadyMapped);
            }
            let table = vpn / PTES_PER_TABLE;
            if !self.leaf_tables.contains(&table) {
                new_tables.insert(table);
            }
        }
        if let Some(budget) = self.table_budget {
            if new_tables.len() > budget {
                return Err(MapError::OutOfMemory);
            }
            self.table_budget = Some(budget - new_tables.len());
        }
        self.leaf_tables.extend(new_tables);

        for (i, vpn) in (first..=last).enumerate() {
            self.entries.insert(
                vpn,
                Pte {
                    frame: PhysFrame::new(frame.number + i),
                    flags: flags | PteFlags::V,
                },
            );
        }
        Ok(())
    }

    fn unmap_pages(&mut self, va: VirtAddr, npages: usize, free_backing: bool) {
        let first = va.page_number();
        for vpn in first..first + npages {
            if let Some(pte) = self.entries.remove(&vpn) {
                if free_backing {
                    self.frames.dealloc(pte.frame);
                }
            }
        }
    }

    fn translate(&self, va: VirtAddr) -> Option<(PhysFrame, PteFlags)> {
        self.entries
            .get(&va.page_number())
            .map(|pte| (pte.frame, pte.flags))
    }

    fn copy_to_user(&mut self, dst: VirtAddr, src: &[u8]) -> Result<(), MapError> {
        let frames = self.frames.clone();
        self.walk_range(dst, src.len(), |frame, in_page, at, n| {
            frames.with_frame(frame, |data| {
                data[in_page..in_page + n].copy_from_slice(&src[at..at + n]);
            });
        })
    }

    fn copy_from_user(&self, src: VirtAddr, dst: &mut [u8]) -> Result<(), MapError> {
        let len = dst.len();
        self.walk_range(src, len, |frame, in_page, at, n| {
            self.frames.with_frame(frame, |data| {
                dst[at..at + n].copy_from_slice(&data[in_page..in_page + n]);
            });
        })
    }
}
