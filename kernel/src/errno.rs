//! MIT License
//!
//! Copyright (c) 2026 Fei Wang
//!
//! 标准错误代码定义
//!
//! 和 include/uapi/asm-generic/errno.h 保持一致，只保留文件映射
//! 子系统实际返回的错误码

use crate::mm::vma::VmaError;

/// 标准错误代码
///
/// 使用方法：
/// ```rust
/// use rux_mmap::errno::Errno;
///
/// // 系统调用风格，返回负数
/// assert_eq!(Errno::InvalidArgument.as_neg_isize(), -22);
/// ```
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Errno {
    /// Bad file number (EBADF, 9)
    BadFileNumber = 9,

    /// I/O error (EIO, 5)
    IOError = 5,

    /// Out of memory (ENOMEM, 12)
    OutOfMemory = 12,

    /// Permission denied (EACCES, 13)
    PermissionDenied = 13,

    /// Bad address (EFAULT, 14)
    BadAddress = 14,

    /// Invalid argument (EINVAL, 22)
    InvalidArgument = 22,

    /// File table overflow (ENFILE, 23)
    FileTableOverflow = 23,

    /// Too many open files (EMFILE, 24)
    TooManyOpenFiles = 24,
}

impl Errno {
    /// 获取错误代码的正数值（用于比较）
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// 获取错误代码的负数值（用于系统调用返回）
    #[inline]
    pub const fn as_neg_i32(self) -> i32 {
        -(self as i32)
    }

    /// 获取错误代码的负数值（isize，用于 sys_* 返回）
    #[inline]
    pub const fn as_neg_isize(self) -> isize {
        -(self as i32 as isize)
    }
}

impl From<VmaError> for Errno {
    fn from(err: VmaError) -> Self {
        match err {
            VmaError::PoolExhausted => Errno::FileTableOverflow,
            VmaError::TooManyMappings => Errno::TooManyOpenFiles,
            VmaError::NoMapping | VmaError::BadAddress => Errno::BadAddress,
            VmaError::OutOfMemory | VmaError::MapInstallFailed => Errno::OutOfMemory,
            VmaError::UnsupportedSplit | VmaError::InvalidArgument | VmaError::StaleHandle => {
                Errno::InvalidArgument
            }
            VmaError::PartialWrite => Errno::IOError,
            VmaError::PermissionDenied => Errno::PermissionDenied,
        }
    }
}

/// 常用的错误代码常量
pub mod constants {
    pub const EIO: i32 = 5;
    pub const EBADF: i32 = 9;
    pub const ENOMEM: i32 = 12;
    pub const EACCES: i32 = 13;
    pub const EFAULT: i32 = 14;
    pub const EINVAL: i32 = 22;
    pub const ENFILE: i32 = 23;
    pub const EMFILE: i32 = 24;
}
