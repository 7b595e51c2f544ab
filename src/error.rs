//! 领域错误类型

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipError {
    #[error("未找到 Python 解释器 (已尝试: {tried})")]
    InterpreterNotFound { tried: String },

    #[error("扫描包元数据失败: {path}: {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("解释器探测失败: {0}")]
    Probe(String),

    #[error("当前环境没有可用的 pip: {0}")]
    PipUnavailable(String),

    #[error("'{0}' 未安装")]
    NotInstalled(String),

    #[error("'{0}' 属于标准库，无法通过 pip 卸载")]
    NotRemovable(String),

    #[error("卸载 '{name}' 失败 (exit={code:?}): {message}")]
    CommandFailed {
        name: String,
        code: Option<i32>,
        message: String,
    },

    #[error("卸载 '{0}' 后包仍然存在")]
    StillInstalled(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type PipResult<T> = std::result::Result<T, PipError>;
