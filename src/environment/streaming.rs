//! 流式执行 pip uninstall

use super::metadata::clean_terminal_output;
use super::types::CommandOutput;
use super::PythonEnv;
use crate::error::PipResult;
use std::io::{BufRead, BufReader, Read};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// 当前运行的子进程 PID（同时也是进程组 ID）
static CHILD_PID: AtomicU32 = AtomicU32::new(0);
static SHOULD_CANCEL: AtomicBool = AtomicBool::new(false);

fn signal_group(pid: u32, sig: libc::c_int) -> bool {
    unsafe { libc::kill(-(pid as i32), sig) == 0 }
}

fn group_alive(pid: u32) -> bool {
    signal_group(pid, 0)
}

/// 请求取消当前正在运行的 pip 进程。
///
/// 信号阶梯（针对整个进程组）：SIGINT，3 秒后 SIGTERM，再 1 秒后 SIGKILL。
/// 等待在后台线程进行，不阻塞 TUI。
pub fn cancel_operation() {
    SHOULD_CANCEL.store(true, Ordering::SeqCst);

    let pid = CHILD_PID.load(Ordering::SeqCst);
    if pid == 0 {
        return;
    }

    signal_group(pid, libc::SIGINT);
    std::thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(3);
        while group_alive(pid) {
            if Instant::now() >= deadline {
                signal_group(pid, libc::SIGTERM);
                std::thread::sleep(Duration::from_millis(1000));
                if group_alive(pid) {
                    log::warn!("pip 进程组 {} 未响应 SIGTERM，发送 SIGKILL", pid);
                    signal_group(pid, libc::SIGKILL);
                }
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    });
}

/// 重置取消标志（由 UI 线程在启动任务前调用）
pub fn reset_cancel() {
    SHOULD_CANCEL.store(false, Ordering::SeqCst);
    CHILD_PID.store(0, Ordering::SeqCst);
}

/// 退出应用时清理残留子进程
pub fn cleanup_child_processes() {
    let pid = CHILD_PID.swap(0, Ordering::SeqCst);
    if pid != 0 && group_alive(pid) {
        signal_group(pid, libc::SIGTERM);
        std::thread::sleep(Duration::from_millis(200));
        if group_alive(pid) {
            signal_group(pid, libc::SIGKILL);
        }
    }
}

fn should_cancel() -> bool {
    SHOULD_CANCEL.load(Ordering::SeqCst)
}

/// 逐行读取流并转发；stderr 行加 `⚠ ` 前缀。返回清理后的全部文本。
fn read_stream_lines(
    stream: Option<impl Read>,
    tx: &mpsc::UnboundedSender<String>,
    is_stderr: bool,
) -> String {
    let mut result = String::new();
    let Some(reader) = stream else {
        return result;
    };

    for line in BufReader::new(reader).lines() {
        let Ok(line) = line else { break };
        let cleaned = clean_terminal_output(&line);
        if cleaned.trim().is_empty() {
            continue;
        }
        let msg = if is_stderr {
            format!("⚠ {}", cleaned)
        } else {
            cleaned.clone()
        };
        let _ = tx.send(msg);
        result.push_str(&cleaned);
        result.push('\n');
    }
    result
}

impl PythonEnv {
    /// `python -m pip uninstall -y <name>`，输出逐行发送到 `output_tx`
    pub fn uninstall_streaming(
        &self,
        name: &str,
        output_tx: mpsc::UnboundedSender<String>,
    ) -> PipResult<CommandOutput> {
        use std::os::unix::process::CommandExt;

        let mut cmd = self.pip_command();
        cmd.args(["uninstall", "-y", name]);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        unsafe {
            cmd.pre_exec(|| {
                // 独立进程组，方便整体发送信号
                libc::setpgid(0, 0);
                Ok(())
            });
        }
        log::debug!("执行: {:?}", cmd);
        let mut child = cmd.spawn()?;

        let child_pid = child.id();
        CHILD_PID.store(child_pid, Ordering::SeqCst);
        if should_cancel() {
            signal_group(child_pid, libc::SIGINT);
        }

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let tx_clone = output_tx.clone();
        let stdout_handle = std::thread::spawn(move || read_stream_lines(stdout, &tx_clone, false));
        let stderr_handle = std::thread::spawn(move || read_stream_lines(stderr, &output_tx, true));

        let all_stdout = stdout_handle.join().unwrap_or_default();
        let all_stderr = stderr_handle.join().unwrap_or_default();

        let status = child.wait()?;
        CHILD_PID.store(0, Ordering::SeqCst);

        if should_cancel() {
            return Ok(CommandOutput {
                stdout: all_stdout,
                stderr: "卸载已取消".to_string(),
                success: false,
                code: status.code(),
            });
        }

        Ok(CommandOutput {
            stdout: all_stdout,
            stderr: all_stderr,
            success: status.success(),
            code: status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_lines_are_prefixed_and_ansi_stripped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let input = b"\x1b[33mWARNING: Skipping foo\x1b[0m\n\nsecond\n".as_slice();
        let text = read_stream_lines(Some(input), &tx, true);
        assert_eq!(text, "WARNING: Skipping foo\nsecond\n");
        assert_eq!(rx.try_recv().unwrap(), "⚠ WARNING: Skipping foo");
        assert_eq!(rx.try_recv().unwrap(), "⚠ second");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn missing_stream_yields_empty_text() {
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(read_stream_lines(None::<&[u8]>, &tx, false).is_empty());
    }
}
