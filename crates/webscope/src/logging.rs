use std::fs::{File, OpenOptions};
use tracing_subscriber::EnvFilter;

/// RUST_LOG が設定されていればそれを、なければ LOG_LEVEL の値をフィルタにする
fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// 通常のコマンドは stderr にログを出す（stdout は結果の出力に使う）
pub fn init_stderr(log_level: &str) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(log_level))
        .init();
}

/// stdio の MCP サーバーは stdout を JSON-RPC に使うので、ログはファイルに出力
///
/// ファイルを開けない場合は stderr に警告を出し、ログなしで続行する。
pub fn init_file(path: &str, log_level: &str) {
    if let Some(file) = open_log_file(path) {
        tracing_subscriber::fmt()
            .with_writer(file)
            .with_env_filter(env_filter(log_level))
            .with_ansi(false)
            .init();
    }
}

fn open_log_file(path: &str) -> Option<File> {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("warning: ログファイル {} を開けません ({})。ログは出力されません", path, e);
            None
        }
    }
}
