//! 権限の降格
//!
//! root で起動されたコンテナは、リスナーを開く前に UID/GID で指定された
//! 一般ユーザーへ切り替える。

use crate::error::Result;

/// 実効 UID が 0 のときだけ setgid → setuid の順で降格する
///
/// 降格した場合は true を返す。
#[cfg(unix)]
pub fn drop_privileges(uid: u32, gid: u32) -> Result<bool> {
    use crate::error::ConfigError;

    // SAFETY: geteuid は副作用のない問い合わせ
    if unsafe { libc::geteuid() } != 0 {
        return Ok(false);
    }
    if uid == 0 {
        tracing::warn!("UID=0 が指定されているため root のまま実行します");
        return Ok(false);
    }

    // SAFETY: 引数は値渡しで、失敗時は errno を参照するだけ
    if unsafe { libc::setgid(gid as libc::gid_t) } != 0 {
        return Err(ConfigError::PrivilegeDrop {
            step: "setgid",
            source: std::io::Error::last_os_error(),
        });
    }
    if unsafe { libc::setuid(uid as libc::uid_t) } != 0 {
        return Err(ConfigError::PrivilegeDrop {
            step: "setuid",
            source: std::io::Error::last_os_error(),
        });
    }

    tracing::info!(uid, gid, "Dropped root privileges");
    Ok(true)
}

#[cfg(not(unix))]
pub fn drop_privileges(_uid: u32, _gid: u32) -> Result<bool> {
    Ok(false)
}
