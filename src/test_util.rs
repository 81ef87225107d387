#[cfg(test)]
pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|err| err.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_dir = std::env::var("COVER_MATCH_DIR").ok();
    // SAFETY: every test touching the variable holds HOME_MUTEX.
    unsafe { std::env::set_var("COVER_MATCH_DIR", dir.path()) };
    let result = func(dir.path());
    match old_dir {
        Some(old) => unsafe { std::env::set_var("COVER_MATCH_DIR", old) },
        None => unsafe { std::env::remove_var("COVER_MATCH_DIR") },
    }
    result
}
