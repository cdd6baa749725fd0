use std::fs;
use trackplayer::model::RepeatMode;
use trackplayer::playback::{CACHE_DIR_NAME, SessionConfig};
use trackplayer::settings::{PlayerSettings, apply_env_overrides, load_settings, save_settings};

#[test]
fn settings_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path();

    let s = PlayerSettings {
        max_cache_size_kb: 4096,
        user_agent: Some("host/2.0".to_owned()),
        volume: 0.42,
        repeat_mode: RepeatMode::Queue,
        stop_with_app: true,
        ..PlayerSettings::default()
    };
    save_settings(data_dir, &s).expect("save_settings");

    let loaded = load_settings(data_dir);
    assert!((loaded.volume - 0.42).abs() < f32::EPSILON);
    assert_eq!(loaded.max_cache_size_kb, 4096);
    assert_eq!(loaded.user_agent.as_deref(), Some("host/2.0"));
    assert_eq!(loaded.repeat_mode, RepeatMode::Queue);
    assert!(loaded.stop_with_app);
}

#[test]
fn settings_corrupt_file_falls_back_to_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path();
    fs::create_dir_all(data_dir).expect("create_dir_all");
    fs::write(data_dir.join("settings.json"), b"{not-json").expect("write");

    let loaded = load_settings(data_dir);
    assert_eq!(
        loaded.max_cache_size_kb,
        PlayerSettings::default().max_cache_size_kb
    );
}

#[test]
fn session_config_from_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let s = PlayerSettings {
        max_cache_size_kb: 10,
        user_agent: Some("host/2.0".to_owned()),
        http_connect_timeout_ms: 1500,
        ..PlayerSettings::default()
    };

    let config = SessionConfig::from_settings(dir.path(), &s);
    assert_eq!(config.cache_root, dir.path().join(CACHE_DIR_NAME));
    assert_eq!(config.cache_capacity_bytes, 10 * 1024);
    assert_eq!(config.resolver.user_agent, "host/2.0");
    assert_eq!(config.resolver.connect_timeout.as_millis(), 1500);
    assert!(config.resolver.resources.is_none());
}

#[test]
fn env_overrides_replace_cache_size_and_user_agent() {
    let base = PlayerSettings {
        max_cache_size_kb: 1,
        user_agent: Some("host/1.0".to_owned()),
        ..PlayerSettings::default()
    };

    // 本文件里只有这一个测试改环境变量
    unsafe {
        std::env::set_var("TRACKPLAYER_CACHE_MAX_KB", " 2048 ");
        std::env::set_var("TRACKPLAYER_USER_AGENT", "env-agent/3.1");
    }
    let s = apply_env_overrides(base.clone());
    assert_eq!(s.max_cache_size_kb, 2048);
    assert_eq!(s.user_agent.as_deref(), Some("env-agent/3.1"));
    assert_eq!(s.cache_capacity_bytes(), 2048 * 1024);

    // 无法解析或为空的值不覆盖
    unsafe {
        std::env::set_var("TRACKPLAYER_CACHE_MAX_KB", "lots");
        std::env::set_var("TRACKPLAYER_USER_AGENT", "  ");
    }
    let s = apply_env_overrides(base.clone());
    assert_eq!(s.max_cache_size_kb, 1);
    assert_eq!(s.user_agent.as_deref(), Some("host/1.0"));

    unsafe {
        std::env::remove_var("TRACKPLAYER_CACHE_MAX_KB");
        std::env::remove_var("TRACKPLAYER_USER_AGENT");
    }
}
