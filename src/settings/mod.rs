pub mod store;

pub use store::{
    PlayerSettings, apply_env_overrides, default_data_dir, load_settings, save_settings,
};
