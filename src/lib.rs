pub mod core;

pub fn init_logging() {
    // 重复初始化时沿用已装好的 logger
    let _ = env_logger::Builder::from_default_env().try_init();
}
