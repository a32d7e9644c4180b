//! 肺密度定量分析管线入口.
//!
//! 用法: `quantify <scan.nii[.gz]> [mask-output.nii[.gz]]`
//!
//! 环境变量:
//!
//! 1. `$LUNGMASK_BIN`: 外部肺分割引擎的可执行文件, 缺省为 `lungmask`;
//! 2. `$LUNG_LAA_BOUND` / `$LUNG_HAA_BOUND`: 形如 `low,high`
//!   的密度带覆盖值, 缺省为 \[-1024, -950\] 与 \[-700, -200\].

use std::process::ExitCode;

mod config;
mod runner;
mod segment;

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("Logger initialization error");

    let cfg = match config::RunConfig::from_env_args(std::env::args()) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("配置错误: {e:?}");
            eprintln!("用法: quantify <scan.nii[.gz]> [mask-output.nii[.gz]]");
            return ExitCode::FAILURE;
        }
    };

    let segmenter = segment::LungmaskCli::from_env();
    match runner::run(&cfg, &segmenter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("管线中止: {e:?}");
            ExitCode::FAILURE
        }
    }
}
