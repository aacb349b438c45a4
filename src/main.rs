// ==========================================
// SKD 套件追踪系统 - 命令行入口
// ==========================================
// 用法: skd-kit-tracker [db_path] <init|reconcile-all|generate-build-start>
// ==========================================

use anyhow::{bail, Context};
use skd_kit_tracker::app::{get_default_db_path, AppState};
use skd_kit_tracker::logging;

const USAGE: &str = "用法: skd-kit-tracker [db_path] <init|reconcile-all|generate-build-start>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (db_path, command) = match args.as_slice() {
        [command] => (get_default_db_path(), command.clone()),
        [db_path, command] => (db_path.clone(), command.clone()),
        _ => bail!(USAGE),
    };

    tracing::info!("==================================================");
    tracing::info!("SKD 套件追踪系统 v{}", skd_kit_tracker::VERSION);
    tracing::info!("==================================================");

    let state = AppState::new(db_path)
        .map_err(anyhow::Error::msg)
        .context("无法初始化AppState")?;

    match command.as_str() {
        "init" => {
            println!("数据库已初始化: {}", state.db_path);
        }
        "reconcile-all" => {
            let result = state.kit_api.reconcile_all_eligible_kits()?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        "generate-build-start" => {
            let result = state.kit_api.generate_build_start_events().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        other => bail!("未知命令: {}\n{}", other, USAGE),
    }

    Ok(())
}
